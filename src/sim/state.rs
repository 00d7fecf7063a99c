//! Game state and core types
//!
//! Fields are private to `sim`: only the transition function mutates them.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_THREAT;

/// A discoverable treasure chest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collectible {
    /// Marker-relative position (fixed at game start)
    position: Vec3,
    /// Flips false -> true once per session
    pub(super) found: bool,
}

impl Collectible {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            found: false,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn found(&self) -> bool {
        self.found
    }
}

/// Input events for the state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Leave the start screen
    StartGame,
    /// Noise burst from the microphone
    SoundBurst,
    /// Sustained quiet from the microphone
    Silence,
    /// Player moved this many meters
    Moved(f32),
    /// Player opened the treasure at this index
    Discover(usize),
    /// Debug: summon the monster
    ForceShow,
    /// Debug: dismiss the monster
    ForceHide,
    /// Put every treasure back
    ResetTreasures,
}

/// Complete game state (single session, never persisted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Monster proximity, always within [0, MAX_THREAT]
    pub(super) threat_level: f32,
    /// Treasures in placement order
    pub(super) collectibles: Vec<Collectible>,
    /// Set by StartGame, never cleared
    pub(super) started: bool,
    /// Last successful discovery (UI feedback only)
    pub(super) last_discovered: Option<usize>,
}

impl GameState {
    /// Create a fresh, unstarted game with treasures at the given positions
    pub fn new(positions: &[Vec3]) -> Self {
        Self {
            threat_level: 0.0,
            collectibles: positions.iter().copied().map(Collectible::new).collect(),
            started: false,
            last_discovered: None,
        }
    }

    pub fn threat_level(&self) -> f32 {
        self.threat_level
    }

    pub fn collectibles(&self) -> &[Collectible] {
        &self.collectibles
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn last_discovered(&self) -> Option<usize> {
        self.last_discovered
    }

    /// Number of treasures in play
    pub fn total_count(&self) -> usize {
        self.collectibles.len()
    }

    /// Number of treasures already opened
    pub fn found_count(&self) -> usize {
        self.collectibles.iter().filter(|c| c.found).count()
    }

    /// True if `index` refers to an existing, already opened treasure
    pub fn is_found(&self, index: usize) -> bool {
        self.collectibles.get(index).is_some_and(|c| c.found)
    }

    /// Every treasure opened (false for an empty ledger)
    pub fn all_found(&self) -> bool {
        !self.collectibles.is_empty() && self.collectibles.iter().all(|c| c.found)
    }

    /// Set the threat level, clamped to [0, MAX_THREAT]. Returns true if it changed.
    pub(super) fn set_threat(&mut self, value: f32) -> bool {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, MAX_THREAT) };
        let changed = value != self.threat_level;
        self.threat_level = value;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_unstarted() {
        let state = GameState::new(&crate::default_treasure_positions());
        assert!(!state.started());
        assert_eq!(state.threat_level(), 0.0);
        assert_eq!(state.total_count(), 3);
        assert_eq!(state.found_count(), 0);
        assert_eq!(state.last_discovered(), None);
        assert!(!state.all_found());
    }

    #[test]
    fn test_empty_ledger_is_never_all_found() {
        let state = GameState::new(&[]);
        assert!(!state.all_found());
    }

    #[test]
    fn test_set_threat_clamps() {
        let mut state = GameState::new(&[]);
        assert!(state.set_threat(500.0));
        assert_eq!(state.threat_level(), MAX_THREAT);
        assert!(state.set_threat(-3.0));
        assert_eq!(state.threat_level(), 0.0);
        assert!(!state.set_threat(f32::NAN));
        assert_eq!(state.threat_level(), 0.0);
    }
}
