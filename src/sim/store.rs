//! Authoritative store
//!
//! Owns the single `GameState`, applies events in arrival order and raises
//! the clear condition on its rising edge.

use glam::Vec3;

use super::state::{GameEvent, GameState};
use super::transition::{GameError, Transition, apply};
use crate::settings::Tuning;

/// Result of a dispatched event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dispatched {
    pub transition: Transition,
    /// True exactly once per session: the dispatch that opened the last treasure
    pub cleared: bool,
}

/// Single owner of the game state
#[derive(Debug, Clone)]
pub struct GameStore {
    state: GameState,
    tuning: Tuning,
    /// Bumped whenever threat level or the ledger changes
    revision: u64,
    /// Clear already signalled this session
    clear_latched: bool,
}

impl GameStore {
    pub fn new(positions: &[Vec3], tuning: Tuning) -> Self {
        Self {
            state: GameState::new(positions),
            tuning: tuning.sanitized(),
            revision: 0,
            clear_latched: false,
        }
    }

    /// Read-only view of the state
    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the clear condition has fired this session
    pub fn cleared(&self) -> bool {
        self.clear_latched
    }

    /// Apply an event. Only `Discover` with a bad index can fail.
    pub fn dispatch(&mut self, event: GameEvent) -> Result<Dispatched, GameError> {
        let transition = apply(&mut self.state, event, &self.tuning)?;

        if transition.changes_scene() {
            self.revision += 1;
        }

        match transition {
            Transition::Started => log::info!("Game started"),
            Transition::Discovered { index } => log::info!(
                "Treasure {} found ({}/{})",
                index,
                self.state.found_count(),
                self.state.total_count()
            ),
            Transition::TreasuresReset => log::info!("Treasures reset"),
            Transition::AlreadyFound { index } => {
                log::debug!("Treasure {} already found, skipping", index)
            }
            Transition::Threat { from, to } => log::debug!("Threat {:.1} -> {:.1}", from, to),
            Transition::Ignored | Transition::Unchanged => {}
        }

        // A reset starts a new session
        if event == GameEvent::ResetTreasures {
            self.clear_latched = false;
        }

        let cleared = !self.clear_latched && self.state.all_found();
        if cleared {
            self.clear_latched = true;
            log::info!("All treasures found - game clear!");
        }

        Ok(Dispatched { transition, cleared })
    }
}
