//! State transition function
//!
//! Every mutation of `GameState` goes through `apply`. Threat arithmetic is
//! clamped before `apply` returns, so callers never observe an out-of-range
//! value.

use super::state::{GameEvent, GameState};
use crate::settings::Tuning;

/// Rejected input
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("treasure index {index} out of range (have {count})")]
    InvalidIndex { index: usize, count: usize },
}

/// What a successfully applied event did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Precondition not met (e.g. sensor event before start); nothing changed
    Ignored,
    /// Event accepted but the state already had the resulting value
    Unchanged,
    /// The game left the start screen
    Started,
    /// Threat level moved to a new value
    Threat { from: f32, to: f32 },
    /// A treasure was opened for the first time
    Discovered { index: usize },
    /// Treasure was already open; idempotent no-op
    AlreadyFound { index: usize },
    /// All treasures were put back
    TreasuresReset,
}

impl Transition {
    /// True if threat level or the treasure ledger changed
    pub fn changes_scene(&self) -> bool {
        matches!(
            self,
            Transition::Threat { .. } | Transition::Discovered { .. } | Transition::TreasuresReset
        )
    }
}

/// Apply a single event to the state
pub fn apply(state: &mut GameState, event: GameEvent, tuning: &Tuning) -> Result<Transition, GameError> {
    match event {
        GameEvent::StartGame => {
            if state.started {
                return Ok(Transition::Ignored);
            }
            state.started = true;
            Ok(Transition::Started)
        }
        GameEvent::ResetTreasures => {
            let any_found = state.collectibles.iter().any(|c| c.found);
            for collectible in &mut state.collectibles {
                collectible.found = false;
            }
            state.last_discovered = None;
            if any_found {
                Ok(Transition::TreasuresReset)
            } else {
                Ok(Transition::Unchanged)
            }
        }
        GameEvent::Discover(index) => {
            let count = state.collectibles.len();
            if index >= count {
                return Err(GameError::InvalidIndex { index, count });
            }
            if !state.started {
                return Ok(Transition::Ignored);
            }
            let collectible = &mut state.collectibles[index];
            if collectible.found {
                return Ok(Transition::AlreadyFound { index });
            }
            collectible.found = true;
            state.last_discovered = Some(index);
            Ok(Transition::Discovered { index })
        }
        _ if !state.started => Ok(Transition::Ignored),
        GameEvent::SoundBurst => Ok(shift_threat(state, tuning.threat_raise)),
        GameEvent::Silence => Ok(shift_threat(state, -tuning.threat_decay)),
        GameEvent::Moved(meters) => {
            let meters = if meters.is_finite() { meters.max(0.0) } else { 0.0 };
            Ok(shift_threat(state, -meters / 2.0))
        }
        GameEvent::ForceShow => Ok(set_threat(state, tuning.force_show_level)),
        GameEvent::ForceHide => Ok(set_threat(state, 0.0)),
    }
}

fn shift_threat(state: &mut GameState, delta: f32) -> Transition {
    set_threat(state, state.threat_level + delta)
}

fn set_threat(state: &mut GameState, value: f32) -> Transition {
    let from = state.threat_level;
    if state.set_threat(value) {
        Transition::Threat {
            from,
            to: state.threat_level,
        }
    } else {
        Transition::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::MAX_THREAT;
    use proptest::prelude::*;

    fn started_state() -> GameState {
        let mut state = GameState::new(&crate::default_treasure_positions());
        apply(&mut state, GameEvent::StartGame, &Tuning::default()).unwrap();
        state
    }

    #[test]
    fn test_start_only_once() {
        let tuning = Tuning::default();
        let mut state = GameState::new(&crate::default_treasure_positions());
        assert_eq!(apply(&mut state, GameEvent::StartGame, &tuning), Ok(Transition::Started));
        assert_eq!(apply(&mut state, GameEvent::StartGame, &tuning), Ok(Transition::Ignored));
        assert!(state.started());
    }

    #[test]
    fn test_sensor_events_ignored_before_start() {
        let tuning = Tuning::default();
        let mut state = GameState::new(&crate::default_treasure_positions());
        for event in [GameEvent::SoundBurst, GameEvent::ForceShow, GameEvent::Discover(0)] {
            assert_eq!(apply(&mut state, event, &tuning), Ok(Transition::Ignored));
        }
        assert_eq!(state.threat_level(), 0.0);
        assert_eq!(state.found_count(), 0);
    }

    #[test]
    fn test_discover_one() {
        // Scenario A
        let tuning = Tuning::default();
        let mut state = started_state();
        assert_eq!(
            apply(&mut state, GameEvent::Discover(1), &tuning),
            Ok(Transition::Discovered { index: 1 })
        );
        assert_eq!(state.found_count(), 1);
        assert!(state.collectibles()[1].found());
        assert!(!state.collectibles()[0].found());
        assert!(!state.collectibles()[2].found());
        assert_eq!(state.last_discovered(), Some(1));
    }

    #[test]
    fn test_three_bursts() {
        // Scenario B
        let tuning = Tuning::default();
        let mut state = started_state();
        for _ in 0..3 {
            apply(&mut state, GameEvent::SoundBurst, &tuning).unwrap();
        }
        assert_eq!(state.threat_level(), (3.0 * tuning.threat_raise).min(MAX_THREAT));
    }

    #[test]
    fn test_discover_out_of_range() {
        let tuning = Tuning::default();
        let mut state = started_state();
        let before = state.clone();
        assert_eq!(
            apply(&mut state, GameEvent::Discover(3), &tuning),
            Err(GameError::InvalidIndex { index: 3, count: 3 })
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_moved_decays_half_distance() {
        let tuning = Tuning::default();
        let mut state = started_state();
        apply(&mut state, GameEvent::ForceShow, &tuning).unwrap();
        apply(&mut state, GameEvent::Moved(30.0), &tuning).unwrap();
        assert_eq!(state.threat_level(), tuning.force_show_level - 15.0);

        // Negative distances never raise the threat
        apply(&mut state, GameEvent::Moved(-100.0), &tuning).unwrap();
        assert_eq!(state.threat_level(), tuning.force_show_level - 15.0);
    }

    #[test]
    fn test_force_show_hide() {
        let tuning = Tuning::default();
        let mut state = started_state();
        apply(&mut state, GameEvent::ForceShow, &tuning).unwrap();
        assert_eq!(state.threat_level(), tuning.force_show_level);
        assert_eq!(
            apply(&mut state, GameEvent::ForceShow, &tuning),
            Ok(Transition::Unchanged)
        );
        apply(&mut state, GameEvent::ForceHide, &tuning).unwrap();
        assert_eq!(state.threat_level(), 0.0);
    }

    #[test]
    fn test_reset_keeps_threat_and_started() {
        // Scenario D
        let tuning = Tuning::default();
        let mut state = started_state();
        apply(&mut state, GameEvent::SoundBurst, &tuning).unwrap();
        for i in 0..3 {
            apply(&mut state, GameEvent::Discover(i), &tuning).unwrap();
        }
        assert!(state.all_found());

        assert_eq!(
            apply(&mut state, GameEvent::ResetTreasures, &tuning),
            Ok(Transition::TreasuresReset)
        );
        assert!(state.collectibles().iter().all(|c| !c.found()));
        assert_eq!(state.last_discovered(), None);
        assert!(state.started());
        assert_eq!(state.threat_level(), tuning.threat_raise);
    }

    fn threat_event() -> impl Strategy<Value = GameEvent> {
        prop_oneof![
            Just(GameEvent::SoundBurst),
            Just(GameEvent::Silence),
            (-50.0f32..500.0).prop_map(GameEvent::Moved),
        ]
    }

    proptest! {
        #[test]
        fn prop_threat_stays_in_range(events in prop::collection::vec(threat_event(), 0..200)) {
            let tuning = Tuning::default();
            let mut state = started_state();
            for event in events {
                apply(&mut state, event, &tuning).unwrap();
                prop_assert!((0.0..=MAX_THREAT).contains(&state.threat_level()));
            }
        }

        #[test]
        fn prop_discover_idempotent(index in 0usize..3) {
            let tuning = Tuning::default();
            let mut once = started_state();
            apply(&mut once, GameEvent::Discover(index), &tuning).unwrap();

            let mut twice = once.clone();
            let second = apply(&mut twice, GameEvent::Discover(index), &tuning).unwrap();
            prop_assert_eq!(second, Transition::AlreadyFound { index });
            prop_assert_eq!(once.collectibles(), twice.collectibles());
        }

        #[test]
        fn prop_out_of_range_never_mutates(index in 3usize..10_000) {
            let tuning = Tuning::default();
            let mut state = started_state();
            apply(&mut state, GameEvent::Discover(0), &tuning).unwrap();
            let before = state.collectibles().to_vec();
            prop_assert!(apply(&mut state, GameEvent::Discover(index), &tuning).is_err());
            prop_assert_eq!(state.collectibles(), &before[..]);
        }
    }
}
