//! Authoritative game state
//!
//! All game rules live here. This module must stay pure:
//! - Events are applied strictly in arrival order
//! - Threat level is clamped before any caller can read it
//! - No platform, sensor or rendering dependencies

pub mod state;
pub mod store;
pub mod transition;

pub use state::{Collectible, GameEvent, GameState};
pub use store::{Dispatched, GameStore};
pub use transition::{GameError, Transition, apply};
