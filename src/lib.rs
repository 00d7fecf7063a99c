//! Hush Hunt - an AR treasure hunt where noise draws the monster closer
//!
//! Core modules:
//! - `sim`: Authoritative game state (threat level, treasure ledger, transitions)
//! - `sensors`: Microphone and geolocation reducers (samples -> discrete events)
//! - `bridge`: Scene generation and message protocol for the AR iframe
//! - `shell`: Start/progress/clear screen projection and player intents
//! - `session`: Single controller wiring sensors, store and bridge together
//! - `platform`: Browser bindings (microphone, geolocation, iframe)

pub mod bridge;
pub mod platform;
pub mod sensors;
pub mod session;
pub mod settings;
pub mod shell;
pub mod sim;

pub use session::Session;
pub use settings::{Settings, Tuning};

use glam::Vec3;

/// Game configuration constants
pub mod consts {
    /// Upper bound of the threat level
    pub const MAX_THREAT: f32 = 200.0;

    /// Mean Earth radius used by the haversine reducer (meters)
    pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

    /// Treasure count per session
    pub const TREASURE_COUNT: usize = 3;

    /// Analyser FFT size (frequencyBinCount = half of this)
    pub const FFT_SIZE: u32 = 256;
}

/// Marker-relative treasure placement, in placement order.
pub fn default_treasure_positions() -> Vec<Vec3> {
    vec![
        Vec3::new(-1.0, 0.5, -2.0),
        Vec3::new(1.0, 0.5, -3.0),
        Vec3::new(0.0, 0.5, -4.0),
    ]
}

/// Percentage of `part` in `total`, rounded to the nearest integer (0 when total is 0)
#[inline]
pub fn percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}
