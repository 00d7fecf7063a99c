//! Geolocation delta reducer
//!
//! Great-circle distance between successive fixes. Walking away lowers the
//! threat.

use serde::{Deserialize, Serialize};

use super::SignalEvent;
use crate::consts::EARTH_RADIUS_M;

/// A single geolocation fix in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and within [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Haversine distance in meters
pub fn haversine_m(a: GeoFix, b: GeoFix) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h marginally past 1 for antipodal points
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Tracks the previous fix and reports movement
#[derive(Debug, Clone, Default)]
pub struct GeoTracker {
    reference: Option<GeoFix>,
}

impl GeoTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference(&self) -> Option<GeoFix> {
        self.reference
    }

    /// First valid fix seeds the reference; later ones emit `Moved`
    pub fn observe(&mut self, fix: GeoFix) -> Option<SignalEvent> {
        if !fix.is_valid() {
            log::debug!("Dropping invalid fix {:?}", fix);
            return None;
        }
        let previous = self.reference.replace(fix)?;
        Some(SignalEvent::Moved(haversine_m(previous, fix)))
    }
}
