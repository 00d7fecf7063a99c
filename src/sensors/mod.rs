//! Sensor reducers
//!
//! Turn raw samples into discrete events for the store. A missing sensor
//! simply produces no events; the store never knows whether one exists.

pub mod audio;
pub mod geo;

pub use audio::{AudioEnvelope, SignalWindow, amplitude_from_spectrum};
pub use geo::{GeoFix, GeoTracker, haversine_m};

use serde::{Deserialize, Serialize};

use crate::sim::GameEvent;

/// Discrete event produced by a reducer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalEvent {
    SoundBurst,
    Silence,
    /// Distance moved since the previous fix (meters)
    Moved(f64),
}

impl From<SignalEvent> for GameEvent {
    fn from(event: SignalEvent) -> Self {
        match event {
            SignalEvent::SoundBurst => GameEvent::SoundBurst,
            SignalEvent::Silence => GameEvent::Silence,
            SignalEvent::Moved(meters) => GameEvent::Moved(meters as f32),
        }
    }
}

/// Sensors the game asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Camera,
    Microphone,
    Geolocation,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [SensorKind::Camera, SensorKind::Microphone, SensorKind::Geolocation];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Camera => "camera",
            SensorKind::Microphone => "microphone",
            SensorKind::Geolocation => "geolocation",
        }
    }
}

/// Capability flag for one sensor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorStatus {
    /// Not requested yet, or waiting on the permission prompt
    #[default]
    Pending,
    Active,
    Unavailable(String),
}

/// Why a sensor could not be opened
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("{0} permission denied")]
    PermissionDenied(&'static str),
    #[error("{0} API not available")]
    Unsupported(&'static str),
    #[error("{sensor} failed: {message}")]
    Failed { sensor: &'static str, message: String },
}

impl From<&SensorError> for SensorStatus {
    fn from(err: &SensorError) -> Self {
        SensorStatus::Unavailable(err.to_string())
    }
}

/// Capability flags the presentation shell can show
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub camera: SensorStatus,
    pub microphone: SensorStatus,
    pub geolocation: SensorStatus,
}

impl Capabilities {
    pub fn get(&self, kind: SensorKind) -> &SensorStatus {
        match kind {
            SensorKind::Camera => &self.camera,
            SensorKind::Microphone => &self.microphone,
            SensorKind::Geolocation => &self.geolocation,
        }
    }

    /// Record a new status. Returns false (and logs nothing) if it was already current.
    pub fn set(&mut self, kind: SensorKind, status: SensorStatus) -> bool {
        if self.get(kind) == &status {
            return false;
        }
        match &status {
            SensorStatus::Unavailable(reason) => {
                log::warn!("{} unavailable: {}", kind.as_str(), reason)
            }
            SensorStatus::Active => log::info!("{} active", kind.as_str()),
            SensorStatus::Pending => {}
        }
        match kind {
            SensorKind::Camera => self.camera = status,
            SensorKind::Microphone => self.microphone = status,
            SensorKind::Geolocation => self.geolocation = status,
        }
        true
    }

    /// Sensors that failed to open
    pub fn unavailable(&self) -> Vec<SensorKind> {
        SensorKind::ALL
            .into_iter()
            .filter(|k| matches!(self.get(*k), SensorStatus::Unavailable(_)))
            .collect()
    }
}
