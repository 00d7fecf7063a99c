//! Game settings and tuning
//!
//! Persisted in LocalStorage. Only tuning and preferences live here, never
//! game progress.

use serde::{Deserialize, Serialize};

use crate::consts::MAX_THREAT;

/// Sensor and threat tuning constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Audio envelope ===
    /// Mean analyser amplitude (0-255) above which a sample counts as loud
    pub burst_threshold: u8,
    /// Consecutive loud samples needed for a burst
    pub burst_min_samples: u32,
    /// Rolling window for the loud run, also the burst debounce (ms)
    pub burst_window_ms: f64,
    /// Continuous quiet needed for a silence event (ms)
    pub silence_ms: f64,

    // === Threat ===
    /// Threat added per sound burst
    pub threat_raise: f32,
    /// Threat removed per silence event
    pub threat_decay: f32,
    /// Threat level set by the debug "show monster" button
    pub force_show_level: f32,

    // === Render surface ===
    /// How long to wait for the scene-loaded message before assuming it (ms)
    pub load_timeout_ms: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            burst_threshold: 50,
            burst_min_samples: 3,
            burst_window_ms: 1000.0,
            silence_ms: 3000.0,

            threat_raise: 20.0,
            threat_decay: 10.0,
            force_show_level: 100.0,

            load_timeout_ms: 5000.0,
        }
    }
}

impl Tuning {
    /// Copy with every value forced into a usable range
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let ms = |v: f64, fallback: f64| if v.is_finite() && v > 0.0 { v } else { fallback };
        let amount = |v: f32, fallback: f32| {
            if v.is_finite() {
                v.clamp(0.0, MAX_THREAT)
            } else {
                fallback
            }
        };

        Self {
            burst_threshold: self.burst_threshold,
            burst_min_samples: self.burst_min_samples.max(1),
            burst_window_ms: ms(self.burst_window_ms, defaults.burst_window_ms),
            silence_ms: ms(self.silence_ms, defaults.silence_ms),
            threat_raise: amount(self.threat_raise, defaults.threat_raise),
            threat_decay: amount(self.threat_decay, defaults.threat_decay),
            force_show_level: amount(self.force_show_level, defaults.force_show_level),
            load_timeout_ms: ms(self.load_timeout_ms, defaults.load_timeout_ms),
        }
    }
}

/// Game settings/preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sensor/threat tuning
    pub tuning: Tuning,
    /// Show the debug panel (force show/hide, find next treasure)
    pub debug_panel: bool,
}

impl Settings {
    /// LocalStorage key
    #[cfg(target_arch = "wasm32")]
    const STORAGE_KEY: &'static str = "hush_hunt_settings";

    /// Parse settings JSON, sanitizing the tuning block
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Settings = serde_json::from_str(json)?;
        settings.tuning = settings.tuning.sanitized();
        Ok(settings)
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let settings = Settings::from_json(r#"{"tuning":{"threat_raise":35.0}}"#).unwrap();
        assert_eq!(settings.tuning.threat_raise, 35.0);
        assert_eq!(settings.tuning.threat_decay, Tuning::default().threat_decay);
        assert!(!settings.debug_panel);
    }

    #[test]
    fn test_sanitize_rejects_nonsense() {
        let tuning = Tuning {
            burst_min_samples: 0,
            burst_window_ms: -5.0,
            threat_raise: 1000.0,
            load_timeout_ms: f64::NAN,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(tuning.burst_min_samples, 1);
        assert_eq!(tuning.burst_window_ms, 1000.0);
        assert_eq!(tuning.threat_raise, MAX_THREAT);
        assert_eq!(tuning.load_timeout_ms, 5000.0);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_native_load_uses_defaults() {
        let settings = Settings::load();
        assert_eq!(settings.tuning, Tuning::default());
        assert!(!settings.debug_panel);
        settings.save();
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(Settings::from_json("not json").is_err());
    }
}
