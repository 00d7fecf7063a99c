//! Session controller
//!
//! The one place that owns the store. Sensor samples, iframe messages and
//! shell intents all arrive here on the event-loop thread and are applied in
//! the order they are observed.

use std::collections::VecDeque;

use crate::bridge::{BridgeStats, LoadState, MessageOutcome, OutboundMessage, RenderBridge};
use crate::sensors::{AudioEnvelope, Capabilities, GeoFix, GeoTracker, SensorKind, SensorStatus, amplitude_from_spectrum};
use crate::settings::Settings;
use crate::shell::{Intent, ShellView};
use crate::sim::{GameEvent, GameState, GameStore};

/// Work for the platform layer after a frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutput {
    /// New scene document to load into the iframe
    pub document: Option<String>,
    /// Messages to post to the iframe
    pub outbound: Vec<OutboundMessage>,
    /// The last treasure was opened since the previous frame
    pub cleared: bool,
}

/// A single play session
#[derive(Debug)]
pub struct Session {
    store: GameStore,
    audio: AudioEnvelope,
    geo: GeoTracker,
    bridge: RenderBridge,
    capabilities: Capabilities,
    /// Clear edge seen since the last frame
    pending_clear: bool,
    /// Recent store events for the debug panel (newest last)
    history: VecDeque<GameEvent>,
}

/// Events kept for the debug panel
const HISTORY_LEN: usize = 32;

impl Session {
    pub fn new(settings: &Settings) -> Self {
        Self::with_positions(settings, &crate::default_treasure_positions())
    }

    pub fn with_positions(settings: &Settings, positions: &[glam::Vec3]) -> Self {
        let store = GameStore::new(positions, settings.tuning.clone());
        let tuning = store.tuning().clone();
        log::info!(
            "Session ready: {} treasures, burst > {} for {} frames",
            positions.len(),
            tuning.burst_threshold,
            tuning.burst_min_samples
        );
        Self {
            audio: AudioEnvelope::new(&tuning),
            geo: GeoTracker::new(),
            bridge: RenderBridge::new(tuning.load_timeout_ms),
            capabilities: Capabilities::default(),
            pending_clear: false,
            history: VecDeque::with_capacity(HISTORY_LEN),
            store,
        }
    }

    pub fn state(&self) -> &GameState {
        self.store.state()
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn bridge_stats(&self) -> BridgeStats {
        self.bridge.stats()
    }

    pub fn load_state(&self) -> LoadState {
        self.bridge.load_state()
    }

    pub fn history(&self) -> impl Iterator<Item = &GameEvent> {
        self.history.iter()
    }

    /// Current shell projection
    pub fn view(&self) -> ShellView {
        ShellView::from_store(&self.store, &self.capabilities)
    }

    /// Record a sensor capability flag. Returns true if it changed.
    pub fn set_sensor_status(&mut self, kind: SensorKind, status: SensorStatus) -> bool {
        self.capabilities.set(kind, status)
    }

    /// A fresh render surface was attached; the next frame carries a full document
    pub fn attach_surface(&mut self) {
        log::info!("Render surface attached");
        self.bridge.invalidate();
    }

    /// Forget reducer windows after the platform re-acquired its sensors
    pub fn restart_sensors(&mut self) {
        self.audio = AudioEnvelope::new(self.store.tuning());
        self.geo = GeoTracker::new();
        log::info!("Sensor reducers reset");
    }

    /// One analyser frame from the microphone
    pub fn on_audio_frame(&mut self, spectrum: &[u8], now_ms: f64) {
        self.on_amplitude(amplitude_from_spectrum(spectrum), now_ms);
    }

    /// One amplitude sample (0-255)
    pub fn on_amplitude(&mut self, amplitude: u8, now_ms: f64) {
        if let Some(signal) = self.audio.sample(amplitude, now_ms) {
            self.dispatch(signal.into());
        }
    }

    /// One geolocation fix
    pub fn on_geo_fix(&mut self, fix: GeoFix) {
        if let Some(signal) = self.geo.observe(fix) {
            self.dispatch(signal.into());
        }
    }

    /// Raw message posted by the iframe
    pub fn on_message_json(&mut self, text: &str) -> Option<MessageOutcome> {
        let outcome = self.bridge.handle_json(&mut self.store, text)?;
        if let MessageOutcome::Click(crate::bridge::ClickOutcome::Accepted { index, cleared, .. }) = outcome {
            self.remember(GameEvent::Discover(index));
            self.pending_clear |= cleared;
        }
        Some(outcome)
    }

    /// Shell intent (buttons, debug panel)
    pub fn intent(&mut self, intent: Intent) {
        log::info!("Intent: {:?}", intent);
        for event in intent.events(&self.store) {
            self.dispatch(event);
        }
    }

    /// Advance timers and collect work for the platform layer
    pub fn frame(&mut self, now_ms: f64) -> FrameOutput {
        let document = self.bridge.sync(&self.store, now_ms);
        self.bridge.poll(now_ms);
        FrameOutput {
            document,
            outbound: self.bridge.drain_outbox(),
            cleared: std::mem::take(&mut self.pending_clear),
        }
    }

    fn dispatch(&mut self, event: GameEvent) {
        match self.store.dispatch(event) {
            Ok(dispatched) => {
                if dispatched.transition.changes_scene() {
                    self.remember(event);
                }
                self.pending_clear |= dispatched.cleared;
            }
            Err(e) => log::warn!("Rejected {:?}: {}", event, e),
        }
    }

    fn remember(&mut self, event: GameEvent) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }
}
