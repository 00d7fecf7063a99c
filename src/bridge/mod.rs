//! Render-surface bridge
//!
//! Keeps the sandboxed AR iframe consistent with the store:
//! - `scene`: pure state -> scene description -> HTML document
//! - `protocol`: typed messages and the box-click reducer
//! - `load`: bounded wait for the document's load acknowledgement

pub mod load;
pub mod protocol;
pub mod scene;

pub use load::{LoadState, LoadWatch};
pub use protocol::{ClickOutcome, InboundMessage, OutboundMessage, ProtocolError, decode_inbound, handle_box_click};
pub use scene::{SceneDescription, SceneTreasure, ThreatIndicator, describe};

use std::collections::VecDeque;

use crate::sim::GameStore;

/// Result of handling one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Click(ClickOutcome),
    Loaded,
    StaleLoad,
}

/// Counters for the debug panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub scenes_built: u32,
    pub clicks_accepted: u32,
    pub clicks_duplicate: u32,
    pub clicks_invalid: u32,
    pub messages_dropped: u32,
    pub load_timeouts: u32,
}

/// Owner-side half of the iframe connection
#[derive(Debug, Clone)]
pub struct RenderBridge {
    scene: Option<SceneDescription>,
    /// Store revision the current scene was built from
    built_from: Option<u64>,
    load: LoadWatch,
    outbox: VecDeque<OutboundMessage>,
    stats: BridgeStats,
}

impl RenderBridge {
    pub fn new(load_timeout_ms: f64) -> Self {
        Self {
            scene: None,
            built_from: None,
            load: LoadWatch::new(load_timeout_ms),
            outbox: VecDeque::new(),
            stats: BridgeStats::default(),
        }
    }

    pub fn scene(&self) -> Option<&SceneDescription> {
        self.scene.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        self.load.state()
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Rebuild the scene if the store changed since the last build.
    ///
    /// Returns the new document to hand to the render surface.
    pub fn sync(&mut self, store: &GameStore, now_ms: f64) -> Option<String> {
        let revision = store.revision();
        if self.built_from == Some(revision) {
            return None;
        }

        let state = store.state();
        let scene = describe(state.threat_level(), state.collectibles());
        let document = scene.to_document(revision);

        log::debug!(
            "Scene rebuilt (revision {}, {} treasures, ghost: {})",
            revision,
            scene.treasures.len(),
            scene.threat.is_some()
        );

        self.scene = Some(scene);
        self.built_from = Some(revision);
        self.load.begin(revision, now_ms);
        self.stats.scenes_built += 1;
        Some(document)
    }

    /// Forget the cached build so the next `sync` emits a document.
    ///
    /// Called when a new render surface appears; it has not seen any scene yet.
    pub fn invalidate(&mut self) {
        self.built_from = None;
    }

    /// Advance the load timeout
    pub fn poll(&mut self, now_ms: f64) {
        if self.load.poll(now_ms) {
            self.stats.load_timeouts += 1;
        }
    }

    /// Handle a decoded message from the render surface
    pub fn handle_message(&mut self, store: &mut GameStore, message: InboundMessage) -> MessageOutcome {
        match message {
            InboundMessage::BoxClick { index } => {
                let outcome = handle_box_click(store, index);
                match outcome {
                    ClickOutcome::Accepted { progress, .. } => {
                        self.stats.clicks_accepted += 1;
                        self.outbox.push_back(progress);
                    }
                    ClickOutcome::Duplicate { .. } => self.stats.clicks_duplicate += 1,
                    ClickOutcome::Invalid { .. } => self.stats.clicks_invalid += 1,
                    ClickOutcome::NotStarted { .. } => {}
                }
                MessageOutcome::Click(outcome)
            }
            InboundMessage::SceneLoaded { revision } => {
                if self.load.acknowledge(revision) {
                    MessageOutcome::Loaded
                } else {
                    MessageOutcome::StaleLoad
                }
            }
        }
    }

    /// Decode and handle raw JSON. Undecodable messages are dropped.
    pub fn handle_json(&mut self, store: &mut GameStore, text: &str) -> Option<MessageOutcome> {
        match decode_inbound(text) {
            Ok(message) => Some(self.handle_message(store, message)),
            Err(e) => {
                log::debug!("Dropping message from render surface: {}", e);
                self.stats.messages_dropped += 1;
                None
            }
        }
    }

    /// Outbound messages, held back until the current document is ready
    pub fn drain_outbox(&mut self) -> Vec<OutboundMessage> {
        if !self.load.is_ready() {
            return Vec::new();
        }
        self.outbox.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Tuning;
    use crate::sim::GameEvent;

    fn started_store() -> GameStore {
        let mut store = GameStore::new(&crate::default_treasure_positions(), Tuning::default());
        store.dispatch(GameEvent::StartGame).unwrap();
        store
    }

    #[test]
    fn test_sync_only_on_change() {
        let mut store = started_store();
        let mut bridge = RenderBridge::new(5000.0);

        assert!(bridge.sync(&store, 0.0).is_some());
        assert!(bridge.sync(&store, 1.0).is_none());

        store.dispatch(GameEvent::Silence).unwrap(); // no change at zero threat
        assert!(bridge.sync(&store, 2.0).is_none());

        store.dispatch(GameEvent::SoundBurst).unwrap();
        assert!(bridge.sync(&store, 3.0).is_some());
        assert_eq!(bridge.stats().scenes_built, 2);
    }

    #[test]
    fn test_progress_held_until_reload() {
        let mut store = started_store();
        let mut bridge = RenderBridge::new(5000.0);
        bridge.sync(&store, 0.0);
        bridge.handle_json(&mut store, r#"{"type":"scene-loaded","revision":0}"#);

        let outcome = bridge.handle_json(&mut store, r#"{"type":"box-click","index":0}"#);
        assert!(matches!(outcome, Some(MessageOutcome::Click(ClickOutcome::Accepted { index: 0, .. }))));

        // Scene regenerates; the toast waits for the new document
        let document = bridge.sync(&store, 10.0).unwrap();
        assert!(!document.contains("treasure-box=\"index: 0\""));
        assert!(bridge.drain_outbox().is_empty());

        let ack = format!(r#"{{"type":"scene-loaded","revision":{}}}"#, store.revision());
        assert_eq!(bridge.handle_json(&mut store, &ack), Some(MessageOutcome::Loaded));
        assert_eq!(bridge.drain_outbox().len(), 1);
        assert!(bridge.drain_outbox().is_empty());
    }

    #[test]
    fn test_stale_click_after_regeneration() {
        let mut store = started_store();
        let mut bridge = RenderBridge::new(5000.0);
        bridge.sync(&store, 0.0);

        bridge.handle_message(&mut store, InboundMessage::BoxClick { index: 2 });
        bridge.sync(&store, 5.0);
        // Same click delivered again from the old document
        let outcome = bridge.handle_message(&mut store, InboundMessage::BoxClick { index: 2 });
        assert_eq!(outcome, MessageOutcome::Click(ClickOutcome::Duplicate { index: 2 }));
        assert_eq!(store.state().found_count(), 1);
        assert_eq!(bridge.stats().clicks_duplicate, 1);
    }

    #[test]
    fn test_timeout_releases_outbox() {
        let mut store = started_store();
        let mut bridge = RenderBridge::new(5000.0);
        bridge.sync(&store, 0.0);
        bridge.handle_message(&mut store, InboundMessage::BoxClick { index: 1 });
        bridge.sync(&store, 100.0);

        bridge.poll(4000.0);
        assert!(bridge.drain_outbox().is_empty());
        bridge.poll(5100.0);
        assert!(matches!(bridge.load_state(), LoadState::Degraded { .. }));
        assert_eq!(bridge.drain_outbox().len(), 1);
        assert_eq!(bridge.stats().load_timeouts, 1);
    }

    #[test]
    fn test_invalidate_rebuilds_unchanged_scene() {
        let mut store = GameStore::new(&crate::default_treasure_positions(), Tuning::default());
        let mut bridge = RenderBridge::new(5000.0);

        // Built before any surface existed
        assert!(bridge.sync(&store, 0.0).is_some());
        store.dispatch(GameEvent::StartGame).unwrap();
        assert!(bridge.sync(&store, 10.0).is_none());

        bridge.invalidate();
        let document = bridge.sync(&store, 20.0).expect("surface needs a document");
        assert!(document.contains("treasure-box=\"index: 0\""));
        assert!(bridge.sync(&store, 30.0).is_none());
    }

    #[test]
    fn test_regenerating_scene_still_times_out() {
        let mut store = started_store();
        store.dispatch(GameEvent::ForceShow).unwrap();
        let mut bridge = RenderBridge::new(5000.0);
        bridge.sync(&store, 0.0);
        bridge.handle_message(&mut store, InboundMessage::BoxClick { index: 0 });

        // A small move every second keeps rebuilding the scene
        let mut delivered_at = None;
        for second in 1..=30 {
            let now = second as f64 * 1000.0;
            store.dispatch(GameEvent::Moved(1.0)).unwrap();
            assert!(bridge.sync(&store, now).is_some());
            bridge.poll(now);
            if !bridge.drain_outbox().is_empty() {
                delivered_at = Some(now);
                break;
            }
        }
        assert_eq!(delivered_at, Some(5000.0));
        assert_eq!(bridge.stats().load_timeouts, 1);
    }

    #[test]
    fn test_garbage_counted_and_dropped() {
        let mut store = started_store();
        let mut bridge = RenderBridge::new(5000.0);
        assert_eq!(bridge.handle_json(&mut store, "{"), None);
        assert_eq!(bridge.handle_json(&mut store, r#"{"type":"other"}"#), None);
        assert_eq!(bridge.stats().messages_dropped, 2);
    }
}
