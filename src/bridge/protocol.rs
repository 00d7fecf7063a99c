//! Message contract across the iframe boundary
//!
//! The render surface is untrusted: every inbound message is validated here
//! before it can touch the store. Delivery may be duplicated, reordered or
//! late (a click from a scene that has since been regenerated).

use serde::{Deserialize, Serialize};

use crate::percent;
use crate::sim::{GameError, GameEvent, GameStore, Transition};

/// Messages posted by the render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    /// User clicked/tapped a treasure chest
    BoxClick { index: i64 },
    /// The scene document finished loading
    SceneLoaded {
        #[serde(default)]
        revision: Option<u64>,
    },
}

/// Messages posted to the render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    /// Toast content only; never a source of truth for discovery
    #[serde(rename_all = "camelCase")]
    ProgressUpdate {
        found_count: usize,
        total_count: usize,
        percent: u8,
    },
}

impl OutboundMessage {
    /// Progress snapshot of the store
    pub fn progress(store: &GameStore) -> Self {
        let state = store.state();
        let found_count = state.found_count();
        let total_count = state.total_count();
        OutboundMessage::ProgressUpdate {
            found_count,
            total_count,
            percent: percent(found_count, total_count),
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Undecodable inbound data
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("message has no type tag")]
    Untagged,
    #[error("unsupported message type: {0}")]
    Unsupported(String),
}

/// Decode a JSON message from the render surface
pub fn decode_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::Untagged)?;
    match kind {
        "box-click" | "scene-loaded" => Ok(serde_json::from_value(value)?),
        other => Err(ProtocolError::Unsupported(other.to_string())),
    }
}

/// What happened to a box-click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// First discovery of this treasure
    Accepted {
        index: usize,
        cleared: bool,
        progress: OutboundMessage,
    },
    /// Already found (duplicate or late delivery); dropped silently
    Duplicate { index: usize },
    /// Index not in the ledger
    Invalid { index: i64 },
    /// Game not started yet
    NotStarted { index: usize },
}

/// Validate a box-click and dispatch the discovery
pub fn handle_box_click(store: &mut GameStore, index: i64) -> ClickOutcome {
    let count = store.state().total_count();
    let Some(slot) = usize::try_from(index).ok().filter(|&i| i < count) else {
        log::warn!("Ignoring box-click for unknown treasure {} (have {})", index, count);
        return ClickOutcome::Invalid { index };
    };

    if store.state().is_found(slot) {
        log::debug!("Treasure {} already found - skipping", slot);
        return ClickOutcome::Duplicate { index: slot };
    }

    match store.dispatch(GameEvent::Discover(slot)) {
        Ok(dispatched) => match dispatched.transition {
            Transition::Discovered { index } => ClickOutcome::Accepted {
                index,
                cleared: dispatched.cleared,
                progress: OutboundMessage::progress(store),
            },
            Transition::AlreadyFound { index } => ClickOutcome::Duplicate { index },
            _ => ClickOutcome::NotStarted { index: slot },
        },
        Err(GameError::InvalidIndex { .. }) => ClickOutcome::Invalid { index },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Tuning;

    fn started_store() -> GameStore {
        let mut store = GameStore::new(&crate::default_treasure_positions(), Tuning::default());
        store.dispatch(GameEvent::StartGame).unwrap();
        store
    }

    #[test]
    fn test_decode_box_click() {
        let msg = decode_inbound(r#"{"type":"box-click","index":2}"#).unwrap();
        assert_eq!(msg, InboundMessage::BoxClick { index: 2 });
    }

    #[test]
    fn test_decode_scene_loaded() {
        assert_eq!(
            decode_inbound(r#"{"type":"scene-loaded","revision":4}"#).unwrap(),
            InboundMessage::SceneLoaded { revision: Some(4) }
        );
        assert_eq!(
            decode_inbound(r#"{"type":"scene-loaded"}"#).unwrap(),
            InboundMessage::SceneLoaded { revision: None }
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_inbound("nope"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(decode_inbound(r#"{"index":1}"#), Err(ProtocolError::Untagged)));
        assert!(matches!(
            decode_inbound(r#"{"type":"webpackOk"}"#),
            Err(ProtocolError::Unsupported(t)) if t == "webpackOk"
        ));
        assert!(matches!(
            decode_inbound(r#"{"type":"box-click","index":"one"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_progress_wire_format() {
        let msg = OutboundMessage::ProgressUpdate {
            found_count: 1,
            total_count: 3,
            percent: 33,
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "progress-update");
        assert_eq!(json["foundCount"], 1);
        assert_eq!(json["totalCount"], 3);
        assert_eq!(json["percent"], 33);
    }

    #[test]
    fn test_click_accepted_then_duplicate() {
        let mut store = started_store();
        match handle_box_click(&mut store, 1) {
            ClickOutcome::Accepted { index, cleared, progress } => {
                assert_eq!(index, 1);
                assert!(!cleared);
                assert_eq!(
                    progress,
                    OutboundMessage::ProgressUpdate {
                        found_count: 1,
                        total_count: 3,
                        percent: 33
                    }
                );
            }
            other => panic!("expected Accepted, got {:?}", other),
        }
        let revision = store.revision();
        assert_eq!(handle_box_click(&mut store, 1), ClickOutcome::Duplicate { index: 1 });
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_click_invalid_indices() {
        let mut store = started_store();
        let before = store.state().clone();
        for index in [-1, 3, 999] {
            assert_eq!(handle_box_click(&mut store, index), ClickOutcome::Invalid { index });
        }
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_click_before_start() {
        let mut store = GameStore::new(&crate::default_treasure_positions(), Tuning::default());
        assert_eq!(handle_box_click(&mut store, 0), ClickOutcome::NotStarted { index: 0 });
        assert_eq!(store.state().found_count(), 0);
    }

    #[test]
    fn test_last_click_clears() {
        let mut store = started_store();
        handle_box_click(&mut store, 0);
        handle_box_click(&mut store, 2);
        match handle_box_click(&mut store, 1) {
            ClickOutcome::Accepted { cleared, progress, .. } => {
                assert!(cleared);
                assert_eq!(
                    progress,
                    OutboundMessage::ProgressUpdate {
                        found_count: 3,
                        total_count: 3,
                        percent: 100
                    }
                );
            }
            other => panic!("expected Accepted, got {:?}", other),
        }
    }
}
