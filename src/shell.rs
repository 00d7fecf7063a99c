//! Presentation shell projection
//!
//! Reads the store and produces what the start/progress/clear screens show.
//! The shell never mutates state directly; it sends `Intent`s.

use serde::{Deserialize, Serialize};

use crate::percent;
use crate::sensors::{Capabilities, SensorKind};
use crate::sim::{GameEvent, GameStore};

/// Which full-screen view is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    /// Rules and the start button
    Start,
    /// Camera feed with the progress HUD
    Playing,
    /// Every treasure found
    Clear,
}

/// High-level player/debug intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    StartGame,
    ResetTreasures,
    /// Clear screen "play again": reset then start
    Restart,
    /// Debug: summon the monster
    ForceShow,
    /// Debug: dismiss the monster
    ForceHide,
    /// Debug: open the first unfound treasure
    FindNext,
}

impl Intent {
    /// Store events for this intent, in dispatch order
    pub fn events(&self, store: &GameStore) -> Vec<GameEvent> {
        match self {
            Intent::StartGame => vec![GameEvent::StartGame],
            Intent::ResetTreasures => vec![GameEvent::ResetTreasures],
            Intent::Restart => vec![GameEvent::ResetTreasures, GameEvent::StartGame],
            Intent::ForceShow => vec![GameEvent::ForceShow],
            Intent::ForceHide => vec![GameEvent::ForceHide],
            Intent::FindNext => store
                .state()
                .collectibles()
                .iter()
                .position(|c| !c.found())
                .map(GameEvent::Discover)
                .into_iter()
                .collect(),
        }
    }
}

pub const HINT_MONSTER: &str = "The monster is coming! Slip away quietly.";
pub const HINT_SEARCH: &str = "Look for treasure chests and tap them to open.";

/// Progress HUD contents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hud {
    pub found: usize,
    pub total: usize,
    pub percent: u8,
    pub threat_level: f32,
    pub monster_near: bool,
    pub hint: &'static str,
    /// Last opened treasure, for the found flash
    pub last_found: Option<usize>,
}

impl Hud {
    /// Text of the found flash for the last opened treasure
    pub fn found_message(&self) -> Option<String> {
        self.last_found.map(|_| {
            format!("Treasure found! {}/{} ({}%)", self.found, self.total, self.percent)
        })
    }
}

/// How long the found flash stays up (ms)
pub const FOUND_FLASH_MS: f64 = 2000.0;

/// Timed "treasure found" overlay, raised whenever `last_found` changes
#[derive(Debug, Clone, Default)]
pub struct FoundFlash {
    seen: Option<usize>,
    until_ms: f64,
    message: String,
}

impl FoundFlash {
    /// Text to show at `now_ms`, or `None` while the overlay is hidden
    pub fn update(&mut self, hud: &Hud, now_ms: f64) -> Option<&str> {
        if hud.last_found != self.seen {
            self.seen = hud.last_found;
            match hud.found_message() {
                Some(message) => {
                    self.message = message;
                    self.until_ms = now_ms + FOUND_FLASH_MS;
                }
                None => self.until_ms = 0.0,
            }
        }
        (now_ms < self.until_ms).then_some(self.message.as_str())
    }
}

/// Everything the shell renders this frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShellView {
    pub screen: Screen,
    pub hud: Hud,
    /// Sensors that failed; non-empty shows the re-grant overlay
    pub missing_sensors: Vec<SensorKind>,
}

impl ShellView {
    pub fn from_store(store: &GameStore, capabilities: &Capabilities) -> Self {
        let state = store.state();
        let screen = if !state.started() {
            Screen::Start
        } else if state.all_found() {
            Screen::Clear
        } else {
            Screen::Playing
        };

        let found = state.found_count();
        let total = state.total_count();
        let monster_near = state.threat_level() > 0.0;

        Self {
            screen,
            hud: Hud {
                found,
                total,
                percent: percent(found, total),
                threat_level: state.threat_level(),
                monster_near,
                hint: if monster_near { HINT_MONSTER } else { HINT_SEARCH },
                last_found: state.last_discovered(),
            },
            missing_sensors: capabilities.unavailable(),
        }
    }

    pub fn permission_overlay(&self) -> bool {
        !self.missing_sensors.is_empty()
    }
}
