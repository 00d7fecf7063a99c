//! Render-surface load acknowledgement with a bounded wait
//!
//! After each scene regeneration the iframe posts `scene-loaded`. If that
//! never arrives (camera prompt stuck, script blocked) we stop waiting after
//! the timeout and carry on as if it had loaded.

/// Load progress of the current scene document
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadState {
    /// No document yet
    Idle,
    /// Waiting for the acknowledgement since the given time
    Pending { revision: u64, since_ms: f64 },
    /// Acknowledged by the document
    Loaded { revision: u64 },
    /// Timed out; assumed loaded
    Degraded { revision: u64 },
}

/// Tracks the load acknowledgement of the most recent document
#[derive(Debug, Clone)]
pub struct LoadWatch {
    state: LoadState,
    timeout_ms: f64,
}

impl LoadWatch {
    pub fn new(timeout_ms: f64) -> Self {
        Self {
            state: LoadState::Idle,
            timeout_ms,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// The document can receive messages (acknowledged or timed out)
    pub fn is_ready(&self) -> bool {
        matches!(self.state, LoadState::Loaded { .. } | LoadState::Degraded { .. })
    }

    /// A new document was handed to the render surface.
    ///
    /// The wait is measured from the first unacknowledged document, so a scene
    /// that keeps regenerating cannot postpone the timeout. After a timeout the
    /// surface stays degraded until it acknowledges something.
    pub fn begin(&mut self, revision: u64, now_ms: f64) {
        self.state = match self.state {
            LoadState::Pending { since_ms, .. } => LoadState::Pending { revision, since_ms },
            LoadState::Degraded { .. } => LoadState::Degraded { revision },
            LoadState::Idle | LoadState::Loaded { .. } => LoadState::Pending {
                revision,
                since_ms: now_ms,
            },
        };
    }

    /// Handle a `scene-loaded` message. Returns false for stale acknowledgements.
    ///
    /// An acknowledgement without a revision is taken to refer to the current document.
    pub fn acknowledge(&mut self, revision: Option<u64>) -> bool {
        let current = match self.state {
            LoadState::Idle => return false,
            LoadState::Pending { revision, .. }
            | LoadState::Loaded { revision }
            | LoadState::Degraded { revision } => revision,
        };
        if revision.is_some_and(|r| r != current) {
            log::debug!("Stale scene-loaded for revision {:?} (current {})", revision, current);
            return false;
        }
        if matches!(self.state, LoadState::Pending { .. } | LoadState::Degraded { .. }) {
            log::info!("AR scene loaded (revision {})", current);
        }
        self.state = LoadState::Loaded { revision: current };
        true
    }

    /// Advance the timeout. Returns true when this call entered degraded mode.
    pub fn poll(&mut self, now_ms: f64) -> bool {
        if let LoadState::Pending { revision, since_ms } = self.state {
            if now_ms - since_ms >= self.timeout_ms {
                log::warn!(
                    "AR scene did not acknowledge within {} ms - assuming loaded",
                    self.timeout_ms
                );
                self.state = LoadState::Degraded { revision };
                return true;
            }
        }
        false
    }
}
