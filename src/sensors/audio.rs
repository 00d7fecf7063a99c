//! Audio envelope reducer
//!
//! Converts per-frame microphone amplitude into `SoundBurst` / `Silence`.
//! Attack is a few frames, release is seconds, so the monster lingers
//! briefly after a noise.

use super::SignalEvent;
use crate::settings::Tuning;

/// Mean of an analyser frequency frame (0 for an empty frame)
pub fn amplitude_from_spectrum(bins: &[u8]) -> u8 {
    if bins.is_empty() {
        return 0;
    }
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    (sum / bins.len() as u32) as u8
}

/// Sliding counters owned by the envelope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalWindow {
    /// Bursts emitted since creation
    pub burst_count: u32,
    /// Time of the last emitted burst
    pub last_burst_ms: Option<f64>,
    /// Consecutive loud samples in the current run
    loud_run: u32,
    /// Time of the first sample in the current loud run
    run_start_ms: Option<f64>,
    /// Start of the current quiet stretch
    quiet_since_ms: Option<f64>,
}

/// Hysteretic burst/silence detector
#[derive(Debug, Clone)]
pub struct AudioEnvelope {
    threshold: u8,
    min_samples: u32,
    window_ms: f64,
    silence_ms: f64,
    window: SignalWindow,
}

impl AudioEnvelope {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            threshold: tuning.burst_threshold,
            min_samples: tuning.burst_min_samples.max(1),
            window_ms: tuning.burst_window_ms,
            silence_ms: tuning.silence_ms,
            window: SignalWindow::default(),
        }
    }

    pub fn window(&self) -> &SignalWindow {
        &self.window
    }

    /// Feed one amplitude sample taken at `now_ms`
    pub fn sample(&mut self, amplitude: u8, now_ms: f64) -> Option<SignalEvent> {
        if amplitude > self.threshold {
            self.loud(now_ms)
        } else {
            self.quiet(now_ms)
        }
    }

    fn loud(&mut self, now_ms: f64) -> Option<SignalEvent> {
        let w = &mut self.window;
        w.quiet_since_ms = None;

        // A run that started too long ago no longer counts
        match w.run_start_ms {
            Some(start) if now_ms - start <= self.window_ms => w.loud_run += 1,
            _ => {
                w.run_start_ms = Some(now_ms);
                w.loud_run = 1;
            }
        }

        if w.loud_run < self.min_samples {
            return None;
        }

        let debounced = w
            .last_burst_ms
            .is_some_and(|last| now_ms - last < self.window_ms);
        if debounced {
            return None;
        }

        w.burst_count += 1;
        w.last_burst_ms = Some(now_ms);
        w.loud_run = 0;
        w.run_start_ms = None;
        Some(SignalEvent::SoundBurst)
    }

    fn quiet(&mut self, now_ms: f64) -> Option<SignalEvent> {
        let w = &mut self.window;
        w.loud_run = 0;
        w.run_start_ms = None;

        let since = *w.quiet_since_ms.get_or_insert(now_ms);
        if now_ms - since >= self.silence_ms {
            // Restart the quiet timer so a long silence keeps decaying
            w.quiet_since_ms = Some(now_ms);
            return Some(SignalEvent::Silence);
        }
        None
    }
}
