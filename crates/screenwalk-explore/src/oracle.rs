//! Optional Q-value scoring of candidate elements.
//!
//! The scorer is an external model; its output only nudges target priority.
//! [`TimedScorer`] runs it on a worker thread and waits on a bounded channel,
//! so a slow, panicking or misbehaving scorer degrades to rule-based priority.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use screenwalk_ident::{ScreenId, UiElement};
use tracing::warn;

/// Scores every candidate element of one screen in a single batch.
/// Higher is more promising; values are expected in [0, 1].
pub trait QValueScorer: Send + Sync {
    fn score(&self, screen_id: &ScreenId, elements: &[UiElement]) -> Vec<f64>;
}

pub struct TimedScorer {
    inner: Arc<dyn QValueScorer>,
    timeout: Duration,
}

impl TimedScorer {
    pub fn new(inner: Arc<dyn QValueScorer>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One score per element, or `None` on timeout, panic, or a result of
    /// the wrong length.
    pub fn score(&self, screen_id: &ScreenId, elements: &[UiElement]) -> Option<Vec<f64>> {
        if elements.is_empty() {
            return Some(Vec::new());
        }

        let (tx, rx) = channel::bounded(1);
        let inner = Arc::clone(&self.inner);
        let screen = screen_id.clone();
        let batch = elements.to_vec();
        let spawned = thread::Builder::new()
            .name("qvalue-scorer".to_string())
            .spawn(move || {
                let scores = inner.score(&screen, &batch);
                let _ = tx.send(scores);
            });
        if let Err(e) = spawned {
            warn!(error = %e, "could not start scorer thread");
            return None;
        }

        match rx.recv_timeout(self.timeout) {
            Ok(scores) if scores.len() == elements.len() => Some(
                scores
                    .into_iter()
                    .map(|s| if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 })
                    .collect(),
            ),
            Ok(scores) => {
                warn!(screen = %screen_id, expected = elements.len(), got = scores.len(), "scorer returned wrong batch size");
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(screen = %screen_id, timeout_ms = self.timeout.as_millis() as u64, "scorer timed out");
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!(screen = %screen_id, "scorer worker exited without a result");
                None
            }
        }
    }
}

impl std::fmt::Debug for TimedScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedScorer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
