//! Progress emission throttling.
//!
//! yt-dlp reports progress far more often than Telegram tolerates message
//! edits, so each job's samples pass through a per-key gate: an edit goes
//! out when enough time has passed since the last one, or when the
//! percentage enters a 5% bucket that has not been reported yet.

use crate::core::config;
use crate::download::supervisor::JobKey;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Per-job state of the last accepted emission
#[derive(Debug, Clone, Copy)]
struct ThrottleState {
    last_emit: Instant,
    last_percent: u8,
}

/// Decides whether a progress sample for a given job becomes a user-visible
/// update. Stateful per `JobKey`; state lives exactly as long as the job and
/// is dropped via [`ProgressThrottle::forget`].
///
/// Samples for one job arrive strictly in order (a single forwarding task
/// per job), so no synchronization is needed beyond the interior mutex.
pub struct ProgressThrottle {
    min_interval: Duration,
    percent_step: u8,
    state: Mutex<HashMap<JobKey, ThrottleState>>,
}

impl ProgressThrottle {
    /// Creates a throttle with the given minimum interval and percent bucket size.
    pub fn new(min_interval: Duration, percent_step: u8) -> Self {
        Self {
            min_interval,
            percent_step: percent_step.max(1),
            state: Mutex::new(HashMap::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, HashMap<JobKey, ThrottleState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true when an update for this job should be emitted now, and
    /// records the emission. The first sample for a key always emits.
    pub fn should_emit(&self, key: JobKey, percent: u8, now: Instant) -> bool {
        let mut state = self.state();

        let emit = match state.get(&key) {
            None => true,
            Some(prev) => {
                let interval_elapsed = now.duration_since(prev.last_emit) >= self.min_interval;
                let new_bucket = percent / self.percent_step != prev.last_percent / self.percent_step;
                interval_elapsed || new_bucket
            }
        };

        if emit {
            state.insert(
                key,
                ThrottleState {
                    last_emit: now,
                    last_percent: percent,
                },
            );
        }
        emit
    }

    /// Drops the state for a finished job.
    pub fn forget(&self, key: JobKey) {
        self.state().remove(&key);
    }

    /// Number of jobs with live throttle state (used by tests and the
    /// supervisor's cleanup assertions).
    pub fn tracked(&self) -> usize {
        self.state().len()
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(config::progress::edit_interval(), config::progress::PERCENT_STEP)
    }
}
