//! Challenge pacing.
//!
//! The scheduler is a one-shot deadline, not a repeating interval: it is
//! armed when challenging may proceed and disarmed while a challenge is
//! outstanding. A slow prover therefore never has two challenges queued.

use std::time::Duration;

use tokio::time::Instant;

/// One-shot challenge timer.
#[derive(Debug)]
pub struct ChallengeScheduler {
    interval: Duration,
    deadline: Option<Instant>,
}

impl ChallengeScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire one interval from now. Re-arming restarts the interval.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.interval);
    }

    /// Cancel any pending fire. Idempotent.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Arm if `wanted` and not already armed; disarm if not `wanted`.
    ///
    /// An already running countdown is left alone so repeated calls do not
    /// push the fire time back.
    pub fn sync(&mut self, wanted: bool) {
        match (wanted, self.is_armed()) {
            (true, false) => self.arm(),
            (false, true) => self.disarm(),
            _ => {}
        }
    }

    /// Resolve when the deadline passes; pend forever while disarmed.
    ///
    /// Does not consume the deadline. Callers disarm after handling the fire.
    /// Cancel-safe.
    pub async fn fired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
