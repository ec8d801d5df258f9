//! Bounded polling until the service reports ready.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prober::Readiness;
use crate::session::SessionState;

/// How long to keep polling and how often.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_wait: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    pub fn new(max_wait: Duration, interval: Duration) -> Self {
        Self { max_wait, interval }
    }

    pub fn attempts(&self) -> u32 {
        attempt_budget(self.max_wait, self.interval)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(5))
    }
}

/// `max(1, floor(max_wait / interval))`. A zero interval gets a single attempt.
pub fn attempt_budget(max_wait: Duration, interval: Duration) -> u32 {
    if interval.is_zero() {
        return 1;
    }
    let attempts = max_wait.as_nanos() / interval.as_nanos();
    u32::try_from(attempts).unwrap_or(u32::MAX).max(1)
}

/// Reported after each failed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitProgress {
    /// 1-based number of the probe that just failed.
    pub attempt: u32,
    pub attempts: u32,
}

impl WaitProgress {
    pub fn fraction(&self) -> f32 {
        self.attempt as f32 / self.attempts as f32
    }
}

/// Wake the service and poll it until it is ready, the budget runs out, or `cancel` fires.
///
/// Writes the result to `state.api_ready`. Probes are strictly sequential and
/// the first success returns immediately.
pub async fn wait_until_ready<R: Readiness>(
    prober: &R,
    state: &mut SessionState,
    policy: WaitPolicy,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(WaitProgress),
) -> bool {
    let attempts = policy.attempts();
    info!(attempts, interval = ?policy.interval, "waiting for service");
    prober.wake().await;

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            break;
        }
        if prober.probe().await {
            info!(attempt, "service ready");
            state.api_ready = true;
            return true;
        }
        debug!(attempt, attempts, "service not ready");
        on_progress(WaitProgress { attempt, attempts });
        // The last failed attempt returns at once, without a final sleep or wake.
        if attempt == attempts {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(policy.interval) => {}
        }
        prober.wake().await;
    }

    if cancel.is_cancelled() {
        info!("wait for service cancelled");
    } else {
        warn!(attempts, "service did not become ready");
    }
    state.api_ready = false;
    false
}
