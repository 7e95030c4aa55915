//! Timing attack mitigation
//!
//! Authentication outcomes must not be distinguishable by response time:
//! a fast "unknown user" rejection versus a slow "wrong password" rejection
//! tells an attacker which emails exist.

use std::time::{Duration, Instant};

use crate::constants::MIN_AUTH_DURATION;

/// Pads an authentication attempt to a minimum wall time. Construct at the
/// top of the operation, call `wait()` on every exit path.
pub struct AuthTimer {
    start: Instant,
    min_duration: Duration,
}

impl AuthTimer {
    pub fn new(min_duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            min_duration,
        }
    }

    /// Timer with the standard minimum (100ms)
    pub fn start() -> Self {
        Self::new(MIN_AUTH_DURATION)
    }

    /// Wait until the minimum duration has elapsed
    pub async fn wait(self) {
        let elapsed = self.start.elapsed();
        if elapsed < self.min_duration {
            tokio::time::sleep(self.min_duration - elapsed).await;
        }
    }
}
