use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::domain::UserId;

// ============== Rate Limiter (Fixed Window) ==============

/// Per-user minimum spacing between accepted requests.
///
/// The window is measured from the last *accepted* request; rejected attempts
/// do not push it forward.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    window: Duration,
    last_accepted: HashMap<UserId, Instant>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    /// Returns `(allowed, retry_after)`.
    pub fn check(&mut self, user_id: UserId) -> (bool, Option<Duration>) {
        self.check_at(user_id, Instant::now())
    }

    pub fn check_at(&mut self, user_id: UserId, now: Instant) -> (bool, Option<Duration>) {
        if let Some(last) = self.last_accepted.get(&user_id) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.window {
                return (false, Some(self.window - elapsed));
            }
        }
        self.last_accepted.insert(user_id, now);
        (true, None)
    }
}
