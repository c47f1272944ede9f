//! Rate limiting for the login endpoint.
//!
//! Token bucket keyed by the login handle being attempted. Login is the
//! only endpoint that checks passwords, so it is the only one limited.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

/// Per-handle rate limiter.
pub type HandleLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-handle limiter for password logins (1 per second, burst of 10)
    pub login: Arc<HandleLimiter>,
}

impl RateLimitConfig {
    /// Create rate limiters with default configuration.
    pub fn new() -> Self {
        const LOGIN_PER_SEC: u32 = 1;
        const LOGIN_BURST: u32 = 10;

        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(NonZeroU32::new(LOGIN_PER_SEC).unwrap())
                    .allow_burst(NonZeroU32::new(LOGIN_BURST).unwrap()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_limited() {
        let config = RateLimitConfig::new();
        let key = "alice".to_string();

        for _ in 0..10 {
            assert!(config.login.check_key(&key).is_ok());
        }
        assert!(config.login.check_key(&key).is_err());
    }

    #[test]
    fn test_keys_are_independent() {
        let config = RateLimitConfig::new();
        let alice = "alice".to_string();
        let bob = "bob".to_string();

        for _ in 0..10 {
            assert!(config.login.check_key(&alice).is_ok());
        }
        assert!(config.login.check_key(&alice).is_err());
        assert!(config.login.check_key(&bob).is_ok());
    }
}
