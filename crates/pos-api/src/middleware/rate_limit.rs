//! Login throttling keyed by client IP and login form

use std::net::IpAddr;
use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use crate::error::ApiError;

/// Client address and the login path it posted to.
type LoginKey = (IpAddr, &'static str);

pub struct LoginLimiter {
    limiter: DefaultKeyedRateLimiter<LoginKey>,
}

impl LoginLimiter {
    /// A zero rate is treated as one attempt per minute.
    pub fn new(per_minute: u32) -> Self {
        let rate = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(rate)),
        }
    }

    pub fn check(&self, ip: IpAddr, form: &'static str) -> Result<(), ApiError> {
        self.limiter.check_key(&(ip, form)).map_err(|_| {
            warn!("Login rate limit hit for {} on {}", ip, form);
            ApiError::TooManyRequests
        })
    }

    /// Drops state for clients that have not been seen within a full period.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::session::{ADMIN_LOGIN_PATH as ADMIN, TENANT_LOGIN_PATH as TENANT};

    #[test]
    fn test_limit_is_per_ip() {
        let limiter = LoginLimiter::new(2);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a, TENANT).is_ok());
        assert!(limiter.check(a, TENANT).is_ok());
        assert!(matches!(limiter.check(a, TENANT), Err(ApiError::TooManyRequests)));
        assert!(limiter.check(b, TENANT).is_ok());
    }

    #[test]
    fn test_consoles_have_separate_budgets() {
        let limiter = LoginLimiter::new(1);
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        assert!(limiter.check(ip, TENANT).is_ok());
        assert!(limiter.check(ip, TENANT).is_err());
        assert!(limiter.check(ip, ADMIN).is_ok());
        assert!(limiter.check(ip, ADMIN).is_err());
    }

    #[test]
    fn test_zero_rate_still_admits_one() {
        let limiter = LoginLimiter::new(0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.check(ip, ADMIN).is_ok());
        assert!(limiter.check(ip, ADMIN).is_err());
    }
}
