//! Time-based liveness of cache elements.
//!
//! An element is dead when it is not eternal and either its time-to-live has
//! elapsed since creation or its time-to-idle has elapsed since the last
//! access. Both checks use `>=`, so an element with a 1s TTL is dead exactly
//! one second after creation.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Timestamps and expiry settings of a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expiry {
    /// When the element was created (or last replaced by a put)
    pub created_at: SystemTime,
    /// When the element was last read or written
    pub last_accessed: SystemTime,
    /// Time-to-live
    pub ttl: Option<Duration>,
    /// Time-to-idle
    pub tti: Option<Duration>,
    /// Immune to ttl/tti when set
    pub eternal: bool,
}

impl Expiry {
    /// Fresh expiry settings stamped at `now`.
    pub fn new(now: SystemTime, ttl: Option<Duration>, tti: Option<Duration>, eternal: bool) -> Self {
        Self {
            created_at: now,
            last_accessed: now,
            ttl,
            tti,
            eternal,
        }
    }

    /// Whether the element is dead at `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        is_expired(self, now)
    }

    /// Record an access at `now`.
    pub(crate) fn touch(&mut self, now: SystemTime) {
        if now > self.last_accessed {
            self.last_accessed = now;
        }
    }
}

/// Expiration rule shared by both tiers and the background sweeper.
pub fn is_expired(expiry: &Expiry, now: SystemTime) -> bool {
    if expiry.eternal {
        return false;
    }

    let ttl_elapsed = expiry
        .ttl
        .is_some_and(|ttl| elapsed(expiry.created_at, now) >= ttl);
    let tti_elapsed = expiry
        .tti
        .is_some_and(|tti| elapsed(expiry.last_accessed, now) >= tti);

    ttl_elapsed || tti_elapsed
}

/// Time from `since` to `now`, zero if the clock went backwards.
fn elapsed(since: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(since).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expiry(ttl: Option<u64>, tti: Option<u64>, eternal: bool) -> (Expiry, SystemTime) {
        let now = SystemTime::now();
        let expiry = Expiry::new(
            now,
            ttl.map(Duration::from_secs),
            tti.map(Duration::from_secs),
            eternal,
        );
        (expiry, now)
    }

    #[test]
    fn test_no_limits_never_expires() {
        let (e, now) = expiry(None, None, false);
        assert!(!e.is_expired(now + Duration::from_secs(1_000_000)));
    }

    #[test]
    fn test_ttl_boundary_is_inclusive() {
        let (e, now) = expiry(Some(1), None, false);
        assert!(!e.is_expired(now + Duration::from_millis(999)));
        assert!(e.is_expired(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_ttl_ignores_access() {
        let (mut e, now) = expiry(Some(2), None, false);
        e.touch(now + Duration::from_millis(1900));
        assert!(e.is_expired(now + Duration::from_secs(2)));
    }

    #[test]
    fn test_tti_is_refreshed_by_access() {
        let (mut e, now) = expiry(None, Some(1), false);
        e.touch(now + Duration::from_millis(800));
        assert!(!e.is_expired(now + Duration::from_millis(1500)));
        assert!(e.is_expired(now + Duration::from_millis(1800)));
    }

    #[test]
    fn test_eternal_overrides_ttl_and_tti() {
        let (e, now) = expiry(Some(1), Some(1), true);
        assert!(!e.is_expired(now + Duration::from_secs(3600)));
    }

    #[test]
    fn test_clock_going_backwards_is_not_expiry() {
        let (e, now) = expiry(Some(1), Some(1), false);
        assert!(!e.is_expired(now - Duration::from_secs(10)));
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let (mut e, now) = expiry(None, Some(1), false);
        e.touch(now - Duration::from_secs(5));
        assert_eq!(e.last_accessed, now);
    }
}
