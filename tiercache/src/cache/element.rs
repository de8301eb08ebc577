//! Cache elements: a key, an opaque value and its expiry metadata.

use crate::cache::expiration::Expiry;
use crate::cache::types::ElementOptions;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// A cached value together with its timestamps and expiry settings.
///
/// Values are opaque bytes; the engine never interprets them.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tiercache::cache::Element;
///
/// let element = Element::new("greeting", b"hello".to_vec())
///     .with_ttl(Duration::from_secs(60));
///
/// assert_eq!(element.key(), "greeting");
/// assert_eq!(element.ttl(), Some(Duration::from_secs(60)));
/// assert!(!element.is_eternal());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    key: String,
    value: Vec<u8>,
    expiry: Expiry,
    hits: u64,
}

impl Element {
    /// Create an element stamped now, with no ttl/tti and not eternal.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expiry: Expiry::new(SystemTime::now(), None, None, false),
            hits: 0,
        }
    }

    /// Build an element from put options, resolving the eternal flag.
    pub(crate) fn from_options(
        key: String,
        value: Vec<u8>,
        options: &ElementOptions,
        default_eternal: bool,
        now: SystemTime,
    ) -> Self {
        Self {
            key,
            value,
            expiry: Expiry::new(
                now,
                options.ttl,
                options.tti,
                options.resolve_eternal(default_eternal),
            ),
            hits: 0,
        }
    }

    pub(crate) fn from_parts(key: String, value: Vec<u8>, expiry: Expiry, hits: u64) -> Self {
        Self {
            key,
            value,
            expiry,
            hits,
        }
    }

    /// Set time-to-live. Zero clears it.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiry.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// Set time-to-idle. Zero clears it.
    pub fn with_tti(mut self, tti: Duration) -> Self {
        self.expiry.tti = (!tti.is_zero()).then_some(tti);
        self
    }

    /// Set the eternal flag.
    pub fn with_eternal(mut self, eternal: bool) -> Self {
        self.expiry.eternal = eternal;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consume the element, returning its value.
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn created_at(&self) -> SystemTime {
        self.expiry.created_at
    }

    pub fn last_accessed(&self) -> SystemTime {
        self.expiry.last_accessed
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.expiry.ttl
    }

    pub fn tti(&self) -> Option<Duration> {
        self.expiry.tti
    }

    pub fn is_eternal(&self) -> bool {
        self.expiry.eternal
    }

    /// Number of successful reads of this element.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn expiry(&self) -> &Expiry {
        &self.expiry
    }

    /// Whether the element is dead at `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expiry.is_expired(now)
    }

    /// Record a read at `now`.
    pub(crate) fn touch(&mut self, now: SystemTime) {
        self.expiry.touch(now);
        self.hits += 1;
    }

    pub(crate) fn into_parts(self) -> (String, Vec<u8>, Expiry, u64) {
        (self.key, self.value, self.expiry, self.hits)
    }
}
