use std::time::Duration;

use moka::sync::Cache;

use super::Subscription;

/// Cache key: (license key, instance identifier).
type CacheKey = (String, String);

const MAX_ENTRIES: u64 = 1_024;

/// Validation results with a fixed time-to-live from insertion.
///
/// A miss only means "validate again"; it never means the key is invalid.
#[derive(Clone)]
pub struct ResultCache {
    inner: Cache<CacheKey, Subscription>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn get(&self, license_key: &str, instance_id: &str) -> Option<Subscription> {
        self.inner
            .get(&(license_key.to_string(), instance_id.to_string()))
    }

    /// Stores `result`, replacing any earlier entry and restarting its TTL.
    pub fn insert(&self, license_key: &str, instance_id: &str, result: Subscription) {
        self.inner
            .insert((license_key.to_string(), instance_id.to_string()), result);
    }
}
