//! Time-expiring authorization cache
//!
//! Records successful authorizations keyed by (token, project id). Entries
//! expire lazily: nothing sweeps them, a lookup simply refuses an entry
//! older than the TTL. The cache is bounded; inserting past capacity drops
//! expired entries first, then the oldest one.
//!
//! The gate never authorizes from this cache. It is a secondary lookup for
//! callers that only want to know who was last seen with a credential.

use chrono::{DateTime, Utc};
use emuws_common::db::Identity;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default entry lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default maximum number of entries
pub const DEFAULT_CAPACITY: usize = 1024;

type CacheKey = (String, String);

/// One cached authorization
#[derive(Debug, Clone)]
pub struct AuthRecord {
    pub token: String,
    pub project_id: String,
    pub identity: Identity,
    /// Monotonic time of the last successful authorization
    pub issued_at: Instant,
    /// Wall-clock time of the same event, for logs
    pub issued_at_utc: DateTime<Utc>,
}

impl AuthRecord {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.issued_at) <= ttl
    }
}

/// Bounded map of recent authorizations
#[derive(Debug)]
pub struct AuthCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<CacheKey, AuthRecord>>,
}

impl Default for AuthCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl AuthCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, AuthRecord>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a successful authorization, refreshing an existing entry
    pub fn record(&self, token: &str, project_id: &str, identity: &Identity) {
        self.record_at(token, project_id, identity, Instant::now());
    }

    pub(crate) fn record_at(&self, token: &str, project_id: &str, identity: &Identity, now: Instant) {
        let key = (token.to_string(), project_id.to_string());
        let mut entries = self.entries();

        if let Some(existing) = entries.get_mut(&key) {
            existing.identity = identity.clone();
            existing.issued_at = now;
            existing.issued_at_utc = Utc::now();
            return;
        }

        if entries.len() >= self.capacity {
            let ttl = self.ttl;
            entries.retain(|_, record| record.is_fresh(ttl, now));
        }
        if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, record)| record.issued_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            AuthRecord {
                token: token.to_string(),
                project_id: project_id.to_string(),
                identity: identity.clone(),
                issued_at: now,
                issued_at_utc: Utc::now(),
            },
        );
    }

    /// Identity recorded for (token, project id), unless expired
    pub fn lookup(&self, token: &str, project_id: &str) -> Option<AuthRecord> {
        self.lookup_at(token, project_id, Instant::now())
    }

    pub(crate) fn lookup_at(&self, token: &str, project_id: &str, now: Instant) -> Option<AuthRecord> {
        let entries = self.entries();
        entries
            .get(&(token.to_string(), project_id.to_string()))
            .filter(|record| record.is_fresh(self.ttl, now))
            .cloned()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(username: &str) -> Identity {
        Identity {
            id: username.to_string(),
            username: username.to_string(),
            eppn: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[test]
    fn test_fresh_entry_returned() {
        let cache = AuthCache::default();
        cache.record("tok", "p1", &identity("alice"));

        let record = cache.lookup("tok", "p1").unwrap();
        assert_eq!(record.identity.username, "alice");
        assert!(cache.lookup("tok", "p2").is_none());
        assert!(cache.lookup("other", "p1").is_none());
    }

    #[test]
    fn test_expired_entry_never_returned() {
        let cache = AuthCache::default();
        let start = Instant::now();
        cache.record_at("tok", "p1", &identity("alice"), start);

        assert!(cache.lookup_at("tok", "p1", start + DEFAULT_TTL).is_some());
        assert!(cache
            .lookup_at("tok", "p1", start + DEFAULT_TTL + Duration::from_millis(1))
            .is_none());

        // Expiry is lazy: the entry is still stored
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reuse_refreshes_timestamp() {
        let cache = AuthCache::default();
        let start = Instant::now();
        cache.record_at("tok", "p1", &identity("alice"), start);
        cache.record_at("tok", "p1", &identity("alice"), start + Duration::from_secs(1800));

        let later = start + DEFAULT_TTL + Duration::from_secs(60);
        assert!(cache.lookup_at("tok", "p1", later).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = AuthCache::new(DEFAULT_TTL, 2);
        let start = Instant::now();
        cache.record_at("a", "p1", &identity("a"), start);
        cache.record_at("b", "p1", &identity("b"), start + Duration::from_secs(1));
        cache.record_at("c", "p1", &identity("c"), start + Duration::from_secs(2));

        let now = start + Duration::from_secs(3);
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup_at("a", "p1", now).is_none());
        assert!(cache.lookup_at("b", "p1", now).is_some());
        assert!(cache.lookup_at("c", "p1", now).is_some());
    }

    #[test]
    fn test_capacity_prefers_dropping_expired() {
        let cache = AuthCache::new(Duration::from_secs(10), 2);
        let start = Instant::now();
        cache.record_at("old", "p1", &identity("old"), start);
        cache.record_at("new", "p1", &identity("new"), start + Duration::from_secs(15));
        cache.record_at("newer", "p1", &identity("newer"), start + Duration::from_secs(16));

        let now = start + Duration::from_secs(17);
        assert!(cache.lookup_at("new", "p1", now).is_some());
        assert!(cache.lookup_at("newer", "p1", now).is_some());
    }
}
