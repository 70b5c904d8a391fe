//! Replay cache for accepted partner envelopes.
//!
//! Keys are integrity digests of envelopes that passed every guard stage.
//! An entry lives until its envelope's freshness window closes; after that
//! the freshness check rejects the envelope anyway.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

pub struct ReplayCache {
    /// digest -> expiry (ms since epoch)
    seen: DashMap<String, i64>,
}

impl ReplayCache {
    pub fn new() -> Self {
        Self {
            seen: DashMap::new(),
        }
    }

    /// Record `key` until `expires_at_ms`.
    ///
    /// Returns `false` if the key is already recorded and unexpired.
    /// The entry API makes check-and-insert atomic per key.
    pub fn check_and_insert(&self, key: &str, expires_at_ms: i64, now_ms: i64) -> bool {
        match self.seen.entry(key.to_string()) {
            Entry::Occupied(mut e) => {
                if *e.get() < now_ms {
                    e.insert(expires_at_ms);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(v) => {
                v.insert(expires_at_ms);
                true
            }
        }
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self, now_ms: i64) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, expires| *expires >= now_ms);
        before.saturating_sub(self.seen.len())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for ReplayCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_first_use_accepted_second_rejected() {
        let cache = ReplayCache::new();
        assert!(cache.check_and_insert("d1", 1_000, 0));
        assert!(!cache.check_and_insert("d1", 1_000, 500));
        assert!(cache.check_and_insert("d2", 1_000, 500));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_expired_entry_can_be_reused() {
        let cache = ReplayCache::new();
        assert!(cache.check_and_insert("d1", 1_000, 0));
        assert!(cache.check_and_insert("d1", 3_000, 1_001));
    }

    #[test]
    fn test_purge() {
        let cache = ReplayCache::new();
        cache.check_and_insert("old", 100, 0);
        cache.check_and_insert("new", 10_000, 0);
        assert_eq!(cache.purge_expired(5_000), 1);
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_concurrent_single_winner() {
        let cache = Arc::new(ReplayCache::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let cache = cache.clone();
            let winners = winners.clone();
            handles.push(thread::spawn(move || {
                if cache.check_and_insert("same-digest", 10_000, 0) {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
