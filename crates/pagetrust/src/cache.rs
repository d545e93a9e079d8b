//! Revocation decision caching with TTL
//!
//! Confirmed OCSP verdicts are cached so that reconnecting to the same site
//! does not hit the responder again. The cache uses DashMap for thread-safe
//! concurrent access; each entry carries a TTL derived from the OCSP
//! response's nextUpdate (or a configured default) and expired entries are
//! treated as misses and removed lazily on lookup.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identity of a certificate for caching purposes: the SHA-256 hash of the
/// issuer certificate plus the leaf serial number. Including the issuer
/// prevents two CAs that issued the same serial from colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    issuer_hash: [u8; 32],
    serial: Vec<u8>,
}

impl CacheKey {
    /// Derive a key from the issuer certificate DER and the subject serial
    pub fn new(issuer_der: &[u8], serial: &[u8]) -> Self {
        let issuer_hash = Sha256::digest(issuer_der).into();
        Self {
            issuer_hash,
            serial: serial.to_vec(),
        }
    }
}

/// A definitive revocation verdict worth caching.
///
/// `Unknown` statuses and transport failures are never cached: they must be
/// re-checked on the next connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationVerdict {
    Good,
    Revoked,
}

#[derive(Debug, Clone)]
struct CachedVerdict {
    verdict: RevocationVerdict,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedVerdict {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Thread-safe revocation decision cache with TTL and oldest-entry eviction
#[derive(Debug, Clone)]
pub struct DecisionCache {
    cache: Arc<DashMap<CacheKey, CachedVerdict>>,
    max_entries: usize,
}

impl DecisionCache {
    /// Create a cache holding at most `max_entries` verdicts
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    /// Look up a cached verdict.
    ///
    /// Expired entries count as misses and are removed on the way out.
    pub fn lookup(&self, key: &CacheKey) -> Option<RevocationVerdict> {
        let entry = self.cache.get(key)?;

        if entry.is_expired() {
            // Drop the read lock before removing
            drop(entry);
            self.cache.remove(key);
            return None;
        }

        Some(entry.verdict)
    }

    /// Store a verdict with the given TTL.
    ///
    /// When the cache is full the oldest entry (by insertion time) is
    /// evicted first. The scan is O(n) but only runs at capacity.
    pub fn store(&self, key: CacheKey, verdict: RevocationVerdict, ttl: Duration) {
        if self.cache.len() >= self.max_entries && !self.cache.contains_key(&key) {
            self.evict_oldest();
        }

        self.cache.insert(
            key,
            CachedVerdict {
                verdict,
                cached_at: Instant::now(),
                ttl,
            },
        );
    }

    fn evict_oldest(&self) {
        let mut oldest_key: Option<CacheKey> = None;
        let mut oldest_time = Instant::now();

        for entry in self.cache.iter() {
            if entry.value().cached_at < oldest_time {
                oldest_time = entry.value().cached_at;
                oldest_key = Some(entry.key().clone());
            }
        }

        if let Some(key) = oldest_key {
            self.cache.remove(&key);
        }
    }

    /// Remove all expired entries, returning how many were evicted
    pub fn evict_expired(&self) -> usize {
        let to_remove: Vec<CacheKey> = self
            .cache
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for key in to_remove {
            if self.cache.remove(&key).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    /// Number of entries currently held (including not-yet-collected expired ones)
    pub fn size(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached verdict
    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(issuer: &[u8], serial: &[u8]) -> CacheKey {
        CacheKey::new(issuer, serial)
    }

    #[test]
    fn test_store_and_lookup() {
        let cache = DecisionCache::new(10);
        let k = key(b"issuer-der", b"\x01\x02\x03");

        cache.store(k.clone(), RevocationVerdict::Good, Duration::from_secs(3600));
        assert_eq!(cache.lookup(&k), Some(RevocationVerdict::Good));
    }

    #[test]
    fn test_same_serial_different_issuer_does_not_collide() {
        let cache = DecisionCache::new(10);
        let k1 = key(b"issuer-a", b"\x42");
        let k2 = key(b"issuer-b", b"\x42");

        cache.store(k1.clone(), RevocationVerdict::Good, Duration::from_secs(3600));
        cache.store(k2.clone(), RevocationVerdict::Revoked, Duration::from_secs(3600));

        assert_eq!(cache.lookup(&k1), Some(RevocationVerdict::Good));
        assert_eq!(cache.lookup(&k2), Some(RevocationVerdict::Revoked));
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_is_removed() {
        let cache = DecisionCache::new(10);
        let k = key(b"issuer", b"\x01");

        cache.store(k.clone(), RevocationVerdict::Good, Duration::from_secs(0));
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.lookup(&k), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_eviction_when_full() {
        let cache = DecisionCache::new(3);

        for i in 0..4u8 {
            cache.store(
                key(b"issuer", &[i]),
                RevocationVerdict::Good,
                Duration::from_secs(3600),
            );
            // Make insertion order unambiguous for the eviction scan
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(cache.size(), 3);
        assert_eq!(cache.lookup(&key(b"issuer", &[0])), None);
        assert!(cache.lookup(&key(b"issuer", &[1])).is_some());
        assert!(cache.lookup(&key(b"issuer", &[2])).is_some());
        assert!(cache.lookup(&key(b"issuer", &[3])).is_some());
    }

    #[test]
    fn test_overwrite_existing_key_at_capacity_does_not_evict() {
        let cache = DecisionCache::new(2);
        let k1 = key(b"issuer", &[1]);
        let k2 = key(b"issuer", &[2]);

        cache.store(k1.clone(), RevocationVerdict::Good, Duration::from_secs(3600));
        cache.store(k2.clone(), RevocationVerdict::Good, Duration::from_secs(3600));

        // Updating an existing key must not push anything out
        cache.store(k1.clone(), RevocationVerdict::Revoked, Duration::from_secs(3600));
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.lookup(&k1), Some(RevocationVerdict::Revoked));
        assert_eq!(cache.lookup(&k2), Some(RevocationVerdict::Good));
    }

    #[test]
    fn test_evict_expired() {
        let cache = DecisionCache::new(10);

        cache.store(
            key(b"issuer", &[1]),
            RevocationVerdict::Good,
            Duration::from_secs(3600),
        );
        cache.store(
            key(b"issuer", &[2]),
            RevocationVerdict::Revoked,
            Duration::from_secs(0),
        );
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.size(), 1);
        assert!(cache.lookup(&key(b"issuer", &[1])).is_some());
    }

    #[test]
    fn test_clear() {
        let cache = DecisionCache::new(10);
        for i in 0..5u8 {
            cache.store(
                key(b"issuer", &[i]),
                RevocationVerdict::Good,
                Duration::from_secs(3600),
            );
        }
        assert_eq!(cache.size(), 5);

        cache.clear();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = DecisionCache::new(64);
        let mut handles = Vec::new();

        for t in 0..4u8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..16u8 {
                    let k = key(b"issuer", &[t, i]);
                    cache.store(k.clone(), RevocationVerdict::Good, Duration::from_secs(3600));
                    assert_eq!(cache.lookup(&k), Some(RevocationVerdict::Good));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.size(), 64);
    }
}
