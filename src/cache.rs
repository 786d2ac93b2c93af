use crate::{Clock, Ha1};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tracked state of one issued nonce.
///
/// Owned exclusively by the [`NonceCache`]; callers see clones, or mutate
/// through the cache's closure-taking operations, so an entry is never
/// observed half-written.
#[derive(Debug, Clone)]
pub struct UserData {
    /// Credential hash of the user this nonce ended up bound to.
    /// `None` until the first successful validation.
    pub ha1: Option<Ha1>,
    pub nonce: String,
    /// When the nonce was issued; expiry counts from here and a successful
    /// validation does not move it
    pub timestamp: Instant,
    /// Highest request counter accepted so far
    pub nonce_count: u64,
}

impl UserData {
    pub fn new(
        ha1: Option<Ha1>,
        nonce: impl Into<String>,
        timestamp: Instant,
        nonce_count: u64,
    ) -> Self {
        UserData {
            ha1,
            nonce: nonce.into(),
            timestamp,
            nonce_count,
        }
    }
}

/// Sharded `nonce -> UserData` store with per-shard LRU eviction and lazy
/// TTL expiry.
///
/// A nonce always hashes to the same shard, so all accesses to one nonce
/// contend on one mutex while unrelated nonces mostly proceed in parallel.
/// At most `ways * way_size` entries are resident. Expired entries act as
/// absent and are purged when touched; there is no background sweep.
pub struct NonceCache {
    shards: Vec<Mutex<LruCache<String, UserData>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl NonceCache {
    pub fn new(
        ways: NonZeroUsize,
        way_size: NonZeroUsize,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shards = (0..ways.get())
            .map(|_| Mutex::new(LruCache::new(way_size)))
            .collect();
        NonceCache { shards, ttl, clock }
    }

    /// Snapshot of a live entry, touching its recency. Expired entries are
    /// treated as absent and dropped on the spot.
    pub fn get(&self, nonce: &str) -> Option<UserData> {
        let now = self.clock.now();
        let mut shard = self.shard(nonce).lock();

        if self.expired(shard.peek(nonce), now) {
            shard.pop(nonce);
            return None;
        }
        shard.get(nonce).cloned()
    }

    /// Insert or overwrite, evicting the shard's least-recently-used entry
    /// at capacity.
    pub fn put(&self, nonce: &str, data: UserData) {
        let mut shard = self.shard(nonce).lock();
        shard.put(nonce.to_string(), data);
    }

    /// Atomic read-modify-write against whatever is resident for `nonce`.
    ///
    /// The closure gets `None` when the nonce is unknown or expired and the
    /// entry stays absent; this is what validation uses so an unknown nonce
    /// cannot create state.
    pub fn mutate<T>(&self, nonce: &str, f: impl FnOnce(Option<&mut UserData>) -> T) -> T {
        let now = self.clock.now();
        let mut shard = self.shard(nonce).lock();

        if self.expired(shard.peek(nonce), now) {
            shard.pop(nonce);
        }
        f(shard.get_mut(nonce))
    }

    /// Atomic read-modify-write that falls back to `default` when the nonce
    /// is absent or expired, inserting the result.
    pub fn mutate_or_insert<T>(
        &self,
        nonce: &str,
        default: impl FnOnce() -> UserData,
        f: impl FnOnce(&mut UserData) -> T,
    ) -> T {
        let now = self.clock.now();
        let mut shard = self.shard(nonce).lock();

        if !self.expired(shard.peek(nonce), now) {
            if let Some(data) = shard.get_mut(nonce) {
                return f(data);
            }
        }

        let mut data = default();
        let out = f(&mut data);
        shard.put(nonce.to_string(), data);
        out
    }

    /// Resident entries per shard, for capacity monitoring. Counts may
    /// include entries that expired but were never touched again.
    pub fn resident_counts(&self) -> Vec<usize> {
        self.shards.iter().map(|shard| shard.lock().len()).collect()
    }

    fn shard(&self, nonce: &str) -> &Mutex<LruCache<String, UserData>> {
        let mut hasher = DefaultHasher::new();
        nonce.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    fn expired(&self, data: Option<&UserData>, now: Instant) -> bool {
        match data {
            Some(data) => now.duration_since(data.timestamp) >= self.ttl,
            None => false,
        }
    }
}
