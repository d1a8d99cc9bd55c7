//! Query-path caches: query text → key stream, and query keys → adjusted
//! minimum score.
//!
//! Both are bounded LRU structures owned by the session.  The order list
//! threads through a slab of slots (indices, not pointers; the hash
//! index owns the entries, the list only links them), so eviction and
//! touch are O(1) and there is no cyclic ownership.
//!
//! Correctness never depends on the caches: a miss recomputes, and every
//! entry is fenced to the session parameter tuple: any change of
//! `(k, r, rate_max, nrow_max)` flushes both caches.  The score cache
//! additionally fences on the scoring floors and on the high-frequency
//! cache generation, because its values embed both.

use ahash::AHashMap;
use xxhash_rust::xxh64::xxh64;

use crate::config::{Config, ParamFence, Params};
use crate::kmer::key::KeyBuf;

/// Read-only cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Slab LRU
// ─────────────────────────────────────────────────────────────────────────────

const NIL: u32 = u32::MAX;

#[derive(Debug)]
struct Slot<V> {
    hash: u64,
    value: V,
    prev: u32,
    next: u32,
}

/// Bounded LRU map from a precomputed 64-bit hash to a value.
///
/// Hash collisions are the caller's concern: `get` takes a verifier
/// closure so callers that can compare identity (the query-text cache)
/// reject foreign entries, and callers that key on the hash alone (the
/// score cache) pass an always-true verifier.
#[derive(Debug)]
pub struct LruCache<V> {
    index: AHashMap<u64, u32>,
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    head: u32,
    tail: u32,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl<V> LruCache<V> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        LruCache {
            index: AHashMap::with_capacity(capacity.min(1 << 16)),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.len(),
            capacity: self.capacity,
        }
    }

    /// Drop every entry; statistics survive the flush.
    pub fn flush(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    fn detach(&mut self, slot: u32) {
        let (prev, next) = {
            let s = &self.slots[slot as usize];
            (s.prev, s.next)
        };
        if prev != NIL {
            self.slots[prev as usize].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next as usize].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn attach_front(&mut self, slot: u32) {
        let old_head = self.head;
        {
            let s = &mut self.slots[slot as usize];
            s.prev = NIL;
            s.next = old_head;
        }
        if old_head != NIL {
            self.slots[old_head as usize].prev = slot;
        } else {
            self.tail = slot;
        }
        self.head = slot;
    }

    /// Look up by hash; `verify` confirms identity on a hash hit.
    pub fn get(&mut self, hash: u64, verify: impl FnOnce(&V) -> bool) -> Option<&V> {
        let slot = match self.index.get(&hash) {
            Some(&slot) => slot,
            None => {
                self.misses += 1;
                return None;
            }
        };
        if !verify(&self.slots[slot as usize].value) {
            self.misses += 1;
            return None;
        }
        self.detach(slot);
        self.attach_front(slot);
        self.hits += 1;
        Some(&self.slots[slot as usize].value)
    }

    /// Insert or replace; past capacity the least-recently-used entry is
    /// evicted first.
    pub fn insert(&mut self, hash: u64, value: V) {
        if let Some(&slot) = self.index.get(&hash) {
            self.slots[slot as usize].value = value;
            self.detach(slot);
            self.attach_front(slot);
            return;
        }
        if self.index.len() >= self.capacity {
            let victim = self.tail;
            debug_assert_ne!(victim, NIL);
            self.detach(victim);
            self.index.remove(&self.slots[victim as usize].hash);
            self.free.push(victim);
        }
        let slot = match self.free.pop() {
            Some(s) => {
                let entry = &mut self.slots[s as usize];
                entry.hash = hash;
                entry.value = value;
                s
            }
            None => {
                let s = self.slots.len() as u32;
                self.slots.push(Slot {
                    hash,
                    value,
                    prev: NIL,
                    next: NIL,
                });
                s
            }
        };
        self.index.insert(hash, slot);
        self.attach_front(slot);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hash functions
// ─────────────────────────────────────────────────────────────────────────────

/// Identity hash of a query: xxh64 over the text with `k` as the seed.
#[inline]
pub fn hash_query(text: &str, k: u32) -> u64 {
    xxh64(text.as_bytes(), k as u64)
}

/// Running polynomial hash of a key stream: `sum(key_i * 31^(n-i))`.
#[inline]
pub fn hash_keys(keys: &KeyBuf) -> u64 {
    let mut h = 0u64;
    for key in keys.iter() {
        h = h.wrapping_mul(31).wrapping_add(key);
    }
    h
}

// ─────────────────────────────────────────────────────────────────────────────
// Query-key cache
// ─────────────────────────────────────────────────────────────────────────────

/// `(query text, k)` → extracted key stream.
#[derive(Debug)]
pub struct QueryKeyCache {
    inner: LruCache<(Box<str>, KeyBuf)>,
}

impl QueryKeyCache {
    pub fn new(capacity: usize) -> Self {
        QueryKeyCache {
            inner: LruCache::new(capacity),
        }
    }

    /// Cached key stream for the query, if present.  The stored text is
    /// byte-compared before the hit counts, so a hash collision is a miss.
    pub fn get(&mut self, text: &str, k: u32) -> Option<KeyBuf> {
        self.inner
            .get(hash_query(text, k), |(stored, _)| &**stored == text)
            .map(|(_, keys)| keys.clone())
    }

    pub fn insert(&mut self, text: &str, k: u32, keys: KeyBuf) {
        self.inner.insert(hash_query(text, k), (text.into(), keys));
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn flush(&mut self) {
        self.inner.flush();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adjusted-minimum-score cache
// ─────────────────────────────────────────────────────────────────────────────

/// polynomial-hash(query keys) → adjusted minimum score.
#[derive(Debug)]
pub struct MinScoreCache {
    inner: LruCache<u32>,
}

impl MinScoreCache {
    pub fn new(capacity: usize) -> Self {
        MinScoreCache {
            inner: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, keys_hash: u64) -> Option<u32> {
        self.inner.get(keys_hash, |_| true).copied()
    }

    pub fn insert(&mut self, keys_hash: u64, score: u32) {
        self.inner.insert(keys_hash, score);
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn flush(&mut self) {
        self.inner.flush();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session wrapper with parameter fencing
// ─────────────────────────────────────────────────────────────────────────────

/// Both query caches plus the fencing state that invalidates them.
#[derive(Debug)]
pub struct SessionCaches {
    fence: ParamFence,
    score_fence: (u32, u64),
    hf_generation: u64,
    pub query_keys: QueryKeyCache,
    pub min_score: MinScoreCache,
}

fn score_fence_of(params: &Params) -> (u32, u64) {
    (params.min_score(), params.min_shared_rate().to_bits())
}

impl SessionCaches {
    pub fn new(config: &Config) -> Self {
        SessionCaches {
            fence: config.params.fence(),
            score_fence: score_fence_of(&config.params),
            hf_generation: 0,
            query_keys: QueryKeyCache::new(config.query_key_cache_max),
            min_score: MinScoreCache::new(config.adjusted_min_score_cache_max),
        }
    }

    /// Re-check the fences.  A change of `(k, r, rate_max, nrow_max)`
    /// flushes both caches.  The score cache additionally fences on the
    /// scoring floors and on the high-frequency generation, because its
    /// values embed both.
    pub fn revalidate(&mut self, params: &Params, hf_generation: u64) {
        let fence = params.fence();
        let score_fence = score_fence_of(params);
        if fence != self.fence {
            tracing::debug!("parameter change: flushing query caches");
            self.query_keys.flush();
            self.min_score.flush();
            self.fence = fence;
            self.score_fence = score_fence;
            self.hf_generation = hf_generation;
            return;
        }
        if score_fence != self.score_fence || hf_generation != self.hf_generation {
            tracing::debug!("score inputs changed: flushing score cache");
            self.min_score.flush();
            self.score_fence = score_fence;
            self.hf_generation = hf_generation;
        }
    }
}
