//! Tier A: the process-local high-frequency key set.
//!
//! An open-addressed hash set over the key integers, built once per
//! process per parameter tuple and immutable afterwards.  Lookups are a
//! short linear probe with no locking; the set belongs to one process.

use crate::hf::HfCacheKey;

#[inline]
fn spread(key: u64) -> u64 {
    key.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Process-local membership set tagged with its cache key.
#[derive(Debug)]
pub struct HfLocalCache {
    cache_key: HfCacheKey,
    keys: Vec<u64>,
    occupied: Vec<bool>,
    mask: usize,
    len: usize,
}

impl HfLocalCache {
    /// An empty set sized for `expected` keys.
    pub fn with_capacity(cache_key: HfCacheKey, expected: usize) -> Self {
        let slots = (expected.max(16) * 2).next_power_of_two();
        HfLocalCache {
            cache_key,
            keys: vec![0; slots],
            occupied: vec![false; slots],
            mask: slots - 1,
            len: 0,
        }
    }

    #[inline]
    pub fn cache_key(&self) -> &HfCacheKey {
        &self.cache_key
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, key: u64) {
        if self.len * 2 >= self.keys.len() {
            self.grow();
        }
        let mut i = spread(key) as usize & self.mask;
        loop {
            if !self.occupied[i] {
                self.keys[i] = key;
                self.occupied[i] = true;
                self.len += 1;
                return;
            }
            if self.keys[i] == key {
                return;
            }
            i = (i + 1) & self.mask;
        }
    }

    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        let mut i = spread(key) as usize & self.mask;
        loop {
            if !self.occupied[i] {
                return false;
            }
            if self.keys[i] == key {
                return true;
            }
            i = (i + 1) & self.mask;
        }
    }

    fn grow(&mut self) {
        let new_size = self.keys.len() * 2;
        let old_keys = std::mem::replace(&mut self.keys, vec![0; new_size]);
        let old_occ = std::mem::replace(&mut self.occupied, vec![false; new_size]);
        self.mask = new_size - 1;
        for (key, occ) in old_keys.into_iter().zip(old_occ) {
            if !occ {
                continue;
            }
            let mut i = spread(key) as usize & self.mask;
            while self.occupied[i] {
                i = (i + 1) & self.mask;
            }
            self.keys[i] = key;
            self.occupied[i] = true;
        }
    }
}
