//! Tier orchestration for the high-frequency exclusion set.
//!
//! Lookup order: tier A (process-local hash), tier B (cross-process
//! shared mapping), tier C (point probes into the persisted store).
//! Any tier failure degrades to the next tier (membership gets slower,
//! never wrong) and lookup itself never surfaces an error.
//!
//! The load contract: validate the session parameters against the
//! persisted metadata *before* touching any tier (mismatch is fatal with
//! a fix-it hint), then page the persisted set in batches into the chosen
//! tier and record the cache key.  `free` with a mismatched cache key is
//! rejected with a warning so one session cannot destroy another
//! session's cache.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hf::local::HfLocalCache;
use crate::hf::shared::HfSharedCache;
use crate::hf::HfCacheKey;
use crate::kmer::key::kmer_bits_mask;
use crate::storage::{FieldId, HfMeta, HfStore, ParentId};

/// The three-tier membership cache for one `(parent, field)`.
#[derive(Debug, Default)]
pub struct HfCacheHierarchy {
    target: Option<(ParentId, FieldId)>,
    cache_key: Option<HfCacheKey>,
    kmer_mask: u64,
    local: Option<HfLocalCache>,
    shared: Option<HfSharedCache>,
    generation: u64,
}

impl HfCacheHierarchy {
    pub fn new() -> Self {
        HfCacheHierarchy::default()
    }

    /// Monotonic counter bumped whenever the loaded contents change.
    /// The score cache fences on it.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an exclusion set is in effect.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.cache_key.is_some()
    }

    /// Entries held by the hot tier.
    pub fn len(&self) -> u64 {
        if let Some(local) = &self.local {
            local.len() as u64
        } else if let Some(shared) = &self.shared {
            shared.len()
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the persisted set for `(parent, field)`.
    ///
    /// Validates the session parameters against the persisted metadata
    /// first; on mismatch nothing is populated.  Re-loading with the same
    /// cache key is a cheap no-op.  Returns the number of keys available
    /// to lookups.
    pub fn load(
        &mut self,
        store: &dyn HfStore,
        parent_id: ParentId,
        field_id: FieldId,
        config: &Config,
    ) -> Result<u64> {
        let params = &config.params;
        let meta = match store.meta(parent_id, field_id)? {
            Some(meta) => meta,
            None => {
                // No analysis has been persisted: no exclusions apply.
                if self.cache_key.is_some() {
                    self.unload();
                }
                return Ok(0);
            }
        };
        validate_params(&meta, config)?;

        let cache_key = HfCacheKey::new(parent_id, field_id, params);
        if self.cache_key == Some(cache_key) {
            return Ok(self.len());
        }

        self.unload();
        self.kmer_mask = kmer_bits_mask(params.r());
        self.target = Some((parent_id, field_id));
        self.cache_key = Some(cache_key);

        if config.force_parallel_hf_cache {
            match self.load_shared(store, parent_id, field_id, &cache_key, &meta, config) {
                Ok(loaded) => {
                    tracing::debug!(loaded, "high-frequency cache loaded (shared tier)");
                    return Ok(loaded);
                }
                Err(e) => {
                    tracing::warn!(
                        "shared high-frequency cache unavailable ({e}); using local tier"
                    );
                }
            }
        }

        let local = populate_local(store, parent_id, field_id, cache_key, &meta, config)?;
        let loaded = local.len() as u64;
        self.local = Some(local);
        tracing::debug!(loaded, "high-frequency cache loaded (local tier)");
        Ok(loaded)
    }

    fn load_shared(
        &mut self,
        store: &dyn HfStore,
        parent_id: ParentId,
        field_id: FieldId,
        cache_key: &HfCacheKey,
        meta: &HfMeta,
        config: &Config,
    ) -> Result<u64> {
        if let Some(shared) = HfSharedCache::attach(&config.shared_cache_dir, cache_key)? {
            let len = shared.len();
            self.shared = Some(shared);
            return Ok(len);
        }
        let shared = HfSharedCache::create(
            &config.shared_cache_dir,
            cache_key,
            meta.hf_count.max(1) as usize,
        )?;
        let mut offset = 0u64;
        loop {
            let batch = store.read_batch(parent_id, field_id, offset, config.hf_cache_load_batch)?;
            if batch.is_empty() {
                break;
            }
            for &key in &batch {
                shared.insert(key)?;
            }
            offset += batch.len() as u64;
            if batch.len() < config.hf_cache_load_batch {
                break;
            }
        }
        shared.mark_ready();
        let len = shared.len();
        self.shared = Some(shared);
        Ok(len)
    }

    /// Membership check for a full index key (the rank bits are masked
    /// off; exclusion is a property of the k-mer, not the occurrence).
    ///
    /// Never errors: a failed store probe logs and reports absent, which
    /// only makes scoring stricter, never wrong.
    pub fn lookup(&self, store: &dyn HfStore, key: u64) -> bool {
        let Some((parent_id, field_id)) = self.target else {
            return false;
        };
        let masked = key & self.kmer_mask;
        if let Some(local) = &self.local {
            return local.contains(masked);
        }
        if let Some(shared) = &self.shared {
            if shared.is_ready() {
                return shared.contains(masked);
            }
        }
        match store.contains(parent_id, field_id, masked) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("high-frequency store probe failed ({e}); treating as absent");
                false
            }
        }
    }

    /// Count query keys falling in the exclusion set.
    pub fn excluded_count(&self, store: &dyn HfStore, keys: &crate::kmer::key::KeyBuf) -> usize {
        if !self.is_loaded() {
            return 0;
        }
        keys.iter().filter(|&k| self.lookup(store, k)).count()
    }

    /// Release the loaded set if `(parent, field, params)` matches the
    /// stored cache key.  A mismatch warns and leaves the cache alone,
    /// returning 0 freed entries.
    pub fn free(
        &mut self,
        parent_id: ParentId,
        field_id: FieldId,
        params: &crate::config::Params,
    ) -> u64 {
        let requested = HfCacheKey::new(parent_id, field_id, params);
        match self.cache_key {
            Some(stored) if stored == requested => {
                let freed = self.len();
                self.unload();
                freed
            }
            Some(_) => {
                tracing::warn!(
                    parent_id,
                    field_id,
                    "high-frequency cache key mismatch; free ignored"
                );
                0
            }
            None => 0,
        }
    }

    fn unload(&mut self) {
        self.target = None;
        self.cache_key = None;
        self.local = None;
        self.shared = None; // guard detaches on drop
        self.generation += 1;
    }
}

fn validate_params(meta: &HfMeta, config: &Config) -> Result<()> {
    let params = &config.params;
    if meta.k != params.k() {
        return Err(mismatch("k", meta.k.to_string(), params.k().to_string()));
    }
    if meta.r != params.r() {
        return Err(mismatch("r", meta.r.to_string(), params.r().to_string()));
    }
    if meta.rate_max.to_bits() != params.rate_max().to_bits() {
        return Err(mismatch(
            "rate_max",
            meta.rate_max.to_string(),
            params.rate_max().to_string(),
        ));
    }
    if meta.nrow_max != params.nrow_max() {
        return Err(mismatch(
            "nrow_max",
            meta.nrow_max.to_string(),
            params.nrow_max().to_string(),
        ));
    }
    Ok(())
}

fn mismatch(what: &'static str, stored: String, current: String) -> Error {
    let hint = format!("set {what} = {stored} or re-run the high-frequency analysis");
    Error::ConfigMismatch {
        what,
        stored,
        current,
        hint,
    }
}

fn populate_local(
    store: &dyn HfStore,
    parent_id: ParentId,
    field_id: FieldId,
    cache_key: HfCacheKey,
    meta: &HfMeta,
    config: &Config,
) -> Result<HfLocalCache> {
    let mut cache = HfLocalCache::with_capacity(cache_key, meta.hf_count.max(1) as usize);
    let mut offset = 0u64;
    loop {
        let batch = store.read_batch(parent_id, field_id, offset, config.hf_cache_load_batch)?;
        if batch.is_empty() {
            break;
        }
        for &key in &batch {
            cache.insert(key);
        }
        offset += batch.len() as u64;
        if batch.len() < config.hf_cache_load_batch {
            break;
        }
    }
    Ok(cache)
}
