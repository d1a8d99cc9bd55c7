//! Host-facing bridge to the inverted-index container.
//!
//! The container drives ingest through [`IndexBridge::extract_values`],
//! queries through [`IndexBridge::extract_query`], candidate ordering
//! through [`IndexBridge::compare_partial`], and the match decision
//! through [`IndexBridge::consistent`].
//!
//! `consistent` is a hard error boundary: whatever goes wrong inside it,
//! the candidate is reported as non-matching with no recheck, and the host
//! never sees an error from the predicate.

use std::cmp::Ordering;

use crate::alphabet::{self, Alphabet, PackedSeq};
use crate::cancel::CancelToken;
use crate::config::{Config, MIN_QUERY_LEN};
use crate::error::{Error, Result};
use crate::hf::HfCacheHierarchy;
use crate::kmer::extract::extract_keys_cancellable;
use crate::kmer::key::{compare_keys, KeyBuf, KeyWidth};
use crate::query::cache::{hash_keys, SessionCaches};
use crate::query::score::adjusted_min_score;
use crate::storage::{FieldId, HfStore, ParentId};

/// Index search strategies.  Only the default shared-count search
/// exists; the variant is carried so the host wire format has room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Default,
}

/// Per-session bridge state: parameters, caches, and the high-frequency
/// hierarchy for one indexed field.
pub struct IndexBridge<'s> {
    config: Config,
    alphabet: Alphabet,
    caches: SessionCaches,
    hf: HfCacheHierarchy,
    store: Option<&'s dyn HfStore>,
    cancel: CancelToken,
}

impl<'s> IndexBridge<'s> {
    pub fn new(config: Config, alphabet: Alphabet) -> Self {
        let caches = SessionCaches::new(&config);
        IndexBridge {
            config,
            alphabet,
            caches,
            hf: HfCacheHierarchy::new(),
            store: None,
            cancel: CancelToken::new(),
        }
    }

    /// Attach the host's high-frequency store (tier C and load source).
    pub fn with_store(mut self, store: &'s dyn HfStore) -> Self {
        self.store = Some(store);
        self
    }

    /// The token the host trips to cancel in-flight extraction.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[inline]
    pub fn key_width(&self) -> KeyWidth {
        KeyWidth::for_params(&self.config.params)
    }

    /// Load the high-frequency exclusion set for `(parent, field)`.
    pub fn load_hf_cache(&mut self, parent_id: ParentId, field_id: FieldId) -> Result<u64> {
        let store = self
            .store
            .ok_or_else(|| Error::Internal("no high-frequency store attached".into()))?;
        let loaded = self.hf.load(store, parent_id, field_id, &self.config)?;
        self.caches
            .revalidate(&self.config.params, self.hf.generation());
        Ok(loaded)
    }

    /// Free the loaded exclusion set; a parameter mismatch warns and
    /// frees nothing.
    pub fn free_hf_cache(&mut self, parent_id: ParentId, field_id: FieldId) -> u64 {
        let freed = self.hf.free(parent_id, field_id, &self.config.params);
        self.caches
            .revalidate(&self.config.params, self.hf.generation());
        freed
    }

    // ── Container callbacks ──────────────────────────────────────────────────

    /// Ingest-time key extraction for one stored value.
    ///
    /// With `preclude_hf` enabled and an exclusion set loaded, keys of
    /// high-frequency k-mers are withheld from the index.
    pub fn extract_values(&self, seq: &PackedSeq) -> Result<KeyBuf> {
        let keys = extract_keys_cancellable(seq, &self.config.params, Some(&self.cancel))?;
        if !self.config.params.preclude_hf() || !self.hf.is_loaded() {
            return Ok(keys);
        }
        let Some(store) = self.store else {
            return Ok(keys);
        };
        let mut kept = KeyBuf::with_capacity(keys.width(), keys.len());
        for key in keys.iter() {
            if !self.hf.lookup(store, key) {
                kept.push(key)?;
            }
        }
        Ok(kept)
    }

    /// Query-time key extraction, answered from the query-key cache when
    /// possible.  Query text shorter than [`MIN_QUERY_LEN`] is rejected.
    pub fn extract_query(&mut self, text: &str) -> Result<(KeyBuf, SearchMode)> {
        if text.len() < MIN_QUERY_LEN {
            return Err(Error::OutOfRange {
                what: "query length",
                value: text.len() as i64,
                min: MIN_QUERY_LEN as i64,
                max: i64::MAX,
            });
        }
        self.caches
            .revalidate(&self.config.params, self.hf.generation());
        let k = self.config.params.k();
        if let Some(keys) = self.caches.query_keys.get(text, k) {
            return Ok((keys, SearchMode::Default));
        }
        let seq = alphabet::encode(self.alphabet, text)?;
        let keys = extract_keys_cancellable(&seq, &self.config.params, Some(&self.cancel))?;
        self.cancel.check()?;
        self.caches.query_keys.insert(text, k, keys.clone());
        Ok((keys, SearchMode::Default))
    }

    /// Total order over keys: unsigned comparison at the session width.
    pub fn compare_keys(&self, a: u64, b: u64) -> Ordering {
        compare_keys(a, b)
    }

    /// Signum form of [`compare_keys`](Self::compare_keys) for hosts
    /// that want an integer.
    pub fn compare_partial(&self, a: u64, b: u64) -> i32 {
        match compare_keys(a, b) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    /// The consistency predicate: does a candidate with the given
    /// per-query-key presence bitmap match?
    ///
    /// Returns `(match, recheck)`; recheck is always false because the
    /// shared-count model is exact.  Errors never cross this boundary;
    /// a candidate that cannot be judged is non-matching.
    pub fn consistent(&mut self, presence: &[bool], query_keys: &KeyBuf) -> (bool, bool) {
        if presence.len() != query_keys.len() {
            tracing::warn!(
                bitmap = presence.len(),
                keys = query_keys.len(),
                "presence bitmap length mismatch; candidate treated as non-matching"
            );
            return (false, false);
        }
        let shared = presence.iter().filter(|&&p| p).count() as u32;
        let threshold = self.min_score_for(query_keys);
        (shared >= threshold, false)
    }

    /// Adjusted minimum score for a query key stream, memoized in the
    /// score cache.
    pub fn min_score_for(&mut self, query_keys: &KeyBuf) -> u32 {
        self.caches
            .revalidate(&self.config.params, self.hf.generation());
        let hash = hash_keys(query_keys);
        if let Some(score) = self.caches.min_score.get(hash) {
            return score;
        }
        let excluded = match self.store {
            Some(store) => self.hf.excluded_count(store, query_keys),
            None => 0,
        };
        let score = adjusted_min_score(&self.config.params, query_keys.len(), excluded);
        self.caches.min_score.insert(hash, score);
        score
    }

    /// Cache statistics (query-key cache, score cache).
    pub fn cache_stats(&self) -> (crate::query::cache::CacheStats, crate::query::cache::CacheStats) {
        (
            self.caches.query_keys.stats(),
            self.caches.min_score.stats(),
        )
    }
}
