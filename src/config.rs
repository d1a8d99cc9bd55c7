//! Engine parameters and the session configuration registry.
//!
//! [`Params`] is the validated tuple that fixes the key shape and the
//! scoring thresholds.  It must not drift between ingest and query: the
//! persisted high-frequency metadata and the index metadata both embed a
//! copy, and any disagreement on load is a `ConfigMismatch`.
//!
//! [`Config`] wraps `Params` together with the operational knobs (cache
//! capacities, batch sizes, worker counts).  It mirrors the host's typed
//! configuration registry: every setting has a range and a default, and
//! values arrive either through typed setters or by name through
//! [`Config::set`] (which also resolves historical aliases).

use std::path::PathBuf;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter ranges and defaults
// ─────────────────────────────────────────────────────────────────────────────

pub const K_MIN: u32 = 4;
pub const K_MAX: u32 = 32;
pub const K_DEFAULT: u32 = 16;

pub const R_MIN: u32 = 0;
pub const R_MAX: u32 = 16;
pub const R_DEFAULT: u32 = 8;

pub const RATE_MAX_DEFAULT: f64 = 0.5;
pub const NROW_MAX_DEFAULT: u64 = 0;
pub const MIN_SCORE_DEFAULT: u32 = 1;
pub const MIN_SHARED_RATE_DEFAULT: f64 = 0.5;

/// Shortest query text accepted by the query path.
pub const MIN_QUERY_LEN: usize = 8;

pub const CACHE_CAP_MIN: usize = 1_000;
pub const CACHE_CAP_MAX: usize = 10_000_000;
pub const CACHE_CAP_DEFAULT: usize = 50_000;

pub const LOAD_BATCH_DEFAULT: usize = 10_000;
pub const ANALYSIS_BATCH_DEFAULT: usize = 10_000;

pub const HASHTABLE_SIZE_MIN: usize = 10_000;
pub const HASHTABLE_SIZE_MAX: usize = 100_000_000;
pub const HASHTABLE_SIZE_DEFAULT: usize = 1_000_000;

// ─────────────────────────────────────────────────────────────────────────────
// Params
// ─────────────────────────────────────────────────────────────────────────────

/// The persistent parameter tuple.
///
/// `k` and `r` fix the index-key shape (see [`crate::kmer::key`]);
/// `rate_max` / `nrow_max` define the high-frequency thresholds;
/// `min_score` / `min_shared_rate` are the query-time score floors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    k: u32,
    r: u32,
    rate_max: f64,
    nrow_max: u64,
    min_score: u32,
    min_shared_rate: f64,
    preclude_hf: bool,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            k: K_DEFAULT,
            r: R_DEFAULT,
            rate_max: RATE_MAX_DEFAULT,
            nrow_max: NROW_MAX_DEFAULT,
            min_score: MIN_SCORE_DEFAULT,
            min_shared_rate: MIN_SHARED_RATE_DEFAULT,
            preclude_hf: false,
        }
    }
}

impl Params {
    /// Build a parameter tuple with explicit `k` and `r`, defaults elsewhere.
    pub fn new(k: u32, r: u32) -> Result<Self> {
        let mut p = Params::default();
        p.set_k(k)?;
        p.set_r(r)?;
        Ok(p)
    }

    #[inline]
    pub fn k(&self) -> u32 {
        self.k
    }

    #[inline]
    pub fn r(&self) -> u32 {
        self.r
    }

    #[inline]
    pub fn rate_max(&self) -> f64 {
        self.rate_max
    }

    #[inline]
    pub fn nrow_max(&self) -> u64 {
        self.nrow_max
    }

    #[inline]
    pub fn min_score(&self) -> u32 {
        self.min_score
    }

    #[inline]
    pub fn min_shared_rate(&self) -> f64 {
        self.min_shared_rate
    }

    #[inline]
    pub fn preclude_hf(&self) -> bool {
        self.preclude_hf
    }

    pub fn set_k(&mut self, k: u32) -> Result<()> {
        Error::check_range("k", k as i64, K_MIN as i64, K_MAX as i64)?;
        self.k = k;
        Ok(())
    }

    pub fn set_r(&mut self, r: u32) -> Result<()> {
        Error::check_range("r", r as i64, R_MIN as i64, R_MAX as i64)?;
        self.r = r;
        Ok(())
    }

    pub fn set_rate_max(&mut self, rate: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::OutOfRange {
                what: "rate_max",
                value: rate as i64,
                min: 0,
                max: 1,
            });
        }
        self.rate_max = rate;
        Ok(())
    }

    pub fn set_nrow_max(&mut self, nrow: u64) {
        self.nrow_max = nrow;
    }

    pub fn set_min_score(&mut self, score: u32) {
        self.min_score = score;
    }

    pub fn set_min_shared_rate(&mut self, rate: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::OutOfRange {
                what: "min_shared_rate",
                value: rate as i64,
                min: 0,
                max: 1,
            });
        }
        self.min_shared_rate = rate;
        Ok(())
    }

    pub fn set_preclude_hf(&mut self, on: bool) {
        self.preclude_hf = on;
    }

    /// The subset of parameters that fences caches and persisted state:
    /// `(k, r, rate_max, nrow_max)`.  Compared bitwise so that `rate_max`
    /// equality is exact, not approximate.
    #[inline]
    pub fn fence(&self) -> ParamFence {
        ParamFence {
            k: self.k,
            r: self.r,
            rate_max_bits: self.rate_max.to_bits(),
            nrow_max: self.nrow_max,
        }
    }
}

/// Bitwise-comparable image of the cache-fencing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamFence {
    pub k: u32,
    pub r: u32,
    pub rate_max_bits: u64,
    pub nrow_max: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

/// Session configuration: parameters plus operational knobs.
#[derive(Debug, Clone)]
pub struct Config {
    pub params: Params,
    /// Capacity of the query-text → key-stream cache.
    pub query_key_cache_max: usize,
    /// Capacity of the query-keys → adjusted-minimum-score cache.
    pub adjusted_min_score_cache_max: usize,
    /// Rows per page when loading the persisted high-frequency set.
    pub hf_cache_load_batch: usize,
    /// Rows per worker batch during high-frequency analysis.
    pub hf_analysis_batch: usize,
    /// Initial size of the per-worker analysis counter tables.
    pub hf_analysis_hashtable_size: usize,
    /// Force the cross-process (tier B) high-frequency cache.  Test knob.
    pub force_parallel_hf_cache: bool,
    /// Force a specific SIMD capability level; -1 selects auto-detection.
    /// Test knob.
    pub force_simd_capability: i32,
    /// Worker threads for analysis; 0 selects the core count.
    pub analysis_workers: usize,
    /// Directory holding the tier-B shared-memory file.
    pub shared_cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            params: Params::default(),
            query_key_cache_max: CACHE_CAP_DEFAULT,
            adjusted_min_score_cache_max: CACHE_CAP_DEFAULT,
            hf_cache_load_batch: LOAD_BATCH_DEFAULT,
            hf_analysis_batch: ANALYSIS_BATCH_DEFAULT,
            hf_analysis_hashtable_size: HASHTABLE_SIZE_DEFAULT,
            force_parallel_hf_cache: false,
            force_simd_capability: -1,
            analysis_workers: 0,
            shared_cache_dir: std::env::temp_dir(),
        }
    }
}

impl Config {
    /// Set a configuration value by its registry name.
    ///
    /// Accepts the historical alias `min_shared_kmer_rate` (and the older
    /// `min_shared_ngram_key_rate`) for `min_shared_rate`; all three names
    /// resolve to the single stored value.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "k" => self.params.set_k(parse("k", value)?),
            "r" => self.params.set_r(parse("r", value)?),
            "rate_max" => self.params.set_rate_max(parse("rate_max", value)?),
            "nrow_max" => {
                self.params.set_nrow_max(parse("nrow_max", value)?);
                Ok(())
            }
            "min_score" => {
                self.params.set_min_score(parse("min_score", value)?);
                Ok(())
            }
            "min_shared_rate" | "min_shared_kmer_rate" | "min_shared_ngram_key_rate" => {
                self.params.set_min_shared_rate(parse("min_shared_rate", value)?)
            }
            "preclude_hf" => {
                self.params.set_preclude_hf(parse_bool("preclude_hf", value)?);
                Ok(())
            }
            "force_parallel_hf_cache" => {
                self.force_parallel_hf_cache = parse_bool("force_parallel_hf_cache", value)?;
                Ok(())
            }
            "force_simd_capability" => {
                let level: i32 = parse("force_simd_capability", value)?;
                self.force_simd_capability = level;
                // Process-wide by contract: the probe result is shared by
                // every strategy table in the process.
                crate::dispatch::set_forced(level);
                Ok(())
            }
            "query_key_cache_max" => {
                self.query_key_cache_max =
                    checked_cap("query_key_cache_max", parse("query_key_cache_max", value)?)?;
                Ok(())
            }
            "adjusted_min_score_cache_max" => {
                self.adjusted_min_score_cache_max = checked_cap(
                    "adjusted_min_score_cache_max",
                    parse("adjusted_min_score_cache_max", value)?,
                )?;
                Ok(())
            }
            "hf_cache_load_batch" => {
                self.hf_cache_load_batch =
                    at_least_one("hf_cache_load_batch", parse("hf_cache_load_batch", value)?)?;
                Ok(())
            }
            "hf_analysis_batch" => {
                self.hf_analysis_batch =
                    at_least_one("hf_analysis_batch", parse("hf_analysis_batch", value)?)?;
                Ok(())
            }
            "hf_analysis_hashtable_size" => {
                let n: usize = parse("hf_analysis_hashtable_size", value)?;
                Error::check_range(
                    "hf_analysis_hashtable_size",
                    n as i64,
                    HASHTABLE_SIZE_MIN as i64,
                    HASHTABLE_SIZE_MAX as i64,
                )?;
                self.hf_analysis_hashtable_size = n;
                Ok(())
            }
            "analysis_workers" => {
                self.analysis_workers = parse("analysis_workers", value)?;
                Ok(())
            }
            _ => Err(Error::Internal(format!("unknown setting: {name}"))),
        }
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::OutOfRange {
        what: name,
        value: 0,
        min: i64::MIN,
        max: i64::MAX,
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool> {
    match value {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(Error::OutOfRange {
            what: name,
            value: 0,
            min: 0,
            max: 1,
        }),
    }
}

fn checked_cap(name: &'static str, n: usize) -> Result<usize> {
    Error::check_range(name, n as i64, CACHE_CAP_MIN as i64, CACHE_CAP_MAX as i64)?;
    Ok(n)
}

fn at_least_one(name: &'static str, n: usize) -> Result<usize> {
    Error::check_range(name, n as i64, 1, i64::MAX)?;
    Ok(n)
}
