//! High-frequency k-mer analysis and the exclusion-set cache hierarchy.
//!
//! Submodules:
//! - [`counter`] — open-addressed counters for the analysis workers
//! - [`analyze`] — the parallel full-table scan
//! - [`local`]   — tier A, the process-local set
//! - [`shared`]  — tier B, the cross-process shared mapping
//! - [`cache`]   — tier orchestration and the load/free contract

pub mod analyze;
pub mod cache;
pub mod counter;
pub mod local;
pub mod shared;

pub use analyze::{analyze_high_frequency, AnalysisReport, AnalyzeOptions};
pub use cache::HfCacheHierarchy;
pub use counter::CounterTable;
pub use local::HfLocalCache;
pub use shared::HfSharedCache;

use xxhash_rust::xxh64::xxh64;

use crate::config::Params;
use crate::storage::{FieldId, ParentId};

/// Identity of a loaded high-frequency cache: the full parameter tuple.
///
/// Every access compares the session's tuple against this by equality
/// (`rate_max` bitwise); any mismatch means cold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HfCacheKey {
    pub parent_id: u64,
    pub field_hash: u64,
    pub k: u32,
    pub r: u32,
    pub rate_max_bits: u64,
    pub nrow_max: u64,
}

impl HfCacheKey {
    pub fn new(parent_id: ParentId, field_id: FieldId, params: &Params) -> Self {
        HfCacheKey {
            parent_id,
            field_hash: xxh64(&field_id.to_le_bytes(), 0),
            k: params.k(),
            r: params.r(),
            rate_max_bits: params.rate_max().to_bits(),
            nrow_max: params.nrow_max(),
        }
    }
}
