//! kmerdex: core engine for k-mer similarity search over DNA sequences.
//!
//! Given a corpus of DNA strings, the engine packs each sequence into a
//! bit-level encoding, extracts occurrence-ranked k-mer keys for a
//! generalized inverted index, and at query time scores candidate rows by
//! the number of keys they share with the query.  K-mers that occur in
//! too many rows to discriminate anything are learned by a parallel
//! analysis pass and excluded from scoring through a tiered cache.
//!
//! The relational host (SQL surface, index container, transactions) sits
//! behind the adapter traits in [`storage`]; everything in this crate is
//! host-agnostic.

pub mod alphabet;
pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hf;
pub mod kmer;
pub mod query;
pub mod storage;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level re-exports for the common entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Engine error type.
pub use error::{Error, Result};

/// Validated engine parameters and the session configuration registry.
pub use config::{Config, Params};

/// Sequence alphabets and codecs.
pub use alphabet::{decode_2bit, decode_4bit, encode_2bit, encode_4bit, Alphabet, PackedSeq};

/// Key extraction and the key model.
pub use kmer::{extract_keys, KeyBuf, KeyWidth};

/// The host-facing bridge and scoring entry points.
pub use query::{shared_count, IndexBridge, SearchMode};

/// High-frequency analysis and the exclusion-set cache.
pub use hf::{analyze_high_frequency, AnalysisReport, AnalyzeOptions, HfCacheHierarchy};

/// Host storage adapters.
pub use storage::{HfMeta, HfStore, IndexMeta, MemSource, MemStorage, RowSource};

/// Cooperative cancellation token.
pub use cancel::CancelToken;

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 4;
pub const VERSION_RELEASE: u32 = 0;
pub const VERSION_STRING: &str = "0.4.0";

/// Returns the library version string.
pub fn version_string() -> &'static str {
    VERSION_STRING
}
