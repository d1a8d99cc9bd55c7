//! Key model and k-mer extraction.
//!
//! Submodules:
//! - [`key`]     — width selection, packed `(k-mer, rank)` keys, key buffers
//! - [`rank`]    — within-row occurrence-rank assignment
//! - [`extract`] — the windowed extraction loops

pub mod extract;
pub mod key;
pub mod rank;

pub use extract::{extract_keys, extract_keys_cancellable, row_distinct_kmers};
pub use key::{compare_keys, format_key, pack_key, split_key, KeyBuf, KeyWidth, KeyWord};
pub use rank::RankTracker;
