//! Host storage boundary: row scans and high-frequency persistence.
//!
//! The engine never talks to the host's tables directly.  Analysis
//! consumes a [`RowSource`] (block-addressed scan over packed sequences)
//! and persists through an [`HfStore`] (typed writer plus point probes).
//! The host supplies real implementations backed by its storage layer;
//! [`MemSource`] and [`MemStorage`] back the tests and any embedded use.
//!
//! [`PartitionedSource`] concatenates child block spaces into one flat
//! space, which is how a logically partitioned parent is analyzed: the
//! workers only ever see global block numbers, so the result depends on
//! the row multiset alone, never the physical layout.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::alphabet::PackedSeq;
use crate::config::Params;
use crate::error::{Error, Result};

/// Host identifier of the indexed parent (table).
pub type ParentId = u64;
/// Host identifier of the indexed field (column) within the parent.
pub type FieldId = u32;

// ─────────────────────────────────────────────────────────────────────────────
// Persisted metadata shapes
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata row persisted alongside a high-frequency key set.
#[derive(Debug, Clone, PartialEq)]
pub struct HfMeta {
    pub parent_id: ParentId,
    pub field_id: FieldId,
    pub k: u32,
    pub r: u32,
    pub rate_max: f64,
    pub nrow_max: u64,
    pub total_rows: u64,
    pub hf_count: u64,
    pub duration_secs: f64,
}

/// Metadata row persisted when an index is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub index_id: u64,
    pub parent_id: ParentId,
    pub field_id: FieldId,
    pub k: u32,
    pub r: u32,
    pub hf_excluded: bool,
}

/// Validate stored index metadata against the session parameters.
///
/// Run at index-open time; a drift in `k` or `r` would silently change
/// the key shape, so it is fatal with a fix-it hint.
pub fn check_index_meta(stored: &IndexMeta, params: &Params) -> Result<()> {
    if stored.k != params.k() {
        return Err(Error::ConfigMismatch {
            what: "k",
            stored: stored.k.to_string(),
            current: params.k().to_string(),
            hint: format!("set k = {} or rebuild the index", stored.k),
        });
    }
    if stored.r != params.r() {
        return Err(Error::ConfigMismatch {
            what: "r",
            stored: stored.r.to_string(),
            current: params.r().to_string(),
            hint: format!("set r = {} or rebuild the index", stored.r),
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Scan adapter
// ─────────────────────────────────────────────────────────────────────────────

/// Block-addressed read access to the rows of one indexed field.
pub trait RowSource: Sync {
    /// Total row count (used for the rate threshold denominator).
    fn total_rows(&self) -> Result<u64>;

    /// Number of blocks in the scan space.
    fn block_count(&self) -> u64;

    /// The packed sequences stored in `block`.
    fn read_block(&self, block: u64) -> Result<Vec<PackedSeq>>;
}

/// In-memory row source used by tests and embedded callers.
#[derive(Debug, Default)]
pub struct MemSource {
    blocks: Vec<Vec<PackedSeq>>,
}

impl MemSource {
    /// Chunk `rows` into blocks of `rows_per_block`.
    pub fn from_rows(rows: Vec<PackedSeq>, rows_per_block: usize) -> Self {
        assert!(rows_per_block > 0);
        let mut blocks = Vec::new();
        let mut it = rows.into_iter().peekable();
        while it.peek().is_some() {
            blocks.push(it.by_ref().take(rows_per_block).collect());
        }
        MemSource { blocks }
    }
}

impl RowSource for MemSource {
    fn total_rows(&self) -> Result<u64> {
        Ok(self.blocks.iter().map(|b| b.len() as u64).sum())
    }

    fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn read_block(&self, block: u64) -> Result<Vec<PackedSeq>> {
        self.blocks
            .get(block as usize)
            .cloned()
            .ok_or(Error::OutOfRange {
                what: "block number",
                value: block as i64,
                min: 0,
                max: self.blocks.len() as i64 - 1,
            })
    }
}

/// A parent with children: the children's block spaces concatenated in
/// child order into one global space.
pub struct PartitionedSource<'a> {
    children: Vec<&'a dyn RowSource>,
}

impl<'a> PartitionedSource<'a> {
    pub fn new(children: Vec<&'a dyn RowSource>) -> Self {
        PartitionedSource { children }
    }
}

impl RowSource for PartitionedSource<'_> {
    fn total_rows(&self) -> Result<u64> {
        let mut total = 0;
        for child in &self.children {
            total += child.total_rows()?;
        }
        Ok(total)
    }

    fn block_count(&self) -> u64 {
        self.children.iter().map(|c| c.block_count()).sum()
    }

    fn read_block(&self, block: u64) -> Result<Vec<PackedSeq>> {
        let mut offset = 0;
        for child in &self.children {
            let n = child.block_count();
            if block < offset + n {
                return child.read_block(block - offset);
            }
            offset += n;
        }
        Err(Error::OutOfRange {
            what: "block number",
            value: block as i64,
            min: 0,
            max: offset as i64 - 1,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence adapter
// ─────────────────────────────────────────────────────────────────────────────

/// Persisted high-frequency key sets, keyed by `(parent, field)`.
///
/// `replace` is transactional at the host: the stored set is either
/// fully replaced or untouched.  Keys are stored sorted ascending and
/// `read_batch` pages through them in that order.
pub trait HfStore: Sync {
    fn replace(&self, meta: &HfMeta, keys: &[u64]) -> Result<()>;

    fn meta(&self, parent_id: ParentId, field_id: FieldId) -> Result<Option<HfMeta>>;

    fn read_batch(
        &self,
        parent_id: ParentId,
        field_id: FieldId,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<u64>>;

    /// Point probe into the persisted set (tier C of the lookup chain).
    fn contains(&self, parent_id: ParentId, field_id: FieldId, key: u64) -> Result<bool>;
}

/// In-memory store used by tests and embedded callers.
#[derive(Debug, Default)]
pub struct MemStorage {
    sets: RwLock<AHashMap<(ParentId, FieldId), (HfMeta, Vec<u64>)>>,
}

impl MemStorage {
    pub fn new() -> Self {
        MemStorage::default()
    }
}

impl HfStore for MemStorage {
    fn replace(&self, meta: &HfMeta, keys: &[u64]) -> Result<()> {
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]), "keys must be sorted");
        self.sets.write().insert(
            (meta.parent_id, meta.field_id),
            (meta.clone(), keys.to_vec()),
        );
        Ok(())
    }

    fn meta(&self, parent_id: ParentId, field_id: FieldId) -> Result<Option<HfMeta>> {
        Ok(self
            .sets
            .read()
            .get(&(parent_id, field_id))
            .map(|(meta, _)| meta.clone()))
    }

    fn read_batch(
        &self,
        parent_id: ParentId,
        field_id: FieldId,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<u64>> {
        let sets = self.sets.read();
        let Some((_, keys)) = sets.get(&(parent_id, field_id)) else {
            return Ok(Vec::new());
        };
        let start = (offset as usize).min(keys.len());
        let end = start.saturating_add(limit).min(keys.len());
        Ok(keys[start..end].to_vec())
    }

    fn contains(&self, parent_id: ParentId, field_id: FieldId, key: u64) -> Result<bool> {
        let sets = self.sets.read();
        match sets.get(&(parent_id, field_id)) {
            Some((_, keys)) => Ok(keys.binary_search(&key).is_ok()),
            None => Ok(false),
        }
    }
}
