//! Tier B: the cross-process shared high-frequency key set.
//!
//! A file-backed shared mapping holding a fixed-size open-addressed hash.
//! One process creates and populates it (the *writer*), flips the `ready`
//! flag, and every later process attaches read-mostly.  Mutation uses a
//! per-bucket state byte as a spinlock (`empty → busy → full`); readers
//! probe lock-free and only ever attach after `ready`, so they can never
//! observe a half-written bucket.
//!
//! The mapping is reference-counted in its own header.  [`HfSharedCache`]
//! is the RAII guard: dropping it detaches, and the last detacher unlinks
//! the backing file.  Detach is idempotent: a repeated or explicit
//! detach after drop is a no-op.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use memmap2::MmapMut;

use crate::error::{Error, Result};
use crate::hf::HfCacheKey;

const MAGIC: u64 = 0x4B4D_5244_4858_4631; // "KMRDHXF1"
const VERSION: u32 = 1;
const HEADER_LEN: usize = 128;

// Header field offsets.
const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 8;
const OFF_BUCKETS: usize = 16;
const OFF_LEN: usize = 24;
const OFF_REFCOUNT: usize = 32;
const OFF_READY: usize = 36;
const OFF_PARENT: usize = 40;
const OFF_FIELD_HASH: usize = 48;
const OFF_K: usize = 56;
const OFF_R: usize = 60;
const OFF_RATE_BITS: usize = 64;
const OFF_NROW: usize = 72;

// Bucket states.
const EMPTY: u8 = 0;
const BUSY: u8 = 1;
const FULL: u8 = 2;

#[inline]
fn spread(key: u64) -> u64 {
    key.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// RAII guard over the shared mapping.
#[derive(Debug)]
pub struct HfSharedCache {
    map: MmapMut,
    path: PathBuf,
    bucket_count: usize,
    keys_off: usize,
    detached: bool,
}

impl HfSharedCache {
    /// Path of the segment file for a `(parent, field-hash)` pair.
    pub fn segment_path(dir: &Path, cache_key: &HfCacheKey) -> PathBuf {
        dir.join(format!(
            "kmerdex_hf_{:016x}_{:016x}.shm",
            cache_key.parent_id, cache_key.field_hash
        ))
    }

    /// Create a fresh segment sized for `expected` keys.  The caller is
    /// the single writer until [`mark_ready`](Self::mark_ready).
    pub fn create(dir: &Path, cache_key: &HfCacheKey, expected: usize) -> Result<Self> {
        let bucket_count = (expected.max(16) * 2).next_power_of_two();
        let keys_off = (HEADER_LEN + bucket_count + 7) & !7;
        let file_len = keys_off + bucket_count * 8;

        let path = Self::segment_path(dir, cache_key);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::Transient(format!("shared cache create failed: {e}")))?;
        file.set_len(file_len as u64)
            .map_err(|e| Error::Transient(format!("shared cache sizing failed: {e}")))?;
        // SAFETY: the mapping is private to this crate's segment protocol;
        // all cross-process mutation below goes through atomics.
        let mut map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| Error::Transient(format!("shared cache mapping failed: {e}")))?;

        write_u64(&mut map, OFF_MAGIC, MAGIC);
        write_u32(&mut map, OFF_VERSION, VERSION);
        write_u64(&mut map, OFF_BUCKETS, bucket_count as u64);
        write_u64(&mut map, OFF_LEN, 0);
        write_u32(&mut map, OFF_REFCOUNT, 1);
        write_u32(&mut map, OFF_READY, 0);
        write_u64(&mut map, OFF_PARENT, cache_key.parent_id);
        write_u64(&mut map, OFF_FIELD_HASH, cache_key.field_hash);
        write_u32(&mut map, OFF_K, cache_key.k);
        write_u32(&mut map, OFF_R, cache_key.r);
        write_u64(&mut map, OFF_RATE_BITS, cache_key.rate_max_bits);
        write_u64(&mut map, OFF_NROW, cache_key.nrow_max);

        Ok(HfSharedCache {
            map,
            path,
            bucket_count,
            keys_off,
            detached: false,
        })
    }

    /// Attach to an existing ready segment.
    ///
    /// `Ok(None)` when there is nothing usable to attach to: no segment,
    /// a segment still being populated, or one built for a different
    /// parameter tuple (logged; the caller rebuilds or falls back).
    pub fn attach(dir: &Path, cache_key: &HfCacheKey) -> Result<Option<Self>> {
        let path = Self::segment_path(dir, cache_key);
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Transient(format!("shared cache open failed: {e}"))),
        };
        // SAFETY: as in `create`; mutation is atomic-only.
        let map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| Error::Transient(format!("shared cache mapping failed: {e}")))?;
        if map.len() < HEADER_LEN
            || read_u64(&map, OFF_MAGIC) != MAGIC
            || read_u32(&map, OFF_VERSION) != VERSION
        {
            tracing::warn!(path = %path.display(), "shared cache segment malformed; ignoring");
            return Ok(None);
        }
        let bucket_count = read_u64(&map, OFF_BUCKETS) as usize;
        let keys_off = (HEADER_LEN + bucket_count + 7) & !7;
        if map.len() < keys_off + bucket_count * 8 {
            tracing::warn!(path = %path.display(), "shared cache segment truncated; ignoring");
            return Ok(None);
        }
        // Armed only after the refcount is taken: dropping the guard on a
        // validation exit must not decrement a count it never held.
        let mut cache = HfSharedCache {
            map,
            path,
            bucket_count,
            keys_off,
            detached: true,
        };
        if !cache.is_ready() {
            // Another process is still populating; fall back for now.
            return Ok(None);
        }
        if cache.stored_cache_key() != *cache_key {
            tracing::warn!(
                "shared cache segment belongs to a different parameter tuple; ignoring"
            );
            return Ok(None);
        }
        cache.atomic_u32(OFF_REFCOUNT).fetch_add(1, Ordering::AcqRel);
        cache.detached = false;
        Ok(Some(cache))
    }

    /// The parameter tuple the segment was built for.
    pub fn stored_cache_key(&self) -> HfCacheKey {
        HfCacheKey {
            parent_id: read_u64(&self.map, OFF_PARENT),
            field_hash: read_u64(&self.map, OFF_FIELD_HASH),
            k: read_u32(&self.map, OFF_K),
            r: read_u32(&self.map, OFF_R),
            rate_max_bits: read_u64(&self.map, OFF_RATE_BITS),
            nrow_max: read_u64(&self.map, OFF_NROW),
        }
    }

    pub fn len(&self) -> u64 {
        self.atomic_u64(OFF_LEN).load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_ready(&self) -> bool {
        self.atomic_u32(OFF_READY).load(Ordering::Acquire) == 1
    }

    /// Publish the segment to readers.  Called once by the writer after
    /// the last insert.
    pub fn mark_ready(&self) {
        self.atomic_u32(OFF_READY).store(1, Ordering::Release);
    }

    /// Writer-side insert.  Duplicate keys are no-ops.
    pub fn insert(&self, key: u64) -> Result<()> {
        let mut i = spread(key) as usize & (self.bucket_count - 1);
        for _ in 0..self.bucket_count {
            let state = self.state(i);
            match state.compare_exchange(EMPTY, BUSY, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    self.key_slot(i).store(key, Ordering::Relaxed);
                    state.store(FULL, Ordering::Release);
                    self.atomic_u64(OFF_LEN).fetch_add(1, Ordering::AcqRel);
                    return Ok(());
                }
                Err(BUSY) => {
                    // Another writer owns the bucket; wait for it to settle.
                    while state.load(Ordering::Acquire) == BUSY {
                        std::hint::spin_loop();
                    }
                }
                Err(_) => {}
            }
            if state.load(Ordering::Acquire) == FULL
                && self.key_slot(i).load(Ordering::Relaxed) == key
            {
                return Ok(());
            }
            i = (i + 1) & (self.bucket_count - 1);
        }
        Err(Error::Transient("shared cache segment is full".into()))
    }

    /// Lock-free membership probe.
    pub fn contains(&self, key: u64) -> bool {
        let mut i = spread(key) as usize & (self.bucket_count - 1);
        for _ in 0..self.bucket_count {
            match self.state(i).load(Ordering::Acquire) {
                EMPTY => return false,
                FULL => {
                    if self.key_slot(i).load(Ordering::Relaxed) == key {
                        return true;
                    }
                }
                // BUSY: unpublished bucket; readers never see one after
                // `ready`, treat as absent.
                _ => return false,
            }
            i = (i + 1) & (self.bucket_count - 1);
        }
        false
    }

    /// Drop this process's reference; the last holder unlinks the file.
    /// Idempotent: calling it again (or dropping afterwards) is a no-op.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        let remaining = self.atomic_u32(OFF_REFCOUNT).fetch_sub(1, Ordering::AcqRel);
        if remaining == 1 {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), "shared cache unlink failed: {e}");
            }
        }
    }

    // ── Raw accessors ────────────────────────────────────────────────────────

    fn atomic_u32(&self, off: usize) -> &AtomicU32 {
        debug_assert_eq!(off % 4, 0);
        // SAFETY: offset is in-bounds, 4-aligned (the mapping is
        // page-aligned), and all cross-process access to this word is
        // atomic.
        unsafe { &*(self.map.as_ptr().add(off) as *const AtomicU32) }
    }

    fn atomic_u64(&self, off: usize) -> &AtomicU64 {
        debug_assert_eq!(off % 8, 0);
        // SAFETY: as above, 8-aligned.
        unsafe { &*(self.map.as_ptr().add(off) as *const AtomicU64) }
    }

    fn state(&self, bucket: usize) -> &AtomicU8 {
        debug_assert!(bucket < self.bucket_count);
        // SAFETY: in-bounds; byte access needs no alignment.
        unsafe { &*(self.map.as_ptr().add(HEADER_LEN + bucket) as *const AtomicU8) }
    }

    fn key_slot(&self, bucket: usize) -> &AtomicU64 {
        debug_assert!(bucket < self.bucket_count);
        self.atomic_u64(self.keys_off + bucket * 8)
    }
}

impl Drop for HfSharedCache {
    fn drop(&mut self) {
        self.detach();
    }
}

fn read_u32(map: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(map[off..off + 4].try_into().unwrap())
}

fn read_u64(map: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(map[off..off + 8].try_into().unwrap())
}

fn write_u32(map: &mut [u8], off: usize, v: u32) {
    map[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn write_u64(map: &mut [u8], off: usize, v: u64) {
    map[off..off + 8].copy_from_slice(&v.to_le_bytes());
}
