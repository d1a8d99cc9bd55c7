//! K-mer key extraction: slide a k-window over a packed sequence and emit
//! occurrence-ranked index keys.
//!
//! Guarantees:
//! 1. Keys appear in left-to-right window order; a degenerate window's
//!    expansion order is fixed (see [`crate::alphabet::degenerate`]).
//! 2. A window is dropped (not an error) when it exceeds the degenerate
//!    expansion limit, when its k-mer is rank-saturated, or when a byte
//!    offset would overflow while reading it.
//! 3. Every emitted element has exactly the width selected from `(k, r)`.
//! 4. `L < k` produces an empty stream.
//!
//! Two loop shapes exist for the strict alphabet: a per-window scalar
//! reference that re-reads `k` codes, and an accelerated rolling loop
//! that shifts one code per step.  The dispatch probe picks the rolling
//! loop on any vector-capable machine; both produce identical streams and
//! the tests hold them to that.

use crate::alphabet::degenerate::{expand_window, Expansion};
use crate::alphabet::types::{Alphabet, PackedSeq};
use crate::cancel::CancelToken;
use crate::config::Params;
use crate::dispatch::{self, Capability};
use crate::error::Result;
use crate::kmer::key::{pack_key, KeyBuf, KeyWidth};
use crate::kmer::rank::RankTracker;

/// Windows between cancellation polls.
const CANCEL_POLL_WINDOWS: usize = 4096;

/// Extract the key stream of a packed sequence.
pub fn extract_keys(seq: &PackedSeq, params: &Params) -> Result<KeyBuf> {
    extract_keys_cancellable(seq, params, None)
}

/// Extraction with a host cancellation signal, polled at loop boundaries.
pub fn extract_keys_cancellable(
    seq: &PackedSeq,
    params: &Params,
    cancel: Option<&CancelToken>,
) -> Result<KeyBuf> {
    let k = params.k();
    let r = params.r();
    let width = KeyWidth::for_params(params);
    let n = seq.symbol_len();
    if n < k as usize {
        return Ok(KeyBuf::new(width));
    }
    let n_windows = n - k as usize + 1;
    let mut out = KeyBuf::with_capacity(width, n_windows);
    let mut ranks = RankTracker::new(r);

    match seq.alphabet() {
        Alphabet::Dna2 => {
            if dispatch::capability() == Capability::Scalar {
                extract2_scalar(seq, k, r, n_windows, &mut ranks, &mut out, cancel)?;
            } else {
                extract2_rolling(seq, k, r, n_windows, &mut ranks, &mut out, cancel)?;
            }
        }
        Alphabet::Iupac4 => {
            extract4(seq, k, r, n_windows, &mut ranks, &mut out, cancel)?;
        }
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Strict alphabet
// ─────────────────────────────────────────────────────────────────────────────

/// Read the 2k k-mer bits of the window at `pos`.
#[inline]
fn window_kmer2(seq: &PackedSeq, pos: usize, k: u32) -> Result<u64> {
    let mut kmer = 0u64;
    for i in 0..k as usize {
        kmer = (kmer << 2) | seq.get_code(pos + i)? as u64;
    }
    Ok(kmer)
}

/// Reference loop: every window re-reads its codes.
fn extract2_scalar(
    seq: &PackedSeq,
    k: u32,
    r: u32,
    n_windows: usize,
    ranks: &mut RankTracker,
    out: &mut KeyBuf,
    cancel: Option<&CancelToken>,
) -> Result<()> {
    for pos in 0..n_windows {
        if pos % CANCEL_POLL_WINDOWS == 0 {
            if let Some(c) = cancel {
                c.check()?;
            }
        }
        let kmer = match window_kmer2(seq, pos, k) {
            Ok(v) => v,
            Err(_) => continue, // offset overflow: skip the window
        };
        if let Some(rank) = ranks.next_rank(kmer) {
            out.push(pack_key(kmer, rank, r))?;
        }
    }
    Ok(())
}

/// Accelerated loop: one code read and one masked shift per window.
fn extract2_rolling(
    seq: &PackedSeq,
    k: u32,
    r: u32,
    n_windows: usize,
    ranks: &mut RankTracker,
    out: &mut KeyBuf,
    cancel: Option<&CancelToken>,
) -> Result<()> {
    let kmer_bits = 2 * k;
    let mask = if kmer_bits == 64 {
        u64::MAX
    } else {
        (1u64 << kmer_bits) - 1
    };
    let mut acc = 0u64;
    for i in 0..(k as usize - 1) {
        acc = (acc << 2) | seq.get_code(i)? as u64;
    }
    for pos in 0..n_windows {
        if pos % CANCEL_POLL_WINDOWS == 0 {
            if let Some(c) = cancel {
                c.check()?;
            }
        }
        acc = ((acc << 2) | seq.get_code(pos + k as usize - 1)? as u64) & mask;
        if let Some(rank) = ranks.next_rank(acc) {
            out.push(pack_key(acc, rank, r))?;
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// IUPAC alphabet
// ─────────────────────────────────────────────────────────────────────────────

fn extract4(
    seq: &PackedSeq,
    k: u32,
    r: u32,
    n_windows: usize,
    ranks: &mut RankTracker,
    out: &mut KeyBuf,
    cancel: Option<&CancelToken>,
) -> Result<()> {
    let mut expansion = Expansion::new();
    for pos in 0..n_windows {
        if pos % CANCEL_POLL_WINDOWS == 0 {
            if let Some(c) = cancel {
                c.check()?;
            }
        }
        match expand_window(seq, pos, k, &mut expansion) {
            Ok(true) => {}
            Ok(false) => continue, // exceeds the degenerate limit
            Err(_) => continue,    // offset overflow: skip the window
        }
        for &kmer in &expansion {
            if let Some(rank) = ranks.next_rank(kmer) {
                out.push(pack_key(kmer, rank, r))?;
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-row distinct k-mers (analysis path)
// ─────────────────────────────────────────────────────────────────────────────

/// Collect the distinct k-mers of one row, sorted ascending.
///
/// Used by the high-frequency analyzer: every k-mer counts once per row
/// no matter how often it occurs, and rank saturation plays no part.
/// Degenerate windows obey the same skip rule as extraction.
pub fn row_distinct_kmers(seq: &PackedSeq, k: u32, out: &mut Vec<u64>) -> Result<()> {
    out.clear();
    let n = seq.symbol_len();
    if n < k as usize {
        return Ok(());
    }
    let n_windows = n - k as usize + 1;
    match seq.alphabet() {
        Alphabet::Dna2 => {
            for pos in 0..n_windows {
                if let Ok(kmer) = window_kmer2(seq, pos, k) {
                    out.push(kmer);
                }
            }
        }
        Alphabet::Iupac4 => {
            let mut expansion = Expansion::new();
            for pos in 0..n_windows {
                if let Ok(true) = expand_window(seq, pos, k, &mut expansion) {
                    out.extend_from_slice(&expansion);
                }
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(())
}
