//! Degenerate-symbol expansion for the IUPAC alphabet.
//!
//! A degenerate window stands for every strict window obtained by picking
//! one member base per position.  Expansion is capped: a window whose
//! expansion would be too large is *skipped* by callers, never an error.
//!
//! The skip rule: a window exceeds the limit iff it contains any
//! fully-ambiguous symbol (`N`, or an empty nibble from corrupt storage)
//! OR two or more partially-ambiguous symbols (2 or 3 membership bits).
//! A single partially-ambiguous symbol expands to at most 3 strict
//! windows and never exceeds.

use smallvec::SmallVec;

use crate::alphabet::types::{Alphabet, PackedSeq, CHAR2, CODE4, INVALID_CODE};
use crate::error::{Error, Result};

/// Hard cap on the number of strict k-mers a degenerate window may
/// expand to.  With the skip rule above the practical maximum is 3, but
/// callers size their buffers to this bound.
pub const EXPANSION_LIMIT: usize = 10;

/// Expanded strict k-mers of one window, in deterministic order.
pub type Expansion = SmallVec<[u64; EXPANSION_LIMIT]>;

// ─────────────────────────────────────────────────────────────────────────────
// Symbol classification
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolClass {
    /// Exactly one membership bit.
    Strict,
    /// Two or three membership bits (`M`, `V`, ...).
    Partial,
    /// All four bits (`N`) or none (invalid/empty nibble).
    Full,
}

#[inline]
fn classify(nibble: u8) -> SymbolClass {
    match (nibble & 0b1111).count_ones() {
        1 => SymbolClass::Strict,
        2 | 3 => SymbolClass::Partial,
        _ => SymbolClass::Full,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Skip predicate
// ─────────────────────────────────────────────────────────────────────────────

/// Whether the `k`-symbol window at `offset` exceeds the expansion limit.
///
/// Equivalent to materializing the expansion and counting, but computed
/// from symbol classes alone.  Window bounds are checked up front;
/// a window reaching past the sequence is `OutOfRange`.
pub fn exceeds_degenerate_limit(seq: &PackedSeq, offset: usize, k: u32) -> Result<bool> {
    debug_assert_eq!(seq.alphabet(), Alphabet::Iupac4);
    let end = offset
        .checked_add(k as usize)
        .ok_or(Error::OutOfRange {
            what: "window end",
            value: i64::MAX,
            min: 0,
            max: seq.symbol_len() as i64,
        })?;
    if end > seq.symbol_len() {
        return Err(Error::OutOfRange {
            what: "window end",
            value: end as i64,
            min: 0,
            max: seq.symbol_len() as i64,
        });
    }
    let mut partial = 0u32;
    for i in offset..end {
        match classify(seq.get_code(i)?) {
            SymbolClass::Full => return Ok(true),
            SymbolClass::Partial => {
                partial += 1;
                if partial >= 2 {
                    return Ok(true);
                }
            }
            SymbolClass::Strict => {}
        }
    }
    Ok(false)
}

// ─────────────────────────────────────────────────────────────────────────────
// Expansion
// ─────────────────────────────────────────────────────────────────────────────

/// Expand the window at `offset` into strict 2-bit k-mer integers.
///
/// Returns `false` without touching `out` when the window exceeds the
/// limit (the caller skips it).  Order is deterministic: positions left
/// to right, member bases in `A < C < G < T` order.
pub fn expand_window(seq: &PackedSeq, offset: usize, k: u32, out: &mut Expansion) -> Result<bool> {
    if exceeds_degenerate_limit(seq, offset, k)? {
        return Ok(false);
    }
    out.clear();
    out.push(0);
    for i in 0..k as usize {
        let nibble = seq.get_code(offset + i)?;
        // In-place product step: each partial k-mer forks once per member
        // base.  At most one position in the window has more than one
        // member, so the buffer never outgrows EXPANSION_LIMIT.
        let cur = out.len();
        for slot in 0..cur {
            let prefix = out[slot] << 2;
            let mut first = true;
            for code in 0u64..4 {
                if nibble & (1 << (3 - code)) != 0 {
                    if first {
                        out[slot] = prefix | code;
                        first = false;
                    } else {
                        out.push(prefix | code);
                    }
                }
            }
        }
    }
    Ok(true)
}

/// Text-level expansion of a degenerate window.
///
/// `None` is the skip signal: the window exceeds the expansion limit.
/// Invalid bytes are [`Error::InvalidSymbol`].
pub fn expand_degenerate(window: &str) -> Result<Option<SmallVec<[String; EXPANSION_LIMIT]>>> {
    let bytes = window.as_bytes();
    let mut partial = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        let nibble = CODE4[b as usize];
        if nibble == INVALID_CODE {
            return Err(Error::InvalidSymbol {
                byte: b,
                position: i,
                alphabet: Alphabet::Iupac4.name(),
            });
        }
        match classify(nibble) {
            SymbolClass::Full => return Ok(None),
            SymbolClass::Partial => {
                partial += 1;
                if partial >= 2 {
                    return Ok(None);
                }
            }
            SymbolClass::Strict => {}
        }
    }

    let mut expansions: SmallVec<[String; EXPANSION_LIMIT]> = SmallVec::new();
    expansions.push(String::with_capacity(bytes.len()));
    for &b in bytes {
        let nibble = CODE4[b as usize];
        let cur = expansions.len();
        for slot in 0..cur {
            let prefix = expansions[slot].clone();
            let mut first = true;
            for code in 0..4usize {
                if nibble & (1 << (3 - code)) != 0 {
                    let ch = CHAR2[code] as char;
                    if first {
                        expansions[slot].push(ch);
                        first = false;
                    } else {
                        let mut forked = prefix.clone();
                        forked.push(ch);
                        expansions.push(forked);
                    }
                }
            }
        }
    }
    Ok(Some(expansions))
}
