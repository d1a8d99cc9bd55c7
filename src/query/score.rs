//! Similarity scoring: shared-count between key streams and the adjusted
//! minimum score.
//!
//! Because keys carry the occurrence rank, a key stream never repeats a
//! value, and the multiset shared-count over `(k-mer, rank)` pairs equals
//! the plain set-intersection size.  Three size-classed counting variants
//! exist: a quadratic scan for tiny inputs (vector-assisted where the
//! ISA allows), and a hash-probe path for everything else.  The scalar
//! quadratic scan is the reference; the tests pin every variant to it.

use ahash::AHashSet;

use crate::config::Params;
use crate::dispatch::{self, Capability};
use crate::kmer::key::KeyBuf;

/// Below this `|row| * |query|` product the quadratic scan wins over
/// building a hash set.
const QUADRATIC_LIMIT: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Shared-count
// ─────────────────────────────────────────────────────────────────────────────

/// Number of query keys that also appear in the row's key stream.
pub fn shared_count(row: &KeyBuf, query: &KeyBuf) -> u32 {
    match (row, query) {
        (KeyBuf::U16(r), KeyBuf::U16(q)) => shared_u16(r, q),
        (KeyBuf::U32(r), KeyBuf::U32(q)) => shared_u32(r, q),
        (KeyBuf::U64(r), KeyBuf::U64(q)) => shared_u64(r, q),
        // Width mismatch cannot happen within one session; score it
        // anyway rather than guessing wrong at the consistency boundary.
        _ => {
            let set: AHashSet<u64> = row.iter().collect();
            query.iter().filter(|k| set.contains(k)).count() as u32
        }
    }
}

macro_rules! shared_impl {
    ($name:ident, $ty:ty, $quad:ident) => {
        fn $name(row: &[$ty], query: &[$ty]) -> u32 {
            if row.is_empty() || query.is_empty() {
                return 0;
            }
            if row.len().saturating_mul(query.len()) < QUADRATIC_LIMIT {
                return $quad(row, query);
            }
            let (small, large) = if row.len() <= query.len() {
                (row, query)
            } else {
                (query, row)
            };
            let set: AHashSet<$ty> = small.iter().copied().collect();
            large.iter().filter(|k| set.contains(k)).count() as u32
        }
    };
}

shared_impl!(shared_u16, u16, quadratic_u16);
shared_impl!(shared_u32, u32, quadratic_u32);
shared_impl!(shared_u64, u64, quadratic_u64);

// ─────────────────────────────────────────────────────────────────────────────
// Quadratic scans (small inputs)
// ─────────────────────────────────────────────────────────────────────────────

fn quadratic_u16(row: &[u16], query: &[u16]) -> u32 {
    #[cfg(target_arch = "x86_64")]
    if dispatch::capability() >= Capability::Ssse3 {
        // SAFETY: sse2 is implied by the probe level on x86-64.
        return query
            .iter()
            .map(|&q| unsafe { count_matches_u16_sse2(row, q) })
            .sum();
    }
    #[cfg(target_arch = "aarch64")]
    if dispatch::capability() == Capability::Neon {
        return query
            .iter()
            .map(|&q| unsafe { count_matches_u16_neon(row, q) })
            .sum();
    }
    quadratic_scalar(row, query)
}

fn quadratic_u32(row: &[u32], query: &[u32]) -> u32 {
    #[cfg(target_arch = "x86_64")]
    if dispatch::capability() >= Capability::Ssse3 {
        // SAFETY: sse2 is implied by the probe level on x86-64.
        return query
            .iter()
            .map(|&q| unsafe { count_matches_u32_sse2(row, q) })
            .sum();
    }
    #[cfg(target_arch = "aarch64")]
    if dispatch::capability() == Capability::Neon {
        return query
            .iter()
            .map(|&q| unsafe { count_matches_u32_neon(row, q) })
            .sum();
    }
    quadratic_scalar(row, query)
}

fn quadratic_u64(row: &[u64], query: &[u64]) -> u32 {
    #[cfg(target_arch = "x86_64")]
    if dispatch::capability() >= Capability::Avx2 {
        // SAFETY: avx2 confirmed by the probe.
        return query
            .iter()
            .map(|&q| unsafe { count_matches_u64_avx2(row, q) })
            .sum();
    }
    quadratic_scalar(row, query)
}

/// Reference scan all vector variants must agree with.
fn quadratic_scalar<T: Copy + Eq>(row: &[T], query: &[T]) -> u32 {
    let mut n = 0;
    for &q in query {
        if row.contains(&q) {
            n += 1;
        }
    }
    n
}

// ─────────────────────────────────────────────────────────────────────────────
// Vector match counters
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn count_matches_u16_sse2(hay: &[u16], needle: u16) -> u32 {
    use std::arch::x86_64::*;
    let nv = _mm_set1_epi16(needle as i16);
    let mut n = 0u32;
    let chunks = hay.chunks_exact(8);
    let rem = chunks.remainder();
    for ch in chunks {
        let v = _mm_loadu_si128(ch.as_ptr() as *const __m128i);
        let eq = _mm_cmpeq_epi16(v, nv);
        // Two mask bits per 16-bit lane.
        n += (_mm_movemask_epi8(eq) as u32).count_ones() / 2;
    }
    for &x in rem {
        n += (x == needle) as u32;
    }
    n
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn count_matches_u32_sse2(hay: &[u32], needle: u32) -> u32 {
    use std::arch::x86_64::*;
    let nv = _mm_set1_epi32(needle as i32);
    let mut n = 0u32;
    let chunks = hay.chunks_exact(4);
    let rem = chunks.remainder();
    for ch in chunks {
        let v = _mm_loadu_si128(ch.as_ptr() as *const __m128i);
        let eq = _mm_cmpeq_epi32(v, nv);
        n += (_mm_movemask_ps(_mm_castsi128_ps(eq)) as u32).count_ones();
    }
    for &x in rem {
        n += (x == needle) as u32;
    }
    n
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn count_matches_u64_avx2(hay: &[u64], needle: u64) -> u32 {
    use std::arch::x86_64::*;
    let nv = _mm256_set1_epi64x(needle as i64);
    let mut n = 0u32;
    let chunks = hay.chunks_exact(4);
    let rem = chunks.remainder();
    for ch in chunks {
        let v = _mm256_loadu_si256(ch.as_ptr() as *const __m256i);
        let eq = _mm256_cmpeq_epi64(v, nv);
        n += (_mm256_movemask_pd(_mm256_castsi256_pd(eq)) as u32).count_ones();
    }
    for &x in rem {
        n += (x == needle) as u32;
    }
    n
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn count_matches_u16_neon(hay: &[u16], needle: u16) -> u32 {
    use std::arch::aarch64::*;
    let nv = vdupq_n_u16(needle);
    let mut n = 0u32;
    let chunks = hay.chunks_exact(8);
    let rem = chunks.remainder();
    for ch in chunks {
        let v = vld1q_u16(ch.as_ptr());
        let eq = vceqq_u16(v, nv);
        // Matching lanes are 0xFFFF; horizontal-add and divide out.
        n += (vaddvq_u16(vshrq_n_u16(eq, 15))) as u32;
    }
    for &x in rem {
        n += (x == needle) as u32;
    }
    n
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn count_matches_u32_neon(hay: &[u32], needle: u32) -> u32 {
    use std::arch::aarch64::*;
    let nv = vdupq_n_u32(needle);
    let mut n = 0u32;
    let chunks = hay.chunks_exact(4);
    let rem = chunks.remainder();
    for ch in chunks {
        let v = vld1q_u32(ch.as_ptr());
        let eq = vceqq_u32(v, nv);
        n += vaddvq_u32(vshrq_n_u32(eq, 31));
    }
    for &x in rem {
        n += (x == needle) as u32;
    }
    n
}

// ─────────────────────────────────────────────────────────────────────────────
// Adjusted minimum score
// ─────────────────────────────────────────────────────────────────────────────

/// The shared-count a candidate must reach to match, for a query of
/// `n_query_keys` keys of which `n_excluded` fall in the high-frequency
/// set.
///
/// The floor never drops below 1: a query whose keys are all excluded
/// still requires one shared key rather than matching everything.
pub fn adjusted_min_score(params: &Params, n_query_keys: usize, n_excluded: usize) -> u32 {
    let rate_floor = (params.min_shared_rate() * n_query_keys as f64).ceil() as u32;
    let base = params.min_score().max(rate_floor);
    base.saturating_sub(n_excluded as u32).max(1)
}
