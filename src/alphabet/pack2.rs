//! 2-bit codec for the strict `{A, C, G, T}` alphabet.
//!
//! Encoding folds case and normalizes `U` to `T`; decoding always emits
//! upper-case canonical characters.  The encoder has a portable scalar
//! path and vector paths (SSSE3 / NEON) selected at runtime through
//! [`crate::dispatch`]; all paths produce byte-identical output, and the
//! vector paths fall back to the scalar loop to report the exact position
//! of an invalid byte.

use crate::alphabet::types::{Alphabet, BitPacker, PackedSeq, CHAR2, CODE2, INVALID_CODE};
use crate::dispatch::{self, Capability};
use crate::error::{Error, Result};

/// Encode text into a 2-bit packed sequence.
///
/// Accepts `A C G T U` in either case; anything else is
/// [`Error::InvalidSymbol`].
pub fn encode_2bit(text: &str) -> Result<PackedSeq> {
    let bytes = text.as_bytes();
    #[cfg(target_arch = "x86_64")]
    if dispatch::capability() >= Capability::Ssse3 {
        return encode2_ssse3(bytes);
    }
    #[cfg(target_arch = "aarch64")]
    if dispatch::capability() == Capability::Neon {
        return encode2_neon(bytes);
    }
    encode2_scalar(bytes)
}

/// Decode a 2-bit packed sequence back to canonical upper-case text.
pub fn decode_2bit(seq: &PackedSeq) -> Result<String> {
    if seq.alphabet() != Alphabet::Dna2 {
        return Err(Error::Internal(
            "decode_2bit called on a 4-bit packed sequence".into(),
        ));
    }
    let n = seq.symbol_len();
    let mut out = String::with_capacity(n);
    for i in 0..n {
        let code = seq.get_code(i)?;
        out.push(CHAR2[code as usize] as char);
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalar reference path
// ─────────────────────────────────────────────────────────────────────────────

fn encode2_scalar(bytes: &[u8]) -> Result<PackedSeq> {
    let mut packer = BitPacker::with_capacity(2, bytes.len());
    for (i, &b) in bytes.iter().enumerate() {
        let code = CODE2[b as usize];
        if code == INVALID_CODE {
            return Err(Error::InvalidSymbol {
                byte: b,
                position: i,
                alphabet: Alphabet::Dna2.name(),
            });
        }
        packer.push(code);
    }
    Ok(packer.finish(Alphabet::Dna2))
}

// ─────────────────────────────────────────────────────────────────────────────
// SSSE3 path
//
// 16 input bytes per step.  Case is folded by clearing bit 5; the low
// nibble of a folded valid byte is unique within the alphabet
// (A→1, C→3, T→4, U→5, G→7), so one shuffle yields the 2-bit code and a
// second yields the expected folded byte for validation.  Lanes whose
// folded value is zero (NUL, space) are rejected explicitly because they
// would otherwise compare equal to the LUT's zero filler.
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(target_arch = "x86_64")]
fn encode2_ssse3(bytes: &[u8]) -> Result<PackedSeq> {
    let mut packer = BitPacker::with_capacity(2, bytes.len());
    let mut i = 0;
    while i + 16 <= bytes.len() {
        let mut codes = [0u8; 16];
        // SAFETY: ssse3 is confirmed by the dispatch probe and the slice
        // window is 16 bytes long.
        let ok = unsafe { classify16_ssse3(&bytes[i..i + 16], &mut codes) };
        if !ok {
            // Re-run the scalar loop on the chunk for the exact offender.
            for (j, &b) in bytes[i..i + 16].iter().enumerate() {
                if CODE2[b as usize] == INVALID_CODE {
                    return Err(Error::InvalidSymbol {
                        byte: b,
                        position: i + j,
                        alphabet: Alphabet::Dna2.name(),
                    });
                }
            }
            unreachable!("vector path flagged a chunk the scalar loop accepts");
        }
        for code in codes {
            packer.push(code);
        }
        i += 16;
    }
    for (j, &b) in bytes[i..].iter().enumerate() {
        let code = CODE2[b as usize];
        if code == INVALID_CODE {
            return Err(Error::InvalidSymbol {
                byte: b,
                position: i + j,
                alphabet: Alphabet::Dna2.name(),
            });
        }
        packer.push(code);
    }
    Ok(packer.finish(Alphabet::Dna2))
}

/// Classify 16 bytes; writes the 2-bit codes and returns whether every
/// lane is a valid alphabet symbol.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "ssse3")]
unsafe fn classify16_ssse3(chunk: &[u8], codes: &mut [u8; 16]) -> bool {
    use std::arch::x86_64::*;

    debug_assert_eq!(chunk.len(), 16);
    let v = _mm_loadu_si128(chunk.as_ptr() as *const __m128i);
    let folded = _mm_and_si128(v, _mm_set1_epi8(0xDFu8 as i8));
    let lownib = _mm_and_si128(folded, _mm_set1_epi8(0x0F));

    // Low nibble → 2-bit code (filler lanes resolve to 0 and are caught
    // by the expected-byte comparison below).
    let code_lut = _mm_setr_epi8(0, 0, 0, 1, 3, 3, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0);
    // Low nibble → expected folded byte.
    let exp_lut = _mm_setr_epi8(
        0,
        b'A' as i8,
        0,
        b'C' as i8,
        b'T' as i8,
        b'U' as i8,
        0,
        b'G' as i8,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
    );

    let code = _mm_shuffle_epi8(code_lut, lownib);
    let expected = _mm_shuffle_epi8(exp_lut, lownib);
    let matches = _mm_cmpeq_epi8(folded, expected);
    let nonzero = _mm_cmpeq_epi8(folded, _mm_setzero_si128());
    let valid = _mm_andnot_si128(nonzero, matches);

    _mm_storeu_si128(codes.as_mut_ptr() as *mut __m128i, code);
    _mm_movemask_epi8(valid) == 0xFFFF
}

// ─────────────────────────────────────────────────────────────────────────────
// NEON path: same LUT algorithm with vqtbl1q byte shuffles.
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(target_arch = "aarch64")]
fn encode2_neon(bytes: &[u8]) -> Result<PackedSeq> {
    let mut packer = BitPacker::with_capacity(2, bytes.len());
    let mut i = 0;
    while i + 16 <= bytes.len() {
        let mut codes = [0u8; 16];
        // SAFETY: neon is confirmed by the dispatch probe and the slice
        // window is 16 bytes long.
        let ok = unsafe { classify16_neon(&bytes[i..i + 16], &mut codes) };
        if !ok {
            for (j, &b) in bytes[i..i + 16].iter().enumerate() {
                if CODE2[b as usize] == INVALID_CODE {
                    return Err(Error::InvalidSymbol {
                        byte: b,
                        position: i + j,
                        alphabet: Alphabet::Dna2.name(),
                    });
                }
            }
            unreachable!("vector path flagged a chunk the scalar loop accepts");
        }
        for code in codes {
            packer.push(code);
        }
        i += 16;
    }
    for (j, &b) in bytes[i..].iter().enumerate() {
        let code = CODE2[b as usize];
        if code == INVALID_CODE {
            return Err(Error::InvalidSymbol {
                byte: b,
                position: i + j,
                alphabet: Alphabet::Dna2.name(),
            });
        }
        packer.push(code);
    }
    Ok(packer.finish(Alphabet::Dna2))
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn classify16_neon(chunk: &[u8], codes: &mut [u8; 16]) -> bool {
    use std::arch::aarch64::*;

    debug_assert_eq!(chunk.len(), 16);
    let v = vld1q_u8(chunk.as_ptr());
    let folded = vandq_u8(v, vdupq_n_u8(0xDF));
    let lownib = vandq_u8(folded, vdupq_n_u8(0x0F));

    let code_lut: [u8; 16] = [0, 0, 0, 1, 3, 3, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0];
    let exp_lut: [u8; 16] = [
        0, b'A', 0, b'C', b'T', b'U', 0, b'G', 0, 0, 0, 0, 0, 0, 0, 0,
    ];

    let code = vqtbl1q_u8(vld1q_u8(code_lut.as_ptr()), lownib);
    let expected = vqtbl1q_u8(vld1q_u8(exp_lut.as_ptr()), lownib);
    let matches = vceqq_u8(folded, expected);
    let nonzero = vcgtq_u8(folded, vdupq_n_u8(0));
    let valid = vandq_u8(matches, nonzero);

    vst1q_u8(codes.as_mut_ptr(), code);
    vminvq_u8(valid) == 0xFF
}
