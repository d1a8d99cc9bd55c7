//! Sequence alphabets and bit-packed codecs.
//!
//! Submodules:
//! - [`types`]      — [`Alphabet`], [`PackedSeq`], symbol code tables
//! - [`pack2`]      — strict 2-bit codec (SIMD-dispatched encoder)
//! - [`pack4`]      — IUPAC 4-bit codec
//! - [`degenerate`] — degenerate expansion and the skip predicate

pub mod degenerate;
pub mod pack2;
pub mod pack4;
pub mod types;

pub use degenerate::{exceeds_degenerate_limit, expand_degenerate, EXPANSION_LIMIT};
pub use pack2::{decode_2bit, encode_2bit};
pub use pack4::{decode_4bit, encode_4bit};
pub use types::{Alphabet, PackedSeq};

use crate::error::Result;

/// Encode text with the given alphabet's codec.
pub fn encode(alphabet: Alphabet, text: &str) -> Result<PackedSeq> {
    match alphabet {
        Alphabet::Dna2 => encode_2bit(text),
        Alphabet::Iupac4 => encode_4bit(text),
    }
}

/// Decode a packed sequence with its own alphabet's codec.
pub fn decode(seq: &PackedSeq) -> Result<String> {
    match seq.alphabet() {
        Alphabet::Dna2 => decode_2bit(seq),
        Alphabet::Iupac4 => decode_4bit(seq),
    }
}
