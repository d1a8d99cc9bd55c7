//! 4-bit codec for the 15-letter IUPAC alphabet.
//!
//! Each symbol packs to a `{A, C, G, T}` membership nibble (see
//! [`crate::alphabet::types`]).  `U` encodes as `T`'s nibble; decoding is
//! canonical upper-case.  The degenerate-expansion utilities live in
//! [`crate::alphabet::degenerate`].

use crate::alphabet::types::{Alphabet, BitPacker, PackedSeq, CHAR4, CODE4, INVALID_CODE};
use crate::error::{Error, Result};

/// Encode text into a 4-bit packed sequence.
pub fn encode_4bit(text: &str) -> Result<PackedSeq> {
    let bytes = text.as_bytes();
    let mut packer = BitPacker::with_capacity(4, bytes.len());
    for (i, &b) in bytes.iter().enumerate() {
        let code = CODE4[b as usize];
        if code == INVALID_CODE {
            return Err(Error::InvalidSymbol {
                byte: b,
                position: i,
                alphabet: Alphabet::Iupac4.name(),
            });
        }
        packer.push(code);
    }
    Ok(packer.finish(Alphabet::Iupac4))
}

/// Decode a 4-bit packed sequence back to canonical upper-case text.
///
/// An empty membership nibble cannot be produced by [`encode_4bit`]; one
/// found here means the packed bytes were corrupted in storage.
pub fn decode_4bit(seq: &PackedSeq) -> Result<String> {
    if seq.alphabet() != Alphabet::Iupac4 {
        return Err(Error::Internal(
            "decode_4bit called on a 2-bit packed sequence".into(),
        ));
    }
    let n = seq.symbol_len();
    let mut out = String::with_capacity(n);
    for i in 0..n {
        let code = seq.get_code(i)?;
        let ch = CHAR4[code as usize];
        if ch == 0 {
            return Err(Error::InvalidSymbol {
                byte: 0,
                position: i,
                alphabet: Alphabet::Iupac4.name(),
            });
        }
        out.push(ch as char);
    }
    Ok(out)
}
