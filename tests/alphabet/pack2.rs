// Integration tests for the strict 2-bit codec.
//
// The codec contract:
//   - decode(encode(s)) == upper(s.replace('U', 'T'))
//   - A=00, C=01, G=10, T=11, MSB-first within each byte
//   - trailing bits of the last byte are zero
//   - anything outside {A,C,G,T,U} (either case) is InvalidSymbol

use kmerdex::{decode_2bit, encode_2bit, Error};

#[test]
fn canonical_bit_layout() {
    let seq = encode_2bit("ACGT").unwrap();
    assert_eq!(seq.bit_len(), 8);
    assert_eq!(seq.bytes(), &[0b0001_1011]);
}

#[test]
fn roundtrip_normalizes_case_and_u() {
    for (input, expect) in [
        ("acgt", "ACGT"),
        ("AcGtU", "ACGTT"),
        ("uuuu", "TTTT"),
        ("", ""),
        ("GATTACA", "GATTACA"),
    ] {
        let seq = encode_2bit(input).unwrap();
        assert_eq!(decode_2bit(&seq).unwrap(), expect, "input {input:?}");
    }
}

#[test]
fn every_invalid_ascii_byte_is_rejected() {
    for b in 0u8..=127 {
        let valid = matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'U');
        let text = format!("ACG{}", b as char);
        let result = encode_2bit(&text);
        if valid {
            assert!(result.is_ok(), "byte 0x{b:02X} should encode");
        } else {
            match result {
                Err(Error::InvalidSymbol { byte, position, .. }) => {
                    assert_eq!(byte, b);
                    assert_eq!(position, 3);
                }
                other => panic!("byte 0x{b:02X}: expected InvalidSymbol, got {other:?}"),
            }
        }
    }
}

#[test]
fn lengths_across_byte_boundaries() {
    for len in 0..40 {
        let text: String = std::iter::repeat("ACGT").flat_map(|s| s.chars()).take(len).collect();
        let seq = encode_2bit(&text).unwrap();
        assert_eq!(seq.bit_len() as usize, 2 * len);
        assert_eq!(seq.symbol_len(), len);
        assert_eq!(decode_2bit(&seq).unwrap(), text);
    }
}

#[test]
fn packed_bytes_are_deterministic() {
    let a = encode_2bit("ACGTACGTACGTACGTT").unwrap();
    let b = encode_2bit("ACGTACGTACGTACGTT").unwrap();
    assert_eq!(a, b);
}
