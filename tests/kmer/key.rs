// Integration tests for width selection and the key model.

use kmerdex::kmer::key::{compare_keys, format_key, pack_key, split_key};
use kmerdex::{KeyBuf, KeyWidth};

#[test]
fn width_is_monotone_in_total_bits() {
    // Exhaustive over the parameter ranges: 2k + r <= 16 -> u16,
    // <= 32 -> u32, else u64; never narrower than the bits require.
    for k in 4..=32u32 {
        for r in 0..=16u32 {
            let total = 2 * k + r;
            let width = KeyWidth::select(k, r);
            assert!(width.bits() >= total, "k={k} r={r}");
            let expected = if total <= 16 {
                KeyWidth::U16
            } else if total <= 32 {
                KeyWidth::U32
            } else {
                KeyWidth::U64
            };
            assert_eq!(width, expected, "k={k} r={r}");
        }
    }
}

#[test]
fn key_layout_kmer_above_rank() {
    // k-mer bits occupy the high field, rank the low r bits.
    let key = pack_key(0b1101, 0b10, 2);
    assert_eq!(key, 0b1101_10);
    assert_eq!(split_key(key, 2), (0b1101, 0b10));
}

#[test]
fn pack_split_roundtrip_at_extremes() {
    // Largest representable k-mer and rank for k=32, r=16 would need
    // 80 bits; the largest tuple that actually fits u64 is k=24, r=16.
    let kmer = (1u64 << 48) - 1;
    let rank = (1u32 << 16) - 1;
    let key = pack_key(kmer, rank, 16);
    assert_eq!(key, u64::MAX);
    assert_eq!(split_key(key, 16), (kmer, rank));
}

#[test]
fn compare_keys_is_a_total_unsigned_order() {
    let mut keys = [5u64, 0, u64::MAX, 17, 1 << 40];
    keys.sort_by(|a, b| compare_keys(*a, *b));
    assert_eq!(keys, [0, 5, 17, 1 << 40, u64::MAX]);
}

#[test]
fn keybuf_preserves_order_and_width() {
    for width in [KeyWidth::U16, KeyWidth::U32, KeyWidth::U64] {
        let mut buf = KeyBuf::new(width);
        for v in [3u64, 1, 2] {
            buf.push(v).unwrap();
        }
        assert_eq!(buf.width(), width);
        assert_eq!(buf.to_u64_vec(), vec![3, 1, 2]);
        buf.sort_unstable();
        assert_eq!(buf.to_u64_vec(), vec![1, 2, 3]);
    }
}

#[test]
fn format_key_is_readable() {
    // GATTACA with k=7: G=10 A=00 T=11 T=11 A=00 C=01 A=00.
    let kmer = 0b10_00_11_11_00_01_00u64;
    assert_eq!(format_key(pack_key(kmer, 5, 8), 7, 8), "GATTACA·5");
    assert_eq!(format_key(kmer, 7, 0), "GATTACA");
}
