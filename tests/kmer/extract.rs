// Integration tests for key extraction: the window/rank/width contract.

use kmerdex::alphabet::{encode_2bit, encode_4bit};
use kmerdex::{extract_keys, KeyWidth, Params};

fn params(k: u32, r: u32) -> Params {
    Params::new(k, r).unwrap()
}

#[test]
fn strict_window_count_is_l_minus_k_plus_1() {
    // With r large enough that no window saturates.
    let seq = encode_2bit("ACGTACGTACGTACGTACGTACGT").unwrap();
    for k in [4u32, 5, 8, 12] {
        let keys = extract_keys(&seq, &params(k, 8)).unwrap();
        assert_eq!(keys.len(), 24 - k as usize + 1, "k={k}");
    }
}

#[test]
fn minimal_sequence_yields_one_key() {
    let seq = encode_2bit("ACGT").unwrap();
    let keys = extract_keys(&seq, &params(4, 0)).unwrap();
    assert_eq!(keys.width(), KeyWidth::U16);
    assert_eq!(keys.to_u64_vec(), vec![0x1B]);
}

#[test]
fn repeated_kmer_carries_incremented_rank() {
    let seq = encode_2bit("ACGTACGT").unwrap();
    let keys = extract_keys(&seq, &params(4, 2)).unwrap();
    let v = keys.to_u64_vec();
    assert_eq!(v.len(), 5);
    assert_eq!(v[0], (0x1B << 2) | 0);
    assert_eq!(v[4], (0x1B << 2) | 1);
    // The middle windows are first occurrences.
    assert!(v[1..4].iter().all(|key| key & 0b11 == 0));
}

#[test]
fn degenerate_window_emits_each_member() {
    let seq = encode_4bit("ACGM").unwrap();
    let keys = extract_keys(&seq, &params(4, 0)).unwrap();
    assert_eq!(keys.to_u64_vec(), vec![0x18, 0x19]);
}

#[test]
fn fully_ambiguous_window_emits_nothing() {
    let seq = encode_4bit("NNNN").unwrap();
    assert!(extract_keys(&seq, &params(4, 0)).unwrap().is_empty());
}

#[test]
fn degenerate_expansions_rank_per_strict_kmer() {
    // "MAAAA" with k=4: window 0 (MAAA) expands to AAAA and CAAA;
    // window 1 (AAAA) is the *second* occurrence of AAAA.
    let seq = encode_4bit("MAAAA").unwrap();
    let keys = extract_keys(&seq, &params(4, 2)).unwrap();
    let aaaa = 0u64;
    let caaa = 0b01_00_00_00u64;
    assert_eq!(
        keys.to_u64_vec(),
        vec![(aaaa << 2) | 0, (caaa << 2) | 0, (aaaa << 2) | 1]
    );
}

#[test]
fn rank_saturation_drops_windows_silently() {
    // Twelve A's, k=4, r=1: AAAA occurs 9 times, cap is 2 occurrences.
    let seq = encode_2bit("AAAAAAAAAAAA").unwrap();
    let keys = extract_keys(&seq, &params(4, 1)).unwrap();
    assert_eq!(keys.to_u64_vec(), vec![0, 1]);
}

#[test]
fn extraction_is_a_pure_function_of_inputs() {
    let text = "ACGTGGMACGTYACGTACGTNNACGT";
    let seq = encode_4bit(text).unwrap();
    for (k, r) in [(4, 0), (4, 4), (6, 2), (8, 8)] {
        let a = extract_keys(&seq, &params(k, r)).unwrap();
        let b = extract_keys(&seq, &params(k, r)).unwrap();
        assert_eq!(a, b, "k={k} r={r}");
    }
}

#[test]
fn short_and_exact_length_sequences() {
    let p = params(8, 0);
    assert!(extract_keys(&encode_2bit("ACGTACG").unwrap(), &p)
        .unwrap()
        .is_empty());
    let exact = extract_keys(&encode_2bit("ACGTACGT").unwrap(), &p).unwrap();
    assert_eq!(exact.len(), 1);
}

#[test]
fn maximum_k_uses_the_full_word() {
    let text = "ACGT".repeat(10); // 40 symbols
    let seq = encode_2bit(&text).unwrap();
    let keys = extract_keys(&seq, &params(32, 0)).unwrap();
    assert_eq!(keys.width(), KeyWidth::U64);
    // 9 windows but the stream is periodic with period 4: only the
    // first four 32-mers are distinct, the rest saturate at r=0.
    assert_eq!(keys.len(), 4);
}
