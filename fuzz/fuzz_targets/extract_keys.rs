// Fuzz extraction: for any accepted input and any (k, r) the extractor
// must stay in bounds, stay deterministic, and respect the window count
// and width contracts.

#![no_main]

use libfuzzer_sys::fuzz_target;

use kmerdex::{extract_keys, Params};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let k = 4 + (data[0] % 29) as u32; // 4..=32
    let r = (data[1] % 17) as u32; // 0..=16
    let params = Params::new(k, r).unwrap();
    let Ok(text) = std::str::from_utf8(&data[2..]) else {
        return;
    };

    let encoders: [fn(&str) -> kmerdex::Result<kmerdex::PackedSeq>; 2] =
        [kmerdex::encode_2bit, kmerdex::encode_4bit];
    for encode in encoders {
        if let Ok(seq) = encode(text) {
            let a = extract_keys(&seq, &params).unwrap();
            let b = extract_keys(&seq, &params).unwrap();
            assert_eq!(a, b);
            let n = seq.symbol_len();
            if n < k as usize {
                assert!(a.is_empty());
            }
            assert!(a.width().bits() >= 2 * k + r);
        }
    }
});
