// Fuzz the codecs: arbitrary bytes either fail cleanly with
// InvalidSymbol or round-trip to the canonical upper-case form.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(seq) = kmerdex::encode_2bit(text) {
        let decoded = kmerdex::decode_2bit(&seq).unwrap();
        assert_eq!(decoded, text.to_uppercase().replace('U', "T"));
    }
    if let Ok(seq) = kmerdex::encode_4bit(text) {
        let decoded = kmerdex::decode_4bit(&seq).unwrap();
        assert_eq!(decoded, text.to_uppercase().replace('U', "T"));
    }
});
