// Integration tests for the tiered high-frequency cache: load contract,
// parameter fencing, and the end-to-end analyze-then-load flow.

use kmerdex::alphabet::encode_2bit;
use kmerdex::hf::{analyze_high_frequency, AnalyzeOptions, HfCacheHierarchy};
use kmerdex::{CancelToken, Config, Error, MemSource, MemStorage, Params};

fn analyzed_store(params: &Params) -> MemStorage {
    // Three of four rows contain ACGT; rate 0.6 selects it alone.
    let rows = vec![
        encode_2bit("ACGTACGT").unwrap(),
        encode_2bit("ACGTTTTT").unwrap(),
        encode_2bit("TACGTTTT").unwrap(),
        encode_2bit("GGGGGGGG").unwrap(),
    ];
    let source = MemSource::from_rows(rows, 2);
    let store = MemStorage::new();
    analyze_high_frequency(
        &source,
        &store,
        1,
        2,
        params,
        &AnalyzeOptions {
            workers: 2,
            batch: 8,
            hashtable_size: 64,
        },
        &CancelToken::new(),
    )
    .unwrap();
    store
}

fn session_config() -> Config {
    let mut cfg = Config::default();
    cfg.params = Params::new(4, 2).unwrap();
    cfg.params.set_rate_max(0.6).unwrap();
    cfg
}

#[test]
fn analyze_then_load_then_lookup() {
    let cfg = session_config();
    let store = analyzed_store(&cfg.params);
    let mut hierarchy = HfCacheHierarchy::new();
    let loaded = hierarchy.load(&store, 1, 2, &cfg).unwrap();
    assert_eq!(loaded, 1);
    // Every rank of the excluded k-mer hits; nothing else does.
    for rank in 0..4u64 {
        assert!(hierarchy.lookup(&store, (0x1B << 2) | rank));
    }
    assert!(!hierarchy.lookup(&store, 0xFF << 2));
}

#[test]
fn load_with_small_batches_pages_completely() {
    let mut cfg = session_config();
    cfg.params.set_rate_max(0.4).unwrap(); // selects ACGT and TTTT
    cfg.hf_cache_load_batch = 1;
    let store = analyzed_store(&cfg.params);
    let mut hierarchy = HfCacheHierarchy::new();
    assert_eq!(hierarchy.load(&store, 1, 2, &cfg).unwrap(), 2);
    assert!(hierarchy.lookup(&store, 0x1B << 2));
    assert!(hierarchy.lookup(&store, 0xFF << 2));
}

#[test]
fn drifted_session_cannot_load_or_free() {
    let cfg = session_config();
    let store = analyzed_store(&cfg.params);

    let mut drifted = cfg.clone();
    drifted.params.set_nrow_max(5);
    let mut hierarchy = HfCacheHierarchy::new();
    match hierarchy.load(&store, 1, 2, &drifted) {
        Err(Error::ConfigMismatch { what, .. }) => assert_eq!(what, "nrow_max"),
        other => panic!("expected ConfigMismatch, got {other:?}"),
    }

    // Load with matching parameters, then fail to free with drifted ones.
    hierarchy.load(&store, 1, 2, &cfg).unwrap();
    assert_eq!(hierarchy.free(1, 2, &drifted.params), 0);
    assert!(hierarchy.is_loaded());
    assert_eq!(hierarchy.free(1, 2, &cfg.params), 1);
    assert!(!hierarchy.is_loaded());
}

#[test]
fn tier_b_round_trip_with_forced_knob() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = session_config();
    cfg.force_parallel_hf_cache = true;
    cfg.shared_cache_dir = dir.path().to_path_buf();
    let store = analyzed_store(&cfg.params);

    let mut first = HfCacheHierarchy::new();
    assert_eq!(first.load(&store, 1, 2, &cfg).unwrap(), 1);
    assert!(first.lookup(&store, 0x1B << 2));

    // A second hierarchy (modeling another process) attaches to the
    // same segment instead of rebuilding it.
    let mut second = HfCacheHierarchy::new();
    assert_eq!(second.load(&store, 1, 2, &cfg).unwrap(), 1);
    assert!(second.lookup(&store, (0x1B << 2) | 3));
    assert!(!second.lookup(&store, 0xAA << 2));

    first.free(1, 2, &cfg.params);
    // The segment survives while `second` still holds it.
    assert!(second.lookup(&store, 0x1B << 2));
}

#[test]
fn shared_tier_failure_falls_back_to_local() {
    // Force the shared tier at an unwritable location: load degrades
    // to the local tier and lookups still answer.
    let cfg = session_config();
    let store = analyzed_store(&cfg.params);
    let mut cfg_bad = cfg.clone();
    cfg_bad.force_parallel_hf_cache = true;
    cfg_bad.shared_cache_dir = std::path::PathBuf::from("/nonexistent-kmerdex-dir");
    let mut hierarchy = HfCacheHierarchy::new();
    // Shared tier fails, local tier still loads and answers.
    let loaded = hierarchy.load(&store, 1, 2, &cfg_bad).unwrap();
    assert_eq!(loaded, 1);
    assert!(hierarchy.lookup(&store, 0x1B << 2));
}
