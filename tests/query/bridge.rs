// Integration tests for the index-container bridge: the full query path
// from text to match decision.

use kmerdex::alphabet::{encode, Alphabet};
use kmerdex::{Config, HfMeta, HfStore, IndexBridge, MemStorage, Params, SearchMode};

fn config(k: u32, r: u32) -> Config {
    let mut cfg = Config::default();
    cfg.params = Params::new(k, r).unwrap();
    cfg
}

fn hf_meta_for(cfg: &Config, parent: u64, field: u32, count: u64) -> HfMeta {
    HfMeta {
        parent_id: parent,
        field_id: field,
        k: cfg.params.k(),
        r: cfg.params.r(),
        rate_max: cfg.params.rate_max(),
        nrow_max: cfg.params.nrow_max(),
        total_rows: 100,
        hf_count: count,
        duration_secs: 0.0,
    }
}

#[test]
fn query_and_ingest_extraction_agree() {
    for alphabet in [Alphabet::Dna2, Alphabet::Iupac4] {
        let mut bridge = IndexBridge::new(config(4, 2), alphabet);
        let text = "ACGTACGTTGCA";
        let (qkeys, mode) = bridge.extract_query(text).unwrap();
        assert_eq!(mode, SearchMode::Default);
        let vkeys = bridge
            .extract_values(&encode(alphabet, text).unwrap())
            .unwrap();
        assert_eq!(qkeys, vkeys, "alphabet {alphabet:?}");
    }
}

#[test]
fn cached_and_fresh_extraction_are_identical() {
    let mut bridge = IndexBridge::new(config(5, 3), Alphabet::Dna2);
    let first = bridge.extract_query("ACGTACGTACGT").unwrap().0;
    let second = bridge.extract_query("ACGTACGTACGT").unwrap().0;
    assert_eq!(first, second);
    let (stats, _) = bridge.cache_stats();
    assert_eq!(stats.hits, 1);
}

#[test]
fn consistent_is_exact_no_recheck() {
    let mut bridge = IndexBridge::new(config(4, 0), Alphabet::Dna2);
    let (keys, _) = bridge.extract_query("ACGTACGT").unwrap();
    let presence = vec![true; keys.len()];
    let (matched, recheck) = bridge.consistent(&presence, &keys);
    assert!(matched);
    assert!(!recheck);
    let absent = vec![false; keys.len()];
    let (matched, recheck) = bridge.consistent(&absent, &keys);
    assert!(!matched);
    assert!(!recheck);
}

#[test]
fn hf_load_requires_matching_parameters() {
    let cfg = config(4, 0);
    let store = MemStorage::new();
    store
        .replace(&hf_meta_for(&cfg, 1, 2, 1), &[0x1B])
        .unwrap();

    // A session with drifted rate_max must be refused with a hint.
    let mut drifted = cfg.clone();
    drifted.params.set_rate_max(0.3).unwrap();
    let mut bridge = IndexBridge::new(drifted, Alphabet::Dna2).with_store(&store);
    let err = bridge.load_hf_cache(1, 2).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("rate_max"));
    assert!(message.contains("0.5"));
    assert!(message.contains("0.3"));
}

#[test]
fn free_after_parameter_drift_is_a_warned_noop() {
    let cfg = config(4, 0);
    let store = MemStorage::new();
    store
        .replace(&hf_meta_for(&cfg, 1, 2, 1), &[0x1B])
        .unwrap();
    let mut bridge = IndexBridge::new(cfg, Alphabet::Dna2).with_store(&store);
    assert_eq!(bridge.load_hf_cache(1, 2).unwrap(), 1);

    // Free against different parameters: rejected, zero entries freed.
    // (The bridge owns its params; a second bridge models the drifted
    // session sharing nothing but the hierarchy contract.)
    let freed = {
        let mut hierarchy = kmerdex::HfCacheHierarchy::new();
        let cfg2 = config(4, 0);
        hierarchy.load(&store, 1, 2, &cfg2).unwrap();
        let mut drifted = cfg2.params;
        drifted.set_rate_max(0.3).unwrap();
        hierarchy.free(1, 2, &drifted)
    };
    assert_eq!(freed, 0);
}

#[test]
fn exclusions_flow_into_the_match_decision() {
    let mut cfg = config(4, 0);
    cfg.params.set_min_score(3);
    cfg.params.set_min_shared_rate(0.0).unwrap();
    let store = MemStorage::new();
    // TTTT (0xFF) is high-frequency.
    store
        .replace(&hf_meta_for(&cfg, 1, 2, 1), &[0xFF])
        .unwrap();
    let mut bridge = IndexBridge::new(cfg, Alphabet::Dna2).with_store(&store);
    bridge.load_hf_cache(1, 2).unwrap();

    // Query with TTTT among its keys: threshold 3 - 1 = 2.
    let (keys, _) = bridge.extract_query("ACGTTTTT").unwrap();
    let mut presence = vec![false; keys.len()];
    presence[0] = true;
    assert_eq!(bridge.consistent(&presence, &keys), (false, false));
    presence[1] = true;
    assert_eq!(bridge.consistent(&presence, &keys), (true, false));
}

#[test]
fn score_cache_invalidates_when_hf_set_changes() {
    let mut cfg = config(4, 0);
    cfg.params.set_min_score(3);
    cfg.params.set_min_shared_rate(0.0).unwrap();
    let store = MemStorage::new();
    store
        .replace(&hf_meta_for(&cfg, 1, 2, 1), &[0xFF])
        .unwrap();
    let mut bridge = IndexBridge::new(cfg, Alphabet::Dna2).with_store(&store);
    let (keys, _) = bridge.extract_query("ACGTTTTT").unwrap();

    // No exclusions loaded: full threshold, and the value is cached.
    assert_eq!(bridge.min_score_for(&keys), 3);
    assert_eq!(bridge.min_score_for(&keys), 3);

    // Loading the set must invalidate the cached threshold.
    bridge.load_hf_cache(1, 2).unwrap();
    assert_eq!(bridge.min_score_for(&keys), 2);

    // Freeing it must invalidate again.
    bridge.free_hf_cache(1, 2);
    assert_eq!(bridge.min_score_for(&keys), 3);
}
