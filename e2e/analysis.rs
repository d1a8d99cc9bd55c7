// End-to-end analysis flow: scan a corpus, persist the high-frequency
// set, load it through the cache hierarchy, and watch it reshape query
// scoring.

use kmerdex::alphabet::{encode, Alphabet};
use kmerdex::hf::{analyze_high_frequency, AnalyzeOptions};
use kmerdex::{CancelToken, Config, HfStore, IndexBridge, MemSource, MemStorage, Params};

/// A corpus where every row carries the "GGGG" run plus per-row content.
fn corpus() -> Vec<&'static str> {
    vec![
        "GGGGACGTACGTTTCA",
        "GGGGTTCAAACCGGTT",
        "GGGGCATTACGAACGT",
        "GGGGAACCTTGGCAAT",
        "GGGGACCATTGGACGT",
    ]
}

fn analyzed(config: &Config) -> MemStorage {
    let rows = corpus()
        .into_iter()
        .map(|t| encode(Alphabet::Dna2, t).unwrap())
        .collect();
    let source = MemSource::from_rows(rows, 2);
    let store = MemStorage::new();
    analyze_high_frequency(
        &source,
        &store,
        7,
        1,
        &config.params,
        &AnalyzeOptions::from_config(config),
        &CancelToken::new(),
    )
    .unwrap();
    store
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.params = Params::new(4, 2).unwrap();
    config.params.set_rate_max(0.8).unwrap();
    config.params.set_min_score(4);
    config.params.set_min_shared_rate(0.0).unwrap();
    config.analysis_workers = 2;
    config.hf_analysis_hashtable_size = 10_000;
    config
}

#[test]
fn ubiquitous_kmers_are_learned_and_persisted() {
    let config = base_config();
    let store = analyzed(&config);
    let meta = store.meta(7, 1).unwrap().unwrap();
    assert_eq!(meta.total_rows, 5);
    // GGGG (0xAA) is in all five rows; with rate_max = 0.8 it is the
    // only 4-mer above threshold.
    assert_eq!(meta.hf_count, 1);
    assert!(store.contains(7, 1, 0xAA << 2).unwrap());
    assert!(meta.duration_secs >= 0.0);
}

#[test]
fn loaded_exclusions_compensate_the_score_floor() {
    let config = base_config();
    let store = analyzed(&config);
    let mut bridge = IndexBridge::new(config, Alphabet::Dna2).with_store(&store);

    // Query containing one GGGG window: 9 keys, one excluded.
    let query = "GGGGACGTACGT";
    let (keys, _) = bridge.extract_query(query).unwrap();
    assert_eq!(bridge.min_score_for(&keys), 4);

    bridge.load_hf_cache(7, 1).unwrap();
    // The excluded key can never be shared: the floor drops by one.
    assert_eq!(bridge.min_score_for(&keys), 3);

    bridge.free_hf_cache(7, 1);
    assert_eq!(bridge.min_score_for(&keys), 4);
}

#[test]
fn preclusion_removes_learned_kmers_from_ingest_streams() {
    let mut config = base_config();
    config.params.set_preclude_hf(true);
    let store = analyzed(&config);
    let mut bridge = IndexBridge::new(config, Alphabet::Dna2).with_store(&store);
    bridge.load_hf_cache(7, 1).unwrap();

    let seq = encode(Alphabet::Dna2, "GGGGGACGT").unwrap();
    let keys = bridge.extract_values(&seq).unwrap();
    // Windows GGGG, GGGG·1, GGGA, GGAC, GACG, ACGT minus both GGGG ranks.
    let rendered: Vec<String> = keys
        .iter()
        .map(|k| kmerdex::kmer::format_key(k, 4, 2))
        .collect();
    assert_eq!(rendered, ["GGGA·0", "GGAC·0", "GACG·0", "ACGT·0"]);
}

#[test]
fn analysis_to_query_round_trip_with_shared_tier() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config();
    config.force_parallel_hf_cache = true;
    config.shared_cache_dir = dir.path().to_path_buf();
    let store = analyzed(&config);

    let mut bridge = IndexBridge::new(config, Alphabet::Dna2).with_store(&store);
    assert_eq!(bridge.load_hf_cache(7, 1).unwrap(), 1);
    let (keys, _) = bridge.extract_query("GGGGACGTACGT").unwrap();
    assert_eq!(bridge.min_score_for(&keys), 3);
}
