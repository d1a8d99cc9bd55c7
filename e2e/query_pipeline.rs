// End-to-end query pipeline: ingest a small corpus through the bridge,
// run queries through extraction, the consistency predicate, and
// scoring, and check which rows match.

use kmerdex::alphabet::{encode, Alphabet};
use kmerdex::{shared_count, Config, IndexBridge, KeyBuf, Params};

/// Simulate the host's index probe: for each query key, is it present
/// in the row's key stream?
fn presence_bitmap(row_keys: &KeyBuf, query_keys: &KeyBuf) -> Vec<bool> {
    let row: Vec<u64> = row_keys.to_u64_vec();
    query_keys.iter().map(|q| row.contains(&q)).collect()
}

fn matching_rows(bridge: &mut IndexBridge<'_>, corpus: &[&str], query: &str) -> Vec<usize> {
    let (query_keys, _) = bridge.extract_query(query).unwrap();
    corpus
        .iter()
        .enumerate()
        .filter(|(_, text)| {
            let seq = encode(Alphabet::Dna2, text).unwrap();
            let row_keys = bridge.extract_values(&seq).unwrap();
            let bitmap = presence_bitmap(&row_keys, &query_keys);
            bridge.consistent(&bitmap, &query_keys).0
        })
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn near_duplicates_match_unrelated_rows_do_not() {
    let corpus = [
        "ACGTACGTGGTTCCAA",  // 0: the query itself
        "ACGTACGTGGTTCCAT",  // 1: one substitution at the tail
        "TTTTGGGGCCCCAAAA",  // 2: unrelated content
        "AACCGGTTACGTACGT",  // 3: shares the ACGTACGT half
    ];
    let mut config = Config::default();
    config.params = Params::new(4, 2).unwrap();
    config.params.set_min_score(1);
    config.params.set_min_shared_rate(0.5).unwrap();
    let mut bridge = IndexBridge::new(config, Alphabet::Dna2);

    let matched = matching_rows(&mut bridge, &corpus, "ACGTACGTGGTTCCAA");
    assert!(matched.contains(&0), "exact row must match");
    assert!(matched.contains(&1), "near-duplicate must match");
    assert!(!matched.contains(&2), "unrelated row must not match");
}

#[test]
fn raising_the_floor_prunes_weak_matches() {
    let corpus = [
        "ACGTACGTGGTTCCAA",
        "ACGTACGTTTTTTTTT", // shares only the left half
    ];
    let query = "ACGTACGTGGTTCCAA";

    let run = |min_shared_rate: f64| {
        let mut config = Config::default();
        config.params = Params::new(4, 2).unwrap();
        config.params.set_min_score(1);
        config.params.set_min_shared_rate(min_shared_rate).unwrap();
        let mut bridge = IndexBridge::new(config, Alphabet::Dna2);
        matching_rows(&mut bridge, &corpus, query)
    };

    let permissive = run(0.2);
    assert_eq!(permissive, vec![0, 1]);
    let strict = run(0.9);
    assert_eq!(strict, vec![0]);
}

#[test]
fn consistency_predicate_agrees_with_direct_scoring() {
    // The bitmap route (what the index container does) and the direct
    // shared-count route must agree on every candidate.
    let corpus = [
        "ACGTACGTGGTTCCAA",
        "ACGTACGTTTTTTTTT",
        "GGTTCCAAGGTTCCAA",
        "CCCCCCCCGGGGGGGG",
    ];
    let query = "ACGTACGTGGTTCCAA";
    let mut config = Config::default();
    config.params = Params::new(4, 2).unwrap();
    config.params.set_min_score(2);
    config.params.set_min_shared_rate(0.4).unwrap();
    let mut bridge = IndexBridge::new(config, Alphabet::Dna2);

    let (query_keys, _) = bridge.extract_query(query).unwrap();
    let threshold = bridge.min_score_for(&query_keys);
    for text in corpus {
        let seq = encode(Alphabet::Dna2, text).unwrap();
        let row_keys = bridge.extract_values(&seq).unwrap();
        let bitmap = presence_bitmap(&row_keys, &query_keys);
        let via_predicate = bridge.consistent(&bitmap, &query_keys).0;
        let via_scoring = shared_count(&row_keys, &query_keys) >= threshold;
        assert_eq!(via_predicate, via_scoring, "row {text}");
    }
}

#[test]
fn iupac_queries_travel_the_same_pipeline() {
    let corpus = ["ACGAACGAACGAACGA", "ACGCACGCACGCACGC", "TTTTTTTTTTTTTTTT"];
    let mut config = Config::default();
    config.params = Params::new(4, 2).unwrap();
    config.params.set_min_score(1);
    config.params.set_min_shared_rate(0.3).unwrap();
    let mut bridge = IndexBridge::new(config, Alphabet::Iupac4);

    // M = A|C: the query's windows cover both the ...A and ...C rows.
    let (query_keys, _) = bridge.extract_query("ACGMACGMACGM").unwrap();
    for (i, text) in corpus.iter().enumerate() {
        let seq = encode(Alphabet::Iupac4, text).unwrap();
        let row_keys = bridge.extract_values(&seq).unwrap();
        let bitmap = presence_bitmap(&row_keys, &query_keys);
        let matched = bridge.consistent(&bitmap, &query_keys).0;
        assert_eq!(matched, i < 2, "row {text}");
    }
}
