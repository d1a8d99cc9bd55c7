// Integration tests for the query-path caches.

use kmerdex::query::cache::{hash_keys, hash_query, QueryKeyCache, SessionCaches};
use kmerdex::{Config, KeyBuf, KeyWidth};

fn keybuf(vals: &[u64]) -> KeyBuf {
    let mut b = KeyBuf::new(KeyWidth::U64);
    for &v in vals {
        b.push(v).unwrap();
    }
    b
}

#[test]
fn query_hash_depends_on_text_and_k() {
    assert_eq!(hash_query("ACGTACGT", 4), hash_query("ACGTACGT", 4));
    assert_ne!(hash_query("ACGTACGT", 4), hash_query("ACGTACGT", 5));
    assert_ne!(hash_query("ACGTACGT", 4), hash_query("ACGTACGA", 4));
}

#[test]
fn capacity_is_a_hard_bound() {
    let mut cache = QueryKeyCache::new(1000);
    for i in 0..1200u32 {
        let text = format!("ACGTACGT{i}");
        cache.insert(&text, 8, keybuf(&[i as u64]));
    }
    let stats = cache.stats();
    assert_eq!(stats.len, 1000);
    assert_eq!(stats.capacity, 1000);
    // The oldest 200 entries are gone, the newest 200 are present.
    assert!(cache.get("ACGTACGT0", 8).is_none());
    assert!(cache.get("ACGTACGT1199", 8).is_some());
}

#[test]
fn lru_order_follows_access_not_insertion() {
    let mut cache = QueryKeyCache::new(1000);
    for i in 0..1000u32 {
        cache.insert(&format!("Q{i}"), 8, keybuf(&[i as u64]));
    }
    // Touch the very first entry, then push one past capacity.
    assert!(cache.get("Q0", 8).is_some());
    cache.insert("FRESH", 8, keybuf(&[9999]));
    assert!(cache.get("Q0", 8).is_some(), "recently used must survive");
    assert!(cache.get("Q1", 8).is_none(), "oldest untouched must be evicted");
}

#[test]
fn key_stream_hash_matches_documented_polynomial() {
    // sum(k_i * 31^(n-i)) with wrapping arithmetic.
    let keys = keybuf(&[2, 3, 5]);
    assert_eq!(hash_keys(&keys), ((2 * 31) + 3) * 31 + 5);
    assert_eq!(hash_keys(&keybuf(&[])), 0);
}

#[test]
fn session_fence_uses_all_four_parameters() {
    let cfg = Config::default();
    for setting in ["k", "r", "rate_max", "nrow_max"] {
        let mut caches = SessionCaches::new(&cfg);
        caches.query_keys.insert("ACGTACGT", cfg.params.k(), keybuf(&[1]));
        caches.min_score.insert(7, 2);

        let mut drifted = cfg.clone();
        let value = match setting {
            "k" => "12",
            "r" => "4",
            "rate_max" => "0.25",
            _ => "9",
        };
        drifted.set(setting, value).unwrap();
        caches.revalidate(&drifted.params, 0);
        assert_eq!(caches.query_keys.stats().len, 0, "setting {setting}");
        assert_eq!(caches.min_score.stats().len, 0, "setting {setting}");
    }
}

#[test]
fn score_floor_change_flushes_score_cache_only() {
    // (k, r, rate_max, nrow_max) fence both caches; the scoring floors
    // only feed the cached scores, so a floor change drops those while
    // the extracted key streams stay valid.
    let cfg = Config::default();
    let mut caches = SessionCaches::new(&cfg);
    caches.query_keys.insert("ACGTACGT", cfg.params.k(), keybuf(&[1]));
    caches.min_score.insert(7, 2);
    let mut p = cfg.params;
    p.set_min_score(40);
    caches.revalidate(&p, 0);
    assert_eq!(caches.query_keys.stats().len, 1);
    assert_eq!(caches.min_score.stats().len, 0);
}
