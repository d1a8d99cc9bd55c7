// Integration tests for the shared-memory segment guard: lifecycle,
// reference counting, and reader/writer visibility.

use kmerdex::hf::HfSharedCache;
use kmerdex::hf::HfCacheKey;
use kmerdex::Params;

fn key(parent: u64) -> HfCacheKey {
    HfCacheKey::new(parent, 3, &Params::default())
}

#[test]
fn writer_populates_readers_probe() {
    let dir = tempfile::tempdir().unwrap();
    let k = key(1);
    let writer = HfSharedCache::create(dir.path(), &k, 1_000).unwrap();
    for v in (0..1_000u64).map(|v| v * 7) {
        writer.insert(v).unwrap();
    }
    writer.mark_ready();

    let reader = HfSharedCache::attach(dir.path(), &k).unwrap().unwrap();
    assert_eq!(reader.len(), 1_000);
    for v in (0..1_000u64).map(|v| v * 7) {
        assert!(reader.contains(v));
    }
    assert!(!reader.contains(3));
    assert!(!reader.contains(6_999 + 7));
}

#[test]
fn stored_cache_key_round_trips_through_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = Params::new(11, 5).unwrap();
    params.set_rate_max(0.125).unwrap();
    params.set_nrow_max(77);
    let k = HfCacheKey::new(0xDEAD, 0xBEEF as u32, &params);
    let writer = HfSharedCache::create(dir.path(), &k, 10).unwrap();
    assert_eq!(writer.stored_cache_key(), k);
}

#[test]
fn refcount_controls_unlink() {
    let dir = tempfile::tempdir().unwrap();
    let k = key(2);
    let path = HfSharedCache::segment_path(dir.path(), &k);

    let writer = HfSharedCache::create(dir.path(), &k, 10).unwrap();
    writer.insert(42).unwrap();
    writer.mark_ready();
    let r1 = HfSharedCache::attach(dir.path(), &k).unwrap().unwrap();
    let r2 = HfSharedCache::attach(dir.path(), &k).unwrap().unwrap();

    drop(writer);
    assert!(path.exists());
    drop(r1);
    assert!(path.exists());
    drop(r2);
    assert!(!path.exists());
}

#[test]
fn explicit_detach_then_drop_is_safe() {
    let dir = tempfile::tempdir().unwrap();
    let k = key(3);
    let mut writer = HfSharedCache::create(dir.path(), &k, 10).unwrap();
    writer.mark_ready();
    writer.detach();
    writer.detach();
    // Drop after explicit detach must not decrement again or unlink
    // someone else's fresh segment.
    let replacement = HfSharedCache::create(dir.path(), &k, 10).unwrap();
    replacement.mark_ready();
    drop(writer);
    let path = HfSharedCache::segment_path(dir.path(), &k);
    assert!(path.exists(), "replacement segment must survive");
}

#[test]
fn segments_are_separated_by_parent_and_field() {
    let dir = tempfile::tempdir().unwrap();
    let a = key(10);
    let b = key(11);
    let wa = HfSharedCache::create(dir.path(), &a, 10).unwrap();
    wa.insert(1).unwrap();
    wa.mark_ready();
    let wb = HfSharedCache::create(dir.path(), &b, 10).unwrap();
    wb.insert(2).unwrap();
    wb.mark_ready();

    let ra = HfSharedCache::attach(dir.path(), &a).unwrap().unwrap();
    assert!(ra.contains(1));
    assert!(!ra.contains(2));
}
