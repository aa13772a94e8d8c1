use std::collections::HashSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;
use transpack_core::{
    ContentHash, Fingerprinter, ProgressChannel, ProgressEvent, ProgressUpdate, ResourceIdentity,
    Snapshot, TranspackConfig,
};

#[test]
fn test_fingerprinter_from_config() {
    let config = TranspackConfig::default();
    let fp = Fingerprinter::from_config(&config).unwrap();
    assert_eq!(fp.algorithm().name(), "md5");

    let config = TranspackConfig {
        digest_algorithm: "whirlpool".to_string(),
        ..TranspackConfig::default()
    };
    assert!(Fingerprinter::from_config(&config).is_err());
}

#[test]
fn test_identity_set_membership() {
    let fp = Fingerprinter::default();
    let old = Snapshot::new(
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        vec![
            ResourceIdentity::new(fp.fingerprint_bytes(b"hello"), "a.txt"),
            ResourceIdentity::new(fp.fingerprint_bytes(b"world"), "b/c.txt"),
        ],
    );
    let set = old.entry_set();

    // Same bytes at the same path is the same state.
    assert!(set.contains(&ResourceIdentity::new(fp.fingerprint_bytes(b"hello"), "a.txt")));
    // Same bytes at another path is a different state.
    assert!(!set.contains(&ResourceIdentity::new(fp.fingerprint_bytes(b"hello"), "b/a.txt")));
    // New bytes at the same path is a different state.
    assert!(!set.contains(&ResourceIdentity::new(fp.fingerprint_bytes(b"hello!"), "a.txt")));
}

#[test]
fn test_content_hash_round_trips_through_string() {
    let hash = Fingerprinter::default().fingerprint_bytes(b"content");
    let text: String = hash.into();
    let parsed: ContentHash = text.parse().unwrap();
    assert_eq!(parsed, hash);
    assert_eq!(parsed.to_string(), text);
}

#[test]
fn test_progress_counters_are_monotonic() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = ProgressChannel::new().with_sink(Arc::new(tx));

    for i in 1..=5 {
        channel.progress(ProgressEvent::counted(i, Some(5), format!("{i} done")));
    }
    channel.done();

    let mut last = 0;
    let mut seen = HashSet::new();
    while let Ok(update) = rx.try_recv() {
        match update {
            ProgressUpdate::Progress(event) => {
                let counter = event.counter.unwrap();
                assert!(counter > last);
                assert_eq!(event.total, Some(5));
                last = counter;
                seen.insert(counter);
            }
            ProgressUpdate::Done => assert_eq!(last, 5),
            ProgressUpdate::Failed(msg) => panic!("unexpected failure: {msg}"),
        }
    }
    assert_eq!(seen.len(), 5);
}
