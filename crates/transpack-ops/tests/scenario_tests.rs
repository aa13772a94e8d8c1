use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use transpack_core::{Fingerprinter, ProgressChannel, ProgressEvent, ProgressSink};
use transpack_milestone::ChangeDetector;
use transpack_ops::{ArchiveBuilder, DEFAULT_STAGING_DIR};
use transpack_scan::{DirectoryNode, ResourceNode};

fn docs_tree(temp: &TempDir) -> std::path::PathBuf {
    let docs = temp.path().join("docs");
    fs::create_dir_all(docs.join("b")).unwrap();
    fs::write(docs.join("a.txt"), "hello").unwrap();
    fs::write(docs.join("b/c.txt"), "world").unwrap();
    docs
}

#[test]
fn test_milestone_change_pack_unpack() {
    let temp = TempDir::new().unwrap();
    let docs = docs_tree(&temp);
    let root = DirectoryNode::new(&docs)
        .unwrap()
        .with_exclusions([DEFAULT_STAGING_DIR]);
    let detector = ChangeDetector::default();
    let fp = Fingerprinter::default();

    let snapshot = detector
        .generate_milestone(&root, &ProgressChannel::new())
        .unwrap();
    let listed: Vec<(&str, String)> = snapshot
        .entries
        .iter()
        .map(|e| (e.relative_path(), e.content_hash().to_hex()))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("a.txt", fp.fingerprint_bytes(b"hello").to_hex()),
            ("b/c.txt", fp.fingerprint_bytes(b"world").to_hex()),
        ]
    );

    fs::write(docs.join("a.txt"), "hello!").unwrap();
    let changes = detector
        .collect_changes(&root, &ProgressChannel::new())
        .unwrap();
    assert_eq!(changes.relative_paths(), vec!["a.txt"]);
    assert_eq!(changes.entries[0].content_hash(), fp.fingerprint_bytes(b"hello!"));

    let archive = temp.path().join("package.zip");
    let builder = ArchiveBuilder::new();
    let source_dir = changes.base.clone().unwrap();
    let result = builder
        .pack(&source_dir, &changes.relative_paths(), &archive, &ProgressChannel::new())
        .unwrap();
    assert_eq!(result.packaged, 1);
    assert!(result.uncopyable.is_empty());

    let out = temp.path().join("translated");
    let files = builder
        .unpack(&archive, &out, &ProgressChannel::new())
        .unwrap();
    assert_eq!(files, vec!["a.txt"]);
    assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "hello!");
    assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
}

/// Cancels the shared token as soon as any progress arrives.
struct CancelOnProgress(ProgressChannel);

impl ProgressSink for CancelOnProgress {
    fn on_progress(&self, _event: &ProgressEvent) {
        self.0.cancel();
    }
}

#[test]
fn test_cancel_mid_pack_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let docs = docs_tree(&temp);
    let archive = temp.path().join("package.zip");

    let token_holder = ProgressChannel::new();
    let channel = token_holder
        .clone()
        .with_sink(Arc::new(CancelOnProgress(token_holder.clone())));

    let result = ArchiveBuilder::new().pack(&docs, &["a.txt", "b/c.txt"], &archive, &channel);

    assert!(result.is_err());
    assert!(!docs.join(DEFAULT_STAGING_DIR).exists());
    assert!(!archive.exists());
}

#[test]
fn test_cancel_mid_walk() {
    let temp = TempDir::new().unwrap();
    let docs = docs_tree(&temp);
    let root: Arc<dyn ResourceNode> = Arc::new(DirectoryNode::new(&docs).unwrap());

    let channel = ProgressChannel::new();
    channel.cancel();

    let result = ChangeDetector::default().generate_milestone(root.as_ref(), &channel);
    assert!(result.is_err());
    assert!(!temp.path().join("docs_translation_milestone.xml").exists());
}

#[test]
#[cfg(unix)]
fn test_milestone_ignores_looping_symlink() {
    let temp = TempDir::new().unwrap();
    let docs = docs_tree(&temp);
    std::os::unix::fs::symlink(&docs, docs.join("b/up")).unwrap();

    for follow in [false, true] {
        let root = DirectoryNode::new(&docs)
            .unwrap()
            .with_follow_symlinks(follow)
            .unwrap();
        let snapshot = ChangeDetector::default()
            .generate_milestone(&root, &ProgressChannel::new())
            .unwrap();
        let paths: Vec<&str> = snapshot.entries.iter().map(|e| e.relative_path()).collect();
        assert_eq!(paths, vec!["a.txt", "b/c.txt"]);
    }
}
