//! Milestone generation and change detection.

use std::path::PathBuf;

use chrono::Utc;
use transpack_core::{
    ChangeError, ChangeSet, FingerprintError, Fingerprinter, Inventory, ProgressChannel,
    ProgressEvent, ResourceIdentity, Snapshot, TranspackConfig,
};
use transpack_scan::{Origin, ResourceGraphWalker, ResourceNode};

use crate::store::SnapshotStore;

/// Compares the current state of a resource graph with its last milestone.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    walker: ResourceGraphWalker,
    store: SnapshotStore,
}

impl ChangeDetector {
    /// Create a detector from a walker and a store.
    pub fn new(walker: ResourceGraphWalker, store: SnapshotStore) -> Self {
        Self { walker, store }
    }

    /// Create a detector from configuration.
    pub fn from_config(config: &TranspackConfig) -> Result<Self, FingerprintError> {
        let fingerprinter = Fingerprinter::from_config(config)?;
        Ok(Self::new(
            ResourceGraphWalker::new(fingerprinter),
            SnapshotStore::from_config(config),
        ))
    }

    /// The store milestones are read from and written to.
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Filesystem location of the root; milestones are stored next to it.
    pub fn root_path(root: &dyn ResourceNode) -> Result<PathBuf, ChangeError> {
        root.local_path().ok_or_else(|| ChangeError::RootNotLocal {
            url: root.identity_url().to_string(),
        })
    }

    /// Fingerprint the root and everything reachable from it.
    ///
    /// The root entry comes first when the root is a local file. Failing to
    /// fingerprint the root is fatal; failures below it are warnings.
    pub fn current_inventory(
        &self,
        root: &dyn ResourceNode,
        channel: &ProgressChannel,
    ) -> Result<Inventory, ChangeError> {
        let root_hash = match root.origin() {
            Origin::LocalFile => {
                let reader = root.open_content().map_err(FingerprintError::from)?;
                Some(self.walker.fingerprinter().fingerprint_reader(reader)?)
            }
            _ => None,
        };

        let mut inventory = self.walker.walk(root, channel)?;

        if let (Some(hash), Some(path)) = (root_hash, root.local_path()) {
            let mut relative =
                ResourceGraphWalker::inventory_path(&path, inventory.base.as_deref());
            if let Some(fragment) = root.identity_url().fragment() {
                relative.push('#');
                relative.push_str(fragment);
            }
            inventory
                .entries
                .insert(0, ResourceIdentity::new(hash, relative));
        }

        Ok(inventory)
    }

    /// Capture the current inventory and store it as the root's milestone.
    pub fn generate_milestone(
        &self,
        root: &dyn ResourceNode,
        channel: &ProgressChannel,
    ) -> Result<Snapshot, ChangeError> {
        let root_path = Self::root_path(root)?;
        let inventory = self.current_inventory(root, channel)?;

        channel.check()?;

        let snapshot = Snapshot::new(Utc::now(), inventory.entries);
        let path = self.store.store(&snapshot, &root_path)?;

        channel.progress(ProgressEvent::message(format!(
            "Milestone created: {}",
            path.display()
        )));
        Ok(snapshot)
    }

    /// Resources whose identity is missing from the root's last milestone.
    ///
    /// A resource counts as changed when no milestone entry has both its hash
    /// and its relative path. Resources present only in the milestone are
    /// not reported.
    pub fn collect_changes(
        &self,
        root: &dyn ResourceNode,
        channel: &ProgressChannel,
    ) -> Result<ChangeSet, ChangeError> {
        let root_path = Self::root_path(root)?;
        let previous = self.store.load(&root_path)?;
        let inventory = self.current_inventory(root, channel)?;

        let known = previous.entry_set();
        let total = inventory.len();
        let mut entries = Vec::new();

        for (index, entry) in inventory.entries.iter().enumerate() {
            if !known.contains(entry) {
                entries.push(entry.clone());
            }

            channel.check()?;
            channel.progress(ProgressEvent::counted(
                index + 1,
                Some(total),
                entry.relative_path(),
            ));
        }

        tracing::debug!(
            examined = total,
            changed = entries.len(),
            since = %previous.created_at,
            "collected changes"
        );

        Ok(ChangeSet {
            base: inventory.base,
            entries,
            examined: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use transpack_core::{ProgressUpdate, SnapshotError};
    use transpack_scan::{DirectoryNode, LocalFileNode, RemoteNode, Url};

    fn map_with_topics(temp: &TempDir) -> LocalFileNode {
        let base = temp.path();
        fs::write(base.join("guide.ditamap"), "<map/>").unwrap();
        fs::create_dir(base.join("topics")).unwrap();
        fs::write(base.join("topics/a.dita"), "a").unwrap();
        fs::write(base.join("topics/b.dita"), "b").unwrap();

        let a: Arc<dyn ResourceNode> =
            Arc::new(LocalFileNode::new(base.join("topics/a.dita")).unwrap());
        let b: Arc<dyn ResourceNode> =
            Arc::new(LocalFileNode::new(base.join("topics/b.dita")).unwrap());
        LocalFileNode::new(base.join("guide.ditamap"))
            .unwrap()
            .with_references(vec![a, b])
    }

    #[test]
    fn test_root_entry_comes_first() {
        let temp = TempDir::new().unwrap();
        let root = map_with_topics(&temp);

        let inventory = ChangeDetector::default()
            .current_inventory(&root, &ProgressChannel::new())
            .unwrap();

        let paths: Vec<&str> = inventory.entries.iter().map(|e| e.relative_path()).collect();
        assert_eq!(paths, vec!["guide.ditamap", "topics/a.dita", "topics/b.dita"]);
    }

    #[test]
    fn test_unreadable_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let root = LocalFileNode::new(temp.path().join("missing.ditamap")).unwrap();

        let err = ChangeDetector::default()
            .current_inventory(&root, &ProgressChannel::new())
            .unwrap_err();
        assert!(matches!(err, ChangeError::Fingerprint(_)));
    }

    #[test]
    fn test_remote_root_is_rejected() {
        let root = RemoteNode::new(Url::parse("https://example.com/guide.ditamap").unwrap());
        let detector = ChangeDetector::default();

        let err = detector
            .generate_milestone(&root, &ProgressChannel::new())
            .unwrap_err();
        assert!(matches!(err, ChangeError::RootNotLocal { .. }));

        let err = detector
            .collect_changes(&root, &ProgressChannel::new())
            .unwrap_err();
        assert!(matches!(err, ChangeError::RootNotLocal { .. }));
    }

    #[test]
    fn test_no_milestone_yet() {
        let temp = TempDir::new().unwrap();
        let root = map_with_topics(&temp);

        let err = ChangeDetector::default()
            .collect_changes(&root, &ProgressChannel::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ChangeError::Snapshot(SnapshotError::NoSnapshot { .. })
        ));
    }

    #[test]
    fn test_generate_emits_one_message() {
        let temp = TempDir::new().unwrap();
        let root = map_with_topics(&temp);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = ProgressChannel::new().with_sink(Arc::new(tx));

        let snapshot = ChangeDetector::default()
            .generate_milestone(&root, &channel)
            .unwrap();
        assert_eq!(snapshot.len(), 3);

        match rx.try_recv().unwrap() {
            ProgressUpdate::Progress(event) => {
                assert_eq!(event.counter, None);
                assert_eq!(event.total, None);
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unchanged_tree_has_no_changes() {
        let temp = TempDir::new().unwrap();
        let root = map_with_topics(&temp);
        let detector = ChangeDetector::default();

        detector.generate_milestone(&root, &ProgressChannel::new()).unwrap();
        let changes = detector
            .collect_changes(&root, &ProgressChannel::new())
            .unwrap();

        assert!(changes.is_empty());
        assert_eq!(changes.examined, 3);
    }

    #[test]
    fn test_collect_progress_counts_every_entry() {
        let temp = TempDir::new().unwrap();
        let root = map_with_topics(&temp);
        let detector = ChangeDetector::default();
        detector.generate_milestone(&root, &ProgressChannel::new()).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = ProgressChannel::new().with_sink(Arc::new(tx));
        detector.collect_changes(&root, &channel).unwrap();

        let mut counters = Vec::new();
        while let Ok(ProgressUpdate::Progress(event)) = rx.try_recv() {
            assert_eq!(event.total, Some(3));
            counters.push(event.counter.unwrap());
        }
        assert_eq!(counters, vec![1, 2, 3]);
    }

    #[test]
    fn test_directory_root_milestone_is_sibling() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir(&docs).unwrap();
        fs::write(docs.join("a.txt"), "hello").unwrap();

        let root = DirectoryNode::new(&docs).unwrap();
        let detector = ChangeDetector::default();
        detector.generate_milestone(&root, &ProgressChannel::new()).unwrap();

        assert!(temp.path().join("docs_translation_milestone.xml").is_file());
        let changes = detector
            .collect_changes(&root, &ProgressChannel::new())
            .unwrap();
        assert!(changes.is_empty());
        assert_eq!(changes.base, Some(std::path::absolute(&docs).unwrap()));
    }

    #[test]
    fn test_canceled_generation_stores_nothing() {
        let temp = TempDir::new().unwrap();
        let root = map_with_topics(&temp);
        let channel = ProgressChannel::new();
        channel.cancel();

        let err = ChangeDetector::default()
            .generate_milestone(&root, &channel)
            .unwrap_err();
        assert!(matches!(err, ChangeError::Canceled));
        assert!(!temp.path().join("guide_translation_milestone.xml").exists());
    }
}
