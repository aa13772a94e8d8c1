//! Milestones and change detection for transpack.
//!
//! A milestone records the content hash and relative path of every local
//! resource reachable from a root document. Comparing a fresh walk against
//! it yields the resources that were added or modified since.
//!
//! ```rust,no_run
//! use transpack_milestone::ChangeDetector;
//! use transpack_scan::{LocalFileNode, ProgressChannel};
//!
//! let root = LocalFileNode::new("/docs/guide.ditamap").unwrap();
//! let detector = ChangeDetector::default();
//!
//! detector.generate_milestone(&root, &ProgressChannel::new()).unwrap();
//! // ... edit some topics ...
//! let changes = detector.collect_changes(&root, &ProgressChannel::new()).unwrap();
//! println!("{} changed", changes.len());
//! ```

mod detector;
mod store;

pub use detector::ChangeDetector;
pub use store::SnapshotStore;

pub use transpack_core::{ChangeError, ChangeSet, Snapshot, SnapshotError};
