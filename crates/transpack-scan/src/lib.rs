//! Resource graph traversal for transpack.
//!
//! # Overview
//!
//! `transpack-scan` walks a graph of documents and the resources they refer
//! to, and produces an [`Inventory`] of every reachable local file:
//!
//! - **Cycle-safe** depth-first traversal; each resource is visited once
//! - **Fingerprints** local file content with a [`Fingerprinter`]
//! - **Relative paths** against the common ancestor of all local resources
//! - **Cooperative cancellation** through a [`ProgressChannel`]
//!
//! # Example
//!
//! ```rust,no_run
//! use transpack_scan::{DirectoryNode, ProgressChannel, ResourceGraphWalker};
//!
//! let root = DirectoryNode::new("/path/to/docs").unwrap();
//! let walker = ResourceGraphWalker::default();
//! let inventory = walker.walk(&root, &ProgressChannel::new()).unwrap();
//!
//! for entry in &inventory.entries {
//!     println!("{} {}", entry.content_hash(), entry.relative_path());
//! }
//! ```

mod graph;
mod resource;
mod visited;
mod walker;

pub use graph::{NodeId, ResourceGraph, ResourceGraphBuilder};
pub use resource::{file_url, DirectoryNode, LocalFileNode, Origin, RemoteNode, ResourceNode};
pub use visited::VisitedSet;
pub use walker::ResourceGraphWalker;

// Re-export core types for convenience
pub use transpack_core::{
    Canceled, ContentHash, Fingerprinter, Inventory, ProgressChannel, ResourceIdentity,
    WalkWarning, WarningKind,
};
pub use url::Url;
