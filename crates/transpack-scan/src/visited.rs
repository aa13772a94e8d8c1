//! Visited-resource tracking for cycle and diamond detection.

use std::collections::HashSet;

use url::Url;

/// Tracks resource identities already reached during one walk.
///
/// A resource referenced from several places, or from inside a cycle, is
/// visited only the first time its URL is tracked.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<Url>,
}

impl VisitedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a URL. Returns `true` if this is the first time seeing it.
    pub fn track(&mut self, url: &Url) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.clone())
    }

    /// Check if a URL has been seen (without tracking).
    pub fn has_seen(&self, url: &Url) -> bool {
        self.seen.contains(url)
    }

    /// Number of distinct resources tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing has been tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
