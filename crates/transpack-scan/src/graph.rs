//! Arena-backed resource graph.
//!
//! Nodes live in one shared slice and refer to each other by index, so
//! reference cycles need no interior mutability and no `Arc` loops.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use url::Url;

use crate::resource::{file_url, Origin, ResourceNode};

/// Index of a node within a [`ResourceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
struct NodeData {
    url: Url,
    origin: Origin,
    references: Vec<usize>,
}

/// Incrementally builds a [`ResourceGraph`].
#[derive(Debug, Default)]
pub struct ResourceGraphBuilder {
    nodes: Vec<NodeData>,
}

impl ResourceGraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with an explicit URL and origin.
    pub fn add_node(&mut self, url: Url, origin: Origin) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            url,
            origin,
            references: Vec::new(),
        });
        id
    }

    /// Add a local file.
    pub fn add_local_file(&mut self, path: impl AsRef<Path>) -> io::Result<NodeId> {
        let url = file_url(path.as_ref())?;
        Ok(self.add_node(url, Origin::LocalFile))
    }

    /// Add a resource reached through a non-file scheme.
    pub fn add_remote(&mut self, url: Url) -> NodeId {
        self.add_node(url, Origin::Remote)
    }

    /// Record that `from` refers to `to`. References keep insertion order.
    pub fn add_reference(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(from.0) {
            node.references.push(to.0);
        }
        self
    }

    /// Freeze the graph.
    pub fn build(self) -> ResourceGraph {
        ResourceGraph {
            nodes: Arc::from(self.nodes),
        }
    }
}

/// An immutable resource graph whose nodes are handed out as [`ResourceNode`]s.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    nodes: Arc<[NodeData]>,
}

impl ResourceGraph {
    /// Create a new graph builder.
    pub fn builder() -> ResourceGraphBuilder {
        ResourceGraphBuilder::new()
    }

    /// Get a handle to a node.
    pub fn node(&self, id: NodeId) -> Option<Arc<dyn ResourceNode>> {
        (id.0 < self.nodes.len()).then(|| {
            Arc::new(GraphNode {
                nodes: Arc::clone(&self.nodes),
                index: id.0,
            }) as Arc<dyn ResourceNode>
        })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Handle to one node of a [`ResourceGraph`].
struct GraphNode {
    nodes: Arc<[NodeData]>,
    index: usize,
}

impl GraphNode {
    fn data(&self) -> &NodeData {
        &self.nodes[self.index]
    }
}

impl ResourceNode for GraphNode {
    fn identity_url(&self) -> &Url {
        &self.data().url
    }

    fn origin(&self) -> Origin {
        self.data().origin
    }

    fn children(&self) -> io::Result<Vec<Arc<dyn ResourceNode>>> {
        Ok(self
            .data()
            .references
            .iter()
            .filter(|&&index| index < self.nodes.len())
            .map(|&index| {
                Arc::new(GraphNode {
                    nodes: Arc::clone(&self.nodes),
                    index,
                }) as Arc<dyn ResourceNode>
            })
            .collect())
    }

    fn open_content(&self) -> io::Result<Box<dyn Read>> {
        let data = self.data();
        if data.origin != Origin::LocalFile {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} has no readable content", data.url),
            ));
        }
        let path = data.url.to_file_path().map_err(|()| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("Not a file URL: {}", data.url))
        })?;
        Ok(Box::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_is_representable() {
        let mut builder = ResourceGraph::builder();
        let a = builder.add_remote(Url::parse("https://example.com/a").unwrap());
        let b = builder.add_remote(Url::parse("https://example.com/b").unwrap());
        builder.add_reference(a, b).add_reference(b, a);
        let graph = builder.build();

        let node_a = graph.node(a).unwrap();
        let node_b = &node_a.children().unwrap()[0];
        let back = &node_b.children().unwrap()[0];
        assert_eq!(back.identity_url(), node_a.identity_url());
    }

    #[test]
    fn test_missing_node() {
        let graph = ResourceGraph::builder().build();
        assert!(graph.is_empty());
        assert!(graph.node(NodeId(0)).is_none());
    }

    #[test]
    fn test_local_file_content() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();

        let mut builder = ResourceGraph::builder();
        let id = builder.add_local_file(&path).unwrap();
        let graph = builder.build();

        let mut content = String::new();
        graph
            .node(id)
            .unwrap()
            .open_content()
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello");
    }
}
