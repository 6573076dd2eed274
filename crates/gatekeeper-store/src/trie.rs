//! In-memory prefix index mapping normalized URL keys to record locations.
//!
//! Keys are raw bytes walked one byte per tree level. Nodes live in a single
//! arena `Vec` and refer to children by index, so the whole structure is two
//! allocations deep at most and rebuilding it from a replay is a straight
//! sequence of inserts. Entries are never removed: a superseded key keeps its
//! node and simply gets a new [`Location`], and keys that die with their
//! segment linger until the next restart rebuilds the index from disk.

use gatekeeper_types::Location;
use smallvec::SmallVec;

/// One arena slot: the value terminating here (if any) plus outgoing edges
/// sorted by label byte.
#[derive(Debug, Default)]
struct Node {
    value: Option<Location>,
    children: SmallVec<[(u8, u32); 4]>,
}

/// Byte-wise prefix tree over normalized URL keys.
#[derive(Debug)]
pub struct PrefixIndex {
    nodes: Vec<Node>,
    keys: usize,
}

impl PrefixIndex {
    /// An empty index holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            keys: 0,
        }
    }

    /// Bind `key` to `value`, returning the location it replaces if the key
    /// was already present.
    pub fn insert(&mut self, key: &[u8], value: Location) -> Option<Location> {
        let mut node = 0_usize;
        for &byte in key {
            node = self.child_or_grow(node, byte);
        }
        let previous = self.nodes[node].value.replace(value);
        if previous.is_none() {
            self.keys += 1;
        }
        previous
    }

    /// Resolve `key` to its current location.
    #[must_use]
    pub fn lookup(&self, key: &[u8]) -> Option<Location> {
        let mut node = 0_usize;
        for &byte in key {
            let children = &self.nodes[node].children;
            match children.binary_search_by_key(&byte, |&(label, _)| label) {
                Ok(pos) => node = children[pos].1 as usize,
                Err(_) => return None,
            }
        }
        self.nodes[node].value
    }

    /// Number of distinct keys bound to a location.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }

    /// Total arena nodes, root included. Grows with the byte length of the
    /// key set and never shrinks; useful as a memory gauge.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Walk the edge labelled `byte` out of `parent`, materializing it if it
    /// does not exist yet.
    fn child_or_grow(&mut self, parent: usize, byte: u8) -> usize {
        match self.nodes[parent]
            .children
            .binary_search_by_key(&byte, |&(label, _)| label)
        {
            Ok(pos) => self.nodes[parent].children[pos].1 as usize,
            Err(pos) => {
                let id = u32::try_from(self.nodes.len()).expect("prefix index outgrew u32 node ids");
                self.nodes.push(Node::default());
                self.nodes[parent].children.insert(pos, (byte, id));
                id as usize
            }
        }
    }
}

impl Default for PrefixIndex {
    fn default() -> Self {
        Self::new()
    }
}
