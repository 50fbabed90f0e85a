//! Arena-backed character trie
//!
//! Nodes live in a `Vec` and are addressed by [`NodeId`]. An uncompressed
//! trie has one character per edge; [`Trie::compress`] merges single-child
//! chains into multi-character edges and [`Trie::expand`] splits them back
//! one level at a time. Scanning walks either form through a [`Cursor`].

use std::collections::BTreeMap;

use gazette_core::{GazetteError, Result, RowId};
use serde::Serialize;

/// Index of a node in a [`Trie`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

/// Outgoing edge; `label` is never empty and starts with the key it is stored under
#[derive(Debug, Clone)]
struct Edge {
    label: String,
    target: NodeId,
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    edges: BTreeMap<char, Edge>,
    /// Rows whose synonym ends here
    entity: Vec<RowId>,
    /// Terminal kept in place but never reported
    ignore: bool,
}

impl TrieNode {
    fn is_terminal(&self) -> bool {
        !self.entity.is_empty()
    }
}

/// Character trie over synonyms
#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<TrieNode>,
    compressed: bool,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    /// Empty uncompressed trie
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            compressed: false,
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// True when no synonym is reachable from the root
    pub fn is_empty(&self) -> bool {
        let root = &self.nodes[ROOT.0];
        root.edges.is_empty() && !root.is_terminal()
    }

    /// Number of nodes reachable from the root
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend(self.nodes[id.0].edges.values().map(|e| e.target));
        }
        count
    }

    /// Rows stored at `node`
    pub fn rows(&self, node: NodeId) -> &[RowId] {
        &self.nodes[node.0].entity
    }

    fn alloc(&mut self) -> NodeId {
        self.nodes.push(TrieNode::default());
        NodeId(self.nodes.len() - 1)
    }

    fn require_uncompressed(&self, operation: &str) -> Result<()> {
        if self.compressed {
            return Err(GazetteError::Invariant(format!(
                "{operation} needs an uncompressed trie"
            )));
        }
        Ok(())
    }

    /// Add `row` at the end of the path spelling `label`, creating nodes as needed
    pub fn insert(&mut self, label: &str, row: RowId) -> Result<NodeId> {
        self.require_uncompressed("insert")?;
        if label.is_empty() {
            return Err(GazetteError::Invariant("cannot insert an empty label".to_string()));
        }

        let mut node = ROOT;
        for c in label.chars() {
            node = match self.nodes[node.0].edges.get(&c) {
                Some(edge) => edge.target,
                None => {
                    let child = self.alloc();
                    self.nodes[node.0].edges.insert(
                        c,
                        Edge {
                            label: c.to_string(),
                            target: child,
                        },
                    );
                    child
                }
            };
        }

        let entity = &mut self.nodes[node.0].entity;
        if !entity.contains(&row) {
            entity.push(row);
        }
        Ok(node)
    }

    /// Remove the terminal for `label` and prune edges left without content.
    ///
    /// Returns `false` when `label` is not a terminal. Pruning walks back
    /// toward the root and stops at the first node that still has another
    /// child or a terminal of its own.
    pub fn remove(&mut self, label: &str) -> Result<bool> {
        self.require_uncompressed("remove")?;

        let mut path: Vec<(NodeId, char)> = Vec::with_capacity(label.len());
        let mut node = ROOT;
        for c in label.chars() {
            match self.nodes[node.0].edges.get(&c) {
                Some(edge) => {
                    path.push((node, c));
                    node = edge.target;
                }
                None => return Ok(false),
            }
        }
        if !self.nodes[node.0].is_terminal() {
            return Ok(false);
        }

        let terminal = &mut self.nodes[node.0];
        terminal.entity.clear();
        terminal.ignore = false;

        let mut child = node;
        while let Some((parent, c)) = path.pop() {
            let current = &self.nodes[child.0];
            if !current.edges.is_empty() || current.is_terminal() {
                break;
            }
            self.nodes[parent.0].edges.remove(&c);
            child = parent;
        }
        Ok(true)
    }

    /// Mark the terminal for `label` as ignored. Returns `false` if absent.
    pub fn suppress(&mut self, label: &str) -> bool {
        match self.lookup(label) {
            Some(node) if self.nodes[node.0].is_terminal() => {
                self.nodes[node.0].ignore = true;
                true
            }
            _ => false,
        }
    }

    /// Node reached by spelling `label` exactly, in either form
    pub fn lookup(&self, label: &str) -> Option<NodeId> {
        let mut cursor = self.cursor();
        for c in label.chars() {
            cursor = self.advance(cursor, c)?;
        }
        cursor.node()
    }

    /// Radix-compressed copy.
    ///
    /// Every branch keeps its first character as a one-character edge; the
    /// rest of a single-child chain collapses into one edge below it. A chain
    /// never continues through a terminal.
    pub fn compress(&self) -> Trie {
        let mut packed = Trie {
            nodes: vec![self.nodes[ROOT.0].copy_terminal()],
            compressed: true,
        };

        let mut stack = vec![(ROOT, ROOT)];
        while let Some((source, target)) = stack.pop() {
            for (&key, edge) in &self.nodes[source.0].edges {
                let mut rest = edge.label[key.len_utf8()..].to_string();
                let mut tail = edge.target;
                loop {
                    let node = &self.nodes[tail.0];
                    if node.is_terminal() || node.edges.len() != 1 {
                        break;
                    }
                    if let Some(next) = node.edges.values().next() {
                        rest.push_str(&next.label);
                        tail = next.target;
                    }
                }

                let copy = packed.alloc();
                packed.nodes[copy.0] = self.nodes[tail.0].copy_terminal();
                let head = if rest.is_empty() {
                    copy
                } else {
                    let middle = packed.alloc();
                    packed.link(middle, rest, copy);
                    middle
                };
                packed.link(target, key.to_string(), head);
                stack.push((tail, copy));
            }
        }
        packed
    }

    fn link(&mut self, from: NodeId, label: String, to: NodeId) {
        if let Some(key) = label.chars().next() {
            self.nodes[from.0]
                .edges
                .insert(key, Edge { label, target: to });
        }
    }

    /// Split the single multi-character edge of `node` after its first character.
    ///
    /// `{"abc": subtree}` becomes `{"a": {"bc": subtree}}`. Returns `false`
    /// when `node` has no such edge.
    pub fn expand(&mut self, node: NodeId) -> bool {
        let current = &self.nodes[node.0];
        if current.is_terminal() || current.edges.len() != 1 {
            return false;
        }
        let Some((&key, edge)) = current.edges.iter().next() else {
            return false;
        };
        if edge.label.chars().count() < 2 {
            return false;
        }

        let remainder = edge.label[key.len_utf8()..].to_string();
        let target = edge.target;
        let middle = self.alloc();
        self.link(middle, remainder, target);
        self.nodes[node.0].edges.insert(
            key,
            Edge {
                label: key.to_string(),
                target: middle,
            },
        );
        true
    }

    /// Expand every compressed edge until only one-character edges remain
    pub fn expand_all(&mut self) {
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            while self.expand(node) {}
            stack.extend(self.nodes[node.0].edges.values().map(|e| e.target));
        }
        self.compressed = false;
    }

    /// Cursor positioned at the root
    pub fn cursor(&self) -> Cursor {
        Cursor {
            node: ROOT,
            offset: None,
        }
    }

    /// Follow `c` from `cursor`, stepping one character into a compressed
    /// edge when needed. `None` when the path does not continue with `c`.
    pub fn advance(&self, cursor: Cursor, c: char) -> Option<Cursor> {
        let node = &self.nodes[cursor.node.0];
        let (key, consumed) = match cursor.offset {
            Some((key, consumed)) => (key, consumed),
            None => (c, 0),
        };
        let edge = node.edges.get(&key)?;
        if edge.label[consumed..].chars().next()? != c {
            return None;
        }

        let consumed = consumed + c.len_utf8();
        Some(if consumed == edge.label.len() {
            Cursor {
                node: edge.target,
                offset: None,
            }
        } else {
            Cursor {
                node: cursor.node,
                offset: Some((key, consumed)),
            }
        })
    }

    /// Rows of a reportable terminal at `cursor`
    pub fn terminal(&self, cursor: Cursor) -> Option<(NodeId, &[RowId])> {
        let id = cursor.node()?;
        let node = &self.nodes[id.0];
        if node.is_terminal() && !node.ignore {
            Some((id, &node.entity))
        } else {
            None
        }
    }

    /// Owned nested view of the reachable structure
    pub fn snapshot(&self) -> TrieSnapshot {
        self.snapshot_from(ROOT)
    }

    fn snapshot_from(&self, id: NodeId) -> TrieSnapshot {
        let node = &self.nodes[id.0];
        TrieSnapshot {
            children: node
                .edges
                .values()
                .map(|e| (e.label.clone(), self.snapshot_from(e.target)))
                .collect(),
            entity: node.entity.clone(),
            ignore: node.ignore,
        }
    }
}

impl TrieNode {
    fn copy_terminal(&self) -> TrieNode {
        TrieNode {
            edges: BTreeMap::new(),
            entity: self.entity.clone(),
            ignore: self.ignore,
        }
    }
}

/// Position in a trie: a node, or part way along one of its edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    node: NodeId,
    /// Edge key and bytes of its label already consumed
    offset: Option<(char, usize)>,
}

impl Cursor {
    /// Node the cursor rests on, if not inside an edge
    pub fn node(&self) -> Option<NodeId> {
        match self.offset {
            None => Some(self.node),
            Some(_) => None,
        }
    }
}

/// Structural view of a trie, independent of arena layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrieSnapshot {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, TrieSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entity: Vec<RowId>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ignore: bool,
}
