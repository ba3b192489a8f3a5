//! Call-tree structures.
//!
//! A tree is stored as an arena of nodes holding lookup keys into the
//! symbol database, not live pointers. Repeated calls to one declared
//! symbol collapse to a single node reused across the tree, so the
//! result is a DAG presented as a tree.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::domain::database::SymbolDatabase;
use crate::domain::symbol::{SymbolId, SymbolKey};

/// Index of a node within one tree.
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct CallTreeNode {
    /// Resolved declaration, or None for an unresolved external call.
    pub symbol: Option<SymbolId>,
    /// Display name: the declared spelling when resolved, the call-site
    /// spelling otherwise.
    pub name: String,
    /// Line of the call site that first produced this node. For the
    /// root this is the declaration line.
    pub call_line: u32,
    /// Identity key used for deduplication.
    pub key: SymbolKey,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct CallTree {
    pub nodes: Vec<CallTreeNode>,
    pub root: Option<NodeId>,
}

impl CallTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: CallTreeNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Attach `child` under `parent`, once. A body calling the same
    /// target twice still shows it as one child.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.nodes[parent].children.contains(&child) {
            self.nodes[parent].children.push(child);
        }
    }

    pub fn node(&self, id: NodeId) -> &CallTreeNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first walk from the root. Shared nodes are visited once;
    /// `f` receives (node, depth, first_visit). Cycles through shared
    /// nodes terminate because revisited nodes are not descended into.
    pub fn walk(&self, mut f: impl FnMut(NodeId, usize, bool)) {
        let mut seen = HashSet::new();
        if let Some(root) = self.root {
            self.walk_from(root, 0, &mut seen, &mut f);
        }
    }

    fn walk_from(
        &self,
        id: NodeId,
        depth: usize,
        seen: &mut HashSet<NodeId>,
        f: &mut impl FnMut(NodeId, usize, bool),
    ) {
        let first = seen.insert(id);
        f(id, depth, first);
        if !first {
            return;
        }
        for &child in &self.nodes[id].children {
            self.walk_from(child, depth + 1, seen, f);
        }
    }

    /// Maximum depth at which any node is first reached.
    pub fn max_depth(&self) -> usize {
        let mut max = 0;
        self.walk(|_, depth, first| {
            if first && depth > max {
                max = depth;
            }
        });
        max
    }
}

/// Terminal state of one build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Completed,
    Cancelled,
}

/// Result of one build: the (possibly partial) tree plus how it ended.
#[derive(Debug)]
pub struct BuildOutcome {
    pub tree: CallTree,
    pub status: BuildStatus,
}

impl BuildOutcome {
    pub fn empty() -> Self {
        Self {
            tree: CallTree::new(),
            status: BuildStatus::Completed,
        }
    }
}

/// Reverse dictionary answering "who calls this name": lowercased call
/// name to the symbols whose bodies reference it.
#[derive(Debug, Default)]
pub struct CalledByIndex {
    callers: HashMap<String, Vec<SymbolId>>,
}

impl CalledByIndex {
    pub fn build(db: &SymbolDatabase) -> Self {
        let mut callers: HashMap<String, Vec<SymbolId>> = HashMap::new();
        for (id, record) in db.iter() {
            for call in &record.calls {
                let entry = callers.entry(call.name.to_ascii_lowercase()).or_default();
                if !entry.contains(&id) {
                    entry.push(id);
                }
            }
        }
        Self { callers }
    }

    pub fn callers_of(&self, name: &str) -> &[SymbolId] {
        self.callers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, line: u32) -> CallTreeNode {
        CallTreeNode {
            symbol: None,
            name: name.to_string(),
            call_line: line,
            key: SymbolKey {
                line_start: line,
                name: name.to_string(),
                file: "t.f90".to_string(),
            },
            children: vec![],
        }
    }

    #[test]
    fn add_child_deduplicates() {
        let mut tree = CallTree::new();
        let root = tree.add_node(leaf("a", 1));
        let child = tree.add_node(leaf("b", 2));
        tree.root = Some(root);
        tree.add_child(root, child);
        tree.add_child(root, child);
        assert_eq!(tree.node(root).children.len(), 1);
    }

    #[test]
    fn walk_terminates_on_cycles() {
        let mut tree = CallTree::new();
        let a = tree.add_node(leaf("a", 1));
        let b = tree.add_node(leaf("b", 2));
        tree.root = Some(a);
        tree.add_child(a, b);
        // Cycle back to the root, as the builder produces for A->B->A.
        tree.add_child(b, a);

        let mut visits = 0;
        tree.walk(|_, _, _| visits += 1);
        // a, b, and one revisit of a.
        assert_eq!(visits, 3);
    }
}
