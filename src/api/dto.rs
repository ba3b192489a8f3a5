use serde::{Deserialize, Serialize};

use crate::domain::calltree::{BuildOutcome, BuildStatus};
use crate::domain::database::SymbolDatabase;

#[derive(Debug, Serialize, Deserialize)]
pub struct TreeDto {
    pub status: String,
    pub root: Option<usize>,
    pub nodes: Vec<TreeNodeDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TreeNodeDto {
    pub name: String,
    pub resolved: bool,
    pub file: Option<String>,
    pub line: u32,
    pub call_line: u32,
    pub children: Vec<usize>,
}

impl TreeDto {
    pub fn from_outcome(outcome: &BuildOutcome, db: &SymbolDatabase) -> Self {
        let status = match outcome.status {
            BuildStatus::Completed => "completed",
            BuildStatus::Cancelled => "cancelled",
        };

        let nodes = outcome
            .tree
            .nodes
            .iter()
            .map(|node| {
                let record = node.symbol.and_then(|s| db.get(s));
                TreeNodeDto {
                    name: node.name.clone(),
                    resolved: record.is_some(),
                    file: record.map(|r| r.file.clone()),
                    line: record.map(|r| r.line_start).unwrap_or(node.call_line),
                    call_line: node.call_line,
                    children: node.children.clone(),
                }
            })
            .collect();

        TreeDto {
            status: status.to_string(),
            root: outcome.tree.root,
            nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calltree::{CallTree, CallTreeNode};
    use crate::domain::symbol::SymbolKey;

    #[test]
    fn cancelled_status_is_reported() {
        let mut tree = CallTree::new();
        let root = tree.add_node(CallTreeNode {
            symbol: None,
            name: "solve".to_string(),
            call_line: 3,
            key: SymbolKey {
                line_start: 3,
                name: "solve".to_string(),
                file: "s.f90".to_string(),
            },
            children: vec![],
        });
        tree.root = Some(root);

        let outcome = BuildOutcome {
            tree,
            status: BuildStatus::Cancelled,
        };
        let dto = TreeDto::from_outcome(&outcome, &SymbolDatabase::new());
        assert_eq!(dto.status, "cancelled");
        assert_eq!(dto.root, Some(0));
        assert_eq!(dto.nodes.len(), 1);
        assert!(!dto.nodes[0].resolved);
    }
}
