//! Call-tree exporters.
//!
//! Render a built tree for the presentation side: an indented text
//! listing and a Graphviz DOT digraph.

use std::io::Result;

use crate::domain::calltree::CallTree;
use crate::domain::database::SymbolDatabase;
use crate::ports::TreeExporter;

pub struct TextTreeExporter;

impl TextTreeExporter {
    pub fn to_text(tree: &CallTree, db: &SymbolDatabase) -> String {
        let mut out = String::new();
        tree.walk(|id, depth, first| {
            let node = tree.node(id);
            let indent = "  ".repeat(depth);
            let location = node
                .symbol
                .and_then(|s| db.get(s))
                .map(|rec| format!("  [{}:{}]", rec.file, rec.line_start))
                .unwrap_or_else(|| "  [external]".to_string());
            // Shared nodes are listed again but not re-expanded.
            let marker = if first { "" } else { " ..." };
            out.push_str(&format!("{}{}{}{}\n", indent, node.name, location, marker));
        });
        out
    }
}

impl TreeExporter for TextTreeExporter {
    fn export(&self, tree: &CallTree, db: &SymbolDatabase, path: &str) -> Result<()> {
        std::fs::write(path, Self::to_text(tree, db))
    }
}

pub struct DotTreeExporter;

impl DotTreeExporter {
    pub fn to_dot(tree: &CallTree, db: &SymbolDatabase) -> String {
        let mut lines = Vec::new();
        lines.push("digraph CallTree {".to_string());
        lines.push("    rankdir=LR;".to_string());
        lines.push("    node [fontname=\"Helvetica\", fontsize=12, shape=box];".to_string());
        lines.push(String::new());

        for (id, node) in tree.nodes.iter().enumerate() {
            let resolved = node.symbol.is_some();
            let label = match node.symbol.and_then(|s| db.get(s)) {
                Some(rec) => format!("{}\\n{}:{}", node.name, rec.file, rec.line_start),
                None => node.name.clone(),
            };
            let style = if resolved { "filled" } else { "filled,dashed" };
            let color = if resolved { "#89b4fa" } else { "#6c7086" };
            lines.push(format!(
                "    n{} [label=\"{}\", style=\"{}\", fillcolor=\"{}\"];",
                id,
                Self::escape_label(&label),
                style,
                color
            ));
        }

        lines.push(String::new());
        for (id, node) in tree.nodes.iter().enumerate() {
            for &child in &node.children {
                lines.push(format!("    n{} -> n{};", id, child));
            }
        }

        lines.push("}".to_string());
        lines.join("\n")
    }

    fn escape_label(label: &str) -> String {
        label.replace('"', "\\\"")
    }
}

impl TreeExporter for DotTreeExporter {
    fn export(&self, tree: &CallTree, db: &SymbolDatabase, path: &str) -> Result<()> {
        std::fs::write(path, Self::to_dot(tree, db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calltree::CallTreeNode;
    use crate::domain::symbol::SymbolKey;

    fn sample_tree() -> CallTree {
        let mut tree = CallTree::new();
        let root = tree.add_node(CallTreeNode {
            symbol: None,
            name: "driver".to_string(),
            call_line: 1,
            key: SymbolKey {
                line_start: 1,
                name: "driver".to_string(),
                file: "d.f90".to_string(),
            },
            children: vec![],
        });
        let child = tree.add_node(CallTreeNode {
            symbol: None,
            name: "dgemm".to_string(),
            call_line: 4,
            key: SymbolKey {
                line_start: 4,
                name: "dgemm".to_string(),
                file: "d.f90".to_string(),
            },
            children: vec![],
        });
        tree.root = Some(root);
        tree.add_child(root, child);
        tree
    }

    #[test]
    fn text_listing_is_indented() {
        let db = SymbolDatabase::new();
        let text = TextTreeExporter::to_text(&sample_tree(), &db);
        assert!(text.contains("driver"));
        assert!(text.contains("  dgemm"));
        assert!(text.contains("[external]"));
    }

    #[test]
    fn dot_output_has_nodes_and_edges() {
        let db = SymbolDatabase::new();
        let dot = DotTreeExporter::to_dot(&sample_tree(), &db);
        assert!(dot.contains("digraph CallTree"));
        assert!(dot.contains("n0 -> n1"));
        assert!(dot.contains("dgemm"));
    }
}
