use crate::domain::calltree::CallTree;
use crate::domain::database::SymbolDatabase;

pub mod tree_exporter;

pub trait TreeExporter {
    fn export(&self, tree: &CallTree, db: &SymbolDatabase, path: &str) -> std::io::Result<()>;
}
