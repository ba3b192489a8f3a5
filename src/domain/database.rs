//! Symbol database view.
//!
//! An arena of symbol records with concurrent name-lookup maps. The
//! database is populated by the upstream parser (through the loader)
//! and is read-only during a call-tree build.

use dashmap::DashMap;
use rayon::prelude::*;

use crate::domain::symbol::{SymbolId, SymbolKind, SymbolRecord};

#[derive(Debug)]
pub struct SymbolDatabase {
    symbols: Vec<SymbolRecord>,
    // Key: lowercased symbol name. DashMap so shards can be indexed in
    // parallel after a load.
    name_lookup: DashMap<String, Vec<SymbolId>>,
}

impl Default for SymbolDatabase {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            name_lookup: DashMap::new(),
        }
    }
}

impl SymbolDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a database from a complete set of records. Parent/child
    /// indices in the records must already be arena-consistent.
    pub fn from_records(symbols: Vec<SymbolRecord>) -> Self {
        let db = Self {
            symbols,
            name_lookup: DashMap::new(),
        };
        db.symbols.par_iter().enumerate().for_each(|(id, rec)| {
            db.name_lookup
                .entry(rec.name.to_ascii_lowercase())
                .or_default()
                .push(id);
        });
        // Parallel insertion order is nondeterministic; declaration order
        // decides ambiguity, so restore it.
        for mut entry in db.name_lookup.iter_mut() {
            entry.value_mut().sort_unstable();
        }
        db
    }

    /// Append one record, returning its id.
    pub fn push(&mut self, record: SymbolRecord) -> SymbolId {
        let id = self.symbols.len();
        self.name_lookup
            .entry(record.name.to_ascii_lowercase())
            .or_default()
            .push(id);
        self.symbols.push(record);
        id
    }

    /// Append a shard whose parent/child indices are shard-local,
    /// shifting them into this arena.
    pub fn extend_rebased(&mut self, records: Vec<SymbolRecord>) {
        let offset = self.symbols.len();
        for mut record in records {
            record.parent = record.parent.map(|p| p + offset);
            for child in &mut record.children {
                *child += offset;
            }
            self.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, id: SymbolId) -> Option<&SymbolRecord> {
        self.symbols.get(id)
    }

    /// Like `get`, for ids known to come from this database.
    pub fn symbol(&self, id: SymbolId) -> &SymbolRecord {
        &self.symbols[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &SymbolRecord)> {
        self.symbols.iter().enumerate()
    }

    /// All symbols with the given name, case-insensitive, in declaration
    /// order.
    pub fn find_by_name(&self, name: &str) -> Vec<SymbolId> {
        self.name_lookup
            .get(&name.to_ascii_lowercase())
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Locate a symbol from name plus source position. Used to identify
    /// the symbol under the cursor; the position disambiguates overloads.
    /// Falls back from exact declaration line, to enclosing line range in
    /// the same file, to the first name match anywhere.
    pub fn find_at(&self, name: &str, file: &str, line: u32) -> Option<SymbolId> {
        let candidates = self.find_by_name(name);
        if let Some(&id) = candidates
            .iter()
            .find(|&&id| self.symbols[id].file == file && self.symbols[id].line_start == line)
        {
            return Some(id);
        }
        if let Some(&id) = candidates.iter().find(|&&id| {
            let rec = &self.symbols[id];
            rec.file == file && rec.line_start <= line && line <= rec.line_end
        }) {
            return Some(id);
        }
        candidates.first().copied()
    }

    /// First module with the given name.
    pub fn module_by_name(&self, name: &str) -> Option<SymbolId> {
        self.find_by_name(name)
            .into_iter()
            .find(|&id| self.symbols[id].kind == SymbolKind::Module)
    }

    /// First derived type with the given name.
    pub fn type_by_name(&self, name: &str) -> Option<SymbolId> {
        self.find_by_name(name)
            .into_iter()
            .find(|&id| self.symbols[id].kind == SymbolKind::DerivedType)
    }

    /// Search the children of `scope` for a callable with the given name.
    pub fn find_child_callable(&self, scope: SymbolId, name: &str) -> Option<SymbolId> {
        self.symbols[scope]
            .children
            .iter()
            .copied()
            .find(|&c| self.symbols[c].named(name) && self.symbols[c].kind.is_callable())
    }

    /// Walk from `scope` to the database root, yielding each enclosing
    /// scope including `scope` itself.
    pub fn scope_chain(&self, scope: SymbolId) -> Vec<SymbolId> {
        let mut chain = vec![scope];
        let mut current = scope;
        while let Some(parent) = self.symbols[current].parent {
            // A malformed shard could produce a parent loop.
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::symbol::SymbolKind;

    fn rec(name: &str, kind: SymbolKind, file: &str, line: u32) -> SymbolRecord {
        SymbolRecord {
            name: name.to_string(),
            file: file.to_string(),
            line_start: line,
            line_end: line + 5,
            kind,
            parent: None,
            children: vec![],
            use_modules: vec![],
            args: vec![],
            bind_target: None,
            extends: None,
            calls: vec![],
        }
    }

    #[test]
    fn find_by_name_is_case_insensitive() {
        let mut db = SymbolDatabase::new();
        db.push(rec("Solve", SymbolKind::Subroutine, "a.f90", 1));
        assert_eq!(db.find_by_name("SOLVE").len(), 1);
        assert_eq!(db.find_by_name("solve").len(), 1);
        assert!(db.find_by_name("other").is_empty());
    }

    #[test]
    fn find_at_prefers_exact_declaration_line() {
        let mut db = SymbolDatabase::new();
        let a = db.push(rec("solve", SymbolKind::Subroutine, "a.f90", 10));
        let b = db.push(rec("solve", SymbolKind::Subroutine, "a.f90", 40));
        assert_eq!(db.find_at("solve", "a.f90", 40), Some(b));
        assert_eq!(db.find_at("solve", "a.f90", 10), Some(a));
        // Within the line range of the first overload.
        assert_eq!(db.find_at("solve", "a.f90", 12), Some(a));
        // Unknown position falls back to the first declaration.
        assert_eq!(db.find_at("solve", "other.f90", 1), Some(a));
    }

    #[test]
    fn extend_rebased_shifts_scope_links() {
        let mut db = SymbolDatabase::new();
        db.push(rec("first", SymbolKind::Module, "a.f90", 1));

        let mut parent = rec("mod_b", SymbolKind::Module, "b.f90", 1);
        parent.children = vec![1];
        let mut child = rec("sub_b", SymbolKind::Subroutine, "b.f90", 3);
        child.parent = Some(0);
        db.extend_rebased(vec![parent, child]);

        assert_eq!(db.len(), 3);
        assert_eq!(db.symbol(1).children, vec![2]);
        assert_eq!(db.symbol(2).parent, Some(1));
    }

    #[test]
    fn scope_chain_walks_to_root() {
        let mut db = SymbolDatabase::new();
        let m = db.push(rec("m", SymbolKind::Module, "a.f90", 1));
        let mut s = rec("s", SymbolKind::Subroutine, "a.f90", 3);
        s.parent = Some(m);
        let s = db.push(s);
        assert_eq!(db.scope_chain(s), vec![s, m]);
    }
}
