//! Symbol data model.
//!
//! Records describing declared Fortran entities, as exported by the
//! upstream parser. The engine only reads them.

use serde::{Deserialize, Serialize};

/// Index of a symbol within the database arena.
pub type SymbolId = usize;

/// Classification of a declared entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Module,
    Program,
    Function,
    Subroutine,
    Interface,
    DerivedType,
    TypeBoundProcedure,
    Variable,
}

impl SymbolKind {
    pub fn is_procedure(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Subroutine)
    }

    /// Kinds a plain (receiver-less) call-site name may resolve to.
    /// Type-bound procedures need a receiver and are reached through
    /// their binding, never by bare name.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function | SymbolKind::Subroutine | SymbolKind::Interface
        )
    }
}

/// Argument passing rule of a dummy argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassBy {
    Reference,
    Value,
}

impl Default for PassBy {
    fn default() -> Self {
        PassBy::Reference
    }
}

/// A dummy (formal) argument of a procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DummyArg {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub pass_by: PassBy,
}

/// One body-level call reference, collected upstream as a flat list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallReference {
    /// Called name as written. For `var%proc` access this is the
    /// binding name with the receiver stripped.
    pub name: String,
    /// Call-site line.
    pub line: u32,
    /// Number of actual arguments, when the upstream parser counted them.
    #[serde(default)]
    pub arg_count: Option<usize>,
    /// Declared type of the receiver for type-bound access, when known.
    #[serde(default)]
    pub receiver_type: Option<String>,
}

/// A declared symbol. Scope links are indices into the database arena,
/// never embedded pointers, so the database can be rebuilt wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub name: String,
    pub file: String,
    pub line_start: u32,
    #[serde(default)]
    pub line_end: u32,
    pub kind: SymbolKind,
    #[serde(default)]
    pub parent: Option<SymbolId>,
    #[serde(default)]
    pub children: Vec<SymbolId>,
    /// Names of modules imported with `use` in this scope.
    #[serde(default)]
    pub use_modules: Vec<String>,
    #[serde(default)]
    pub args: Vec<DummyArg>,
    /// For type-bound procedures: the implementation procedure this
    /// binding maps to. The binding name exposed on the type is `name`.
    #[serde(default)]
    pub bind_target: Option<String>,
    /// For derived types: parent type name in an `extends` chain.
    #[serde(default)]
    pub extends: Option<String>,
    /// Body-level call references, in source order.
    #[serde(default)]
    pub calls: Vec<CallReference>,
}

impl SymbolRecord {
    /// Canonical identity key. Unique within one database.
    pub fn key(&self) -> SymbolKey {
        SymbolKey {
            line_start: self.line_start,
            name: self.name.to_ascii_lowercase(),
            file: self.file.clone(),
        }
    }

    /// Case-insensitive name match, per Fortran convention.
    pub fn named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// The (declaration line, name, file) triple used for all deduplication.
/// Name is stored lowercased so key equality is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolKey {
    pub line_start: u32,
    pub name: String,
    pub file: String,
}
