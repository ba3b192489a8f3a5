// Domain layer: symbol data model, call-tree construction and
// preprocessor macro interpretation.

pub mod builder;
pub mod calltree;
pub mod database;
pub mod preproc;
pub mod symbol;
