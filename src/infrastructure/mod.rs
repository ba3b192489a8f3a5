// Infrastructure adapters: loading pre-built symbol databases, project
// configuration, and thread-pool setup.

pub mod concurrency;
pub mod config;
pub mod database_loader;

pub use config::ProjectConfig;
pub use database_loader::DatabaseLoader;
