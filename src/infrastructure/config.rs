//! Project configuration.
//!
//! Optional `fortrace.toml` next to the project, carrying the knobs
//! the host application would otherwise pass per call.

use std::collections::HashSet;
use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::builder::BuildOptions;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Symbol database shard files (JSON, as exported by the parser).
    pub databases: Vec<String>,
    /// Maximum call-tree recursion depth.
    pub max_depth: Option<usize>,
    /// Cancellation/progress polling interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Call names excluded from expansion (language keywords).
    pub keywords: Vec<String>,
    /// Extra module names treated as intrinsic, on top of the builtin
    /// set.
    pub intrinsic_modules: Vec<String>,
}

impl ProjectConfig {
    pub fn load(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {}", path))
    }

    /// Merge this config over the builder defaults.
    pub fn build_options(&self) -> BuildOptions {
        let mut opts = BuildOptions::default();
        if let Some(depth) = self.max_depth {
            opts.max_depth = depth;
        }
        if let Some(ms) = self.poll_interval_ms {
            opts.poll_interval = Duration::from_millis(ms);
        }
        opts.keywords = self
            .keywords
            .iter()
            .map(|k| k.to_ascii_lowercase())
            .collect::<HashSet<_>>();
        for name in &self.intrinsic_modules {
            opts.intrinsic_modules.insert(name.to_ascii_lowercase());
        }
        opts
    }
}
