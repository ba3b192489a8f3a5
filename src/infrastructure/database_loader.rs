//! Symbol database loading.
//!
//! The upstream parser exports symbol records as JSON shards, one per
//! project or workspace parse. Shards are deserialized in parallel and
//! linked into one arena; shard-local parent/child indices are rebased
//! during linking.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;

use crate::domain::database::SymbolDatabase;
use crate::domain::symbol::SymbolRecord;

pub struct DatabaseLoader;

impl DatabaseLoader {
    /// Load and link one database from the given shard files.
    pub fn load<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<SymbolDatabase> {
        let shards: Vec<Vec<SymbolRecord>> = paths
            .par_iter()
            .map(|p| Self::load_shard(p.as_ref()))
            .collect::<Result<_>>()?;

        let mut db = SymbolDatabase::new();
        for records in shards {
            db.extend_rebased(records);
        }
        println!(
            "[loader] linked {} symbols from {} shard(s)",
            db.len(),
            paths.len()
        );
        Ok(db)
    }

    fn load_shard(path: &Path) -> Result<Vec<SymbolRecord>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read database shard {}", path.display()))?;
        let records: Vec<SymbolRecord> = serde_json::from_str(&text)
            .with_context(|| format!("Malformed database shard {}", path.display()))?;
        Self::validate_links(&records, path)?;
        Ok(records)
    }

    /// Scope links are shard-local indices; a link pointing outside the
    /// shard would corrupt the arena, so the whole shard is rejected.
    fn validate_links(records: &[SymbolRecord], path: &Path) -> Result<()> {
        let len = records.len();
        for (id, rec) in records.iter().enumerate() {
            if let Some(parent) = rec.parent {
                if parent >= len {
                    bail!(
                        "Database shard {}: symbol {} ('{}') has parent index {} outside the shard ({} symbols)",
                        path.display(),
                        id,
                        rec.name,
                        parent,
                        len
                    );
                }
            }
            if let Some(&child) = rec.children.iter().find(|&&c| c >= len) {
                bail!(
                    "Database shard {}: symbol {} ('{}') has child index {} outside the shard ({} symbols)",
                    path.display(),
                    id,
                    rec.name,
                    child,
                    len
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::symbol::SymbolKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn shard_json() -> &'static str {
        r#"[
            {
                "name": "physics",
                "file": "physics.f90",
                "line_start": 1,
                "line_end": 40,
                "kind": "Module",
                "children": [1]
            },
            {
                "name": "step",
                "file": "physics.f90",
                "line_start": 5,
                "line_end": 20,
                "kind": "Subroutine",
                "parent": 0,
                "calls": [{ "name": "integrate", "line": 8 }]
            }
        ]"#
    }

    #[test]
    fn load_single_shard() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(shard_json().as_bytes()).unwrap();

        let db = DatabaseLoader::load(&[file.path()]).unwrap();
        assert_eq!(db.len(), 2);
        let module = db.find_at("physics", "physics.f90", 1).unwrap();
        assert_eq!(db.symbol(module).kind, SymbolKind::Module);
        assert_eq!(db.symbol(module).children, vec![1]);
        assert_eq!(db.symbol(1).calls[0].name, "integrate");
    }

    #[test]
    fn linking_two_shards_rebases_indices() {
        let mut a = NamedTempFile::new().unwrap();
        a.write_all(shard_json().as_bytes()).unwrap();
        let mut b = NamedTempFile::new().unwrap();
        b.write_all(shard_json().as_bytes()).unwrap();

        let db = DatabaseLoader::load(&[a.path(), b.path()]).unwrap();
        assert_eq!(db.len(), 4);
        // Second shard's module points at its own subroutine.
        assert_eq!(db.symbol(2).children, vec![3]);
        assert_eq!(db.symbol(3).parent, Some(2));
    }

    #[test]
    fn shard_with_out_of_range_links_is_an_error() {
        // A parent index pointing outside the shard must fail the load,
        // not surface as a panic during the first build.
        let mut bad_parent = NamedTempFile::new().unwrap();
        bad_parent
            .write_all(
                br#"[{ "name": "step", "file": "s.f90", "line_start": 5, "kind": "Subroutine", "parent": 99 }]"#,
            )
            .unwrap();
        let err = DatabaseLoader::load(&[bad_parent.path()]).unwrap_err();
        assert!(err.to_string().contains("parent index 99"));

        let mut bad_child = NamedTempFile::new().unwrap();
        bad_child
            .write_all(
                br#"[{ "name": "physics", "file": "p.f90", "line_start": 1, "kind": "Module", "children": [7] }]"#,
            )
            .unwrap();
        let err = DatabaseLoader::load(&[bad_child.path()]).unwrap_err();
        assert!(err.to_string().contains("child index 7"));
    }

    #[test]
    fn malformed_shard_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json ]").unwrap();
        assert!(DatabaseLoader::load(&[file.path()]).is_err());
    }
}
