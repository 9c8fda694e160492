use std::collections::HashMap;

use rusqlite::Connection;

use crate::build::{index_refs, BuildOptions, BuildProgress, BuildResult, Phase};
use crate::discover::{discover, PboRef, Root};
use crate::error::Result;
use crate::schema;

/// Counts accumulated by an [`update`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub file_count: usize,
    pub p3d_count: usize,
    pub paa_count: usize,
    pub audio_count: usize,
}

struct ExistingPbo {
    id: i64,
    file_size: u64,
    mod_time: String,
}

/// Re-scans `roots` against an already-built index database, adding newly
/// discovered PBOs, reindexing ones whose size or modification time
/// changed, and removing rows for PBOs no longer found on disk. Refuses to
/// run against a database with a mismatched schema version rather than
/// migrating it.
pub fn update(
    db_path: impl AsRef<std::path::Path>,
    roots: &[Root],
    opts: BuildOptions,
    mut progress: impl FnMut(&BuildProgress),
) -> Result<UpdateResult> {
    let mut conn = Connection::open(db_path.as_ref())?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    schema::check_version(&conn)?;
    schema::check_tables(&conn)?;

    let update_outcome = (|| -> Result<UpdateResult> {
        tracing::debug!("re-scanning {} root(s) for PBO archives", roots.len());
        progress(&BuildProgress { phase: Some(Phase::Discovery), ..Default::default() });
        let discovered = discover(roots);

        let tx = conn.transaction()?;
        let mut result = UpdateResult::default();

        let mut existing: HashMap<String, ExistingPbo> = {
            let mut stmt = tx.prepare("SELECT id, path, file_size, mod_time FROM pbos")?;
            stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    ExistingPbo {
                        id: row.get(0)?,
                        file_size: row.get::<_, i64>(2)? as u64,
                        mod_time: row.get(3)?,
                    },
                ))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?
        };

        let discovered_paths: std::collections::HashSet<String> = discovered
            .iter()
            .map(|r| r.path.display().to_string())
            .collect();

        let removed_paths: Vec<String> = existing
            .keys()
            .filter(|p| !discovered_paths.contains(*p))
            .cloned()
            .collect();
        for path in &removed_paths {
            if let Some(pbo) = existing.remove(path) {
                delete_pbo_children(&tx, pbo.id)?;
                result.removed += 1;
            }
        }

        let mut to_index: Vec<PboRef> = Vec::new();
        for pbo_ref in discovered {
            let path = pbo_ref.path.display().to_string();
            match existing.get(&path) {
                None => {
                    result.added += 1;
                    to_index.push(pbo_ref);
                }
                Some(prior) => {
                    let file = std::fs::File::open(&pbo_ref.path);
                    let current_size = file
                        .as_ref()
                        .ok()
                        .and_then(|f| f.metadata().ok())
                        .map(|m| m.len())
                        .unwrap_or(0);
                    let current_mtime = file
                        .ok()
                        .and_then(|f| f.metadata().ok())
                        .and_then(|m| m.modified().ok())
                        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
                        .unwrap_or_default();

                    if current_size == prior.file_size && current_mtime == prior.mod_time {
                        continue;
                    }
                    delete_pbo_children(&tx, prior.id)?;
                    result.updated += 1;
                    to_index.push(pbo_ref);
                }
            }
        }

        let mut build_result = BuildResult::default();
        index_refs(&tx, &to_index, opts, &mut progress, &mut build_result)?;
        result.file_count = build_result.file_count;
        result.p3d_count = build_result.p3d_count;
        result.paa_count = build_result.paa_count;
        result.audio_count = build_result.audio_count;

        tracing::debug!(
            "committing update transaction: {} added, {} updated, {} removed",
            result.added,
            result.updated,
            result.removed
        );
        progress(&BuildProgress { phase: Some(Phase::Commit), ..Default::default() });
        tx.commit()?;

        Ok(result)
    })();

    match update_outcome {
        Ok(result) => {
            conn.pragma_update(None, "wal_checkpoint", "TRUNCATE")?;
            Ok(result)
        }
        Err(e) => Err(e),
    }
}

/// Deletes every row referencing `pbo_id` across the child tables, then
/// the `pbos` row itself. Our schema always carries every child table, so
/// unlike the original implementation this needs no table-existence guard.
fn delete_pbo_children(conn: &Connection, pbo_id: i64) -> Result<()> {
    for table in [
        "files",
        "p3d_models",
        "textures",
        "audio_files",
        "model_textures",
        "pbo_extensions",
    ] {
        conn.execute(&format!("DELETE FROM {table} WHERE pbo_id = ?1"), [pbo_id])?;
    }
    conn.execute("DELETE FROM pbos WHERE id = ?1", [pbo_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Db;

    fn write_pbo(dir: &std::path::Path, name: &str, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let mut builder = rv_pbo::Builder::new();
        builder.extension("prefix", "a3/structures_f");
        for (path, data) in entries {
            builder.entry(path, data.to_vec());
        }
        let bytes = builder.build().unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn update_adds_new_pbo() {
        let dir = tempfile::tempdir().unwrap();
        write_pbo(dir.path(), "a.pbo", &[("data/house.p3d", b"not a real model")]);
        let db_path = dir.path().join("index.db");
        crate::build(&db_path, &[Root::new(dir.path(), "custom")], BuildOptions::default(), |_| {})
            .unwrap();

        write_pbo(dir.path(), "b.pbo", &[("data/barn.p3d", b"not a real model")]);
        let result =
            update(&db_path, &[Root::new(dir.path(), "custom")], BuildOptions::default(), |_| {})
                .unwrap();

        assert_eq!(result.added, 1);
        assert_eq!(result.updated, 0);
        assert_eq!(result.removed, 0);

        let db = Db::open(&db_path).unwrap();
        assert_eq!(db.list_pbo_paths().unwrap().len(), 2);
    }

    #[test]
    fn update_removes_deleted_pbo() {
        let dir = tempfile::tempdir().unwrap();
        let pbo_path = write_pbo(dir.path(), "a.pbo", &[("data/house.p3d", b"not a real model")]);
        let db_path = dir.path().join("index.db");
        crate::build(&db_path, &[Root::new(dir.path(), "custom")], BuildOptions::default(), |_| {})
            .unwrap();

        std::fs::remove_file(&pbo_path).unwrap();
        let result =
            update(&db_path, &[Root::new(dir.path(), "custom")], BuildOptions::default(), |_| {})
                .unwrap();

        assert_eq!(result.removed, 1);
        let db = Db::open(&db_path).unwrap();
        assert!(db.list_pbo_paths().unwrap().is_empty());
    }

    #[test]
    fn update_is_noop_when_nothing_changed() {
        let dir = tempfile::tempdir().unwrap();
        write_pbo(dir.path(), "a.pbo", &[("data/house.p3d", b"not a real model")]);
        let db_path = dir.path().join("index.db");
        crate::build(&db_path, &[Root::new(dir.path(), "custom")], BuildOptions::default(), |_| {})
            .unwrap();

        let result =
            update(&db_path, &[Root::new(dir.path(), "custom")], BuildOptions::default(), |_| {})
                .unwrap();

        assert_eq!(result.added, 0);
        assert_eq!(result.updated, 0);
        assert_eq!(result.removed, 0);
    }
}
