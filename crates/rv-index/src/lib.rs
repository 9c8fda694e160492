//! SQLite-backed index over a collection of PBO archives.
//!
//! Discovers archives under a set of roots, extracts per-entry
//! structured metadata (P3D bounding geometry, PAA/PAC texture
//! dimensions, WSS/WAV/OGG audio format) through the sibling format
//! crates, and persists it to a fixed SQLite schema. At query time the
//! index resolves a normalized virtual path by longest-prefix match,
//! lists virtual directories, and searches entries by glob pattern.

mod build;
mod discover;
mod error;
mod find;
mod list;
mod query;
mod resolve;
mod schema;
mod update;

pub use build::{build, BuildOptions, BuildProgress, BuildResult, Phase};
pub use discover::{discover, PboRef, Root};
pub use error::{Error, Result};
pub use find::FindResult;
pub use list::DirEntry;
pub use query::{IndexStats, ModelBbox};
pub use resolve::{Index, ResolveResult};
pub use schema::SCHEMA_VERSION;
pub use update::{update, UpdateResult};

use rusqlite::Connection;

/// A read-only handle on a built index database, used for the query
/// methods (`list_dir`, `find_files`, `query_model_bboxes`, ...).
pub struct Db {
    conn: Connection,
}

impl Db {
    /// Opens an existing index database read-only, verifying its schema
    /// version and required tables. Refuses a mismatched version rather
    /// than attempting a migration.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;
        schema::check_version(&conn)?;
        schema::check_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Builds a longest-prefix-match [`Index`] from the `pbos` table.
    pub fn index(&self) -> Result<Index> {
        let mut stmt = self.conn.prepare("SELECT path, prefix, source FROM pbos")?;
        let refs = stmt
            .query_map([], |row| {
                Ok(PboRef {
                    path: std::path::PathBuf::from(row.get::<_, String>(0)?),
                    prefix: row.get(1)?,
                    source: row.get(2)?,
                    synthesized_prefix: false,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Index::new(refs))
    }
}

/// Joins a PBO's declared prefix and an entry's raw path into the
/// normalized, lower-cased virtual path used as the index's primary key.
fn full_virtual_path(prefix: &str, entry_path: &str) -> String {
    let mut full = String::new();
    if !prefix.is_empty() {
        let p = rv_vpath::to_slash_lower(prefix);
        full.push_str(p.trim_end_matches('/'));
        full.push('/');
    }
    full.push_str(&rv_vpath::to_slash_lower(entry_path));
    full
}

/// Strips a trailing slash-separated directory from `entry_path` joined
/// to `prefix`, used to place every entry in the `dirs` closure table.
fn virtual_dir_path(prefix: &str, entry_path: &str) -> String {
    let full = full_virtual_path(prefix, entry_path);
    match full.rfind('/') {
        Some(pos) => full[..pos].to_string(),
        None => String::new(),
    }
}

/// Last path component, without its extension, of a raw (possibly
/// backslash-separated) entry path.
fn basename_no_ext(path: &str) -> String {
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match base.rfind('.') {
        Some(pos) => base[..pos].to_string(),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_virtual_path_joins_prefix_and_entry() {
        assert_eq!(
            full_virtual_path("a3\\structures_f", "Data\\House.p3d"),
            "a3/structures_f/data/house.p3d"
        );
        assert_eq!(full_virtual_path("", "house.p3d"), "house.p3d");
    }

    #[test]
    fn virtual_dir_path_strips_last_component() {
        assert_eq!(virtual_dir_path("a3", "data/house.p3d"), "a3/data");
        assert_eq!(virtual_dir_path("", "house.p3d"), "");
    }

    #[test]
    fn basename_no_ext_strips_directory_and_extension() {
        assert_eq!(basename_no_ext("data\\cargo_house_v1.p3d"), "cargo_house_v1");
        assert_eq!(basename_no_ext("noext"), "noext");
    }
}
