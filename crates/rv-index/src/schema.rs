use rusqlite::Connection;

use crate::error::{Error, Result};

/// Bumped whenever the DDL below changes in a way that isn't forward
/// compatible with readers of an older database.
pub const SCHEMA_VERSION: &str = "1";

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS pbos (
    id INTEGER PRIMARY KEY,
    path TEXT UNIQUE NOT NULL,
    prefix TEXT NOT NULL DEFAULT '',
    file_size INTEGER NOT NULL DEFAULT 0,
    mod_time TEXT NOT NULL DEFAULT '',
    source TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS pbo_extensions (
    pbo_id INTEGER NOT NULL REFERENCES pbos(id),
    key TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (pbo_id, key)
);
CREATE TABLE IF NOT EXISTS dirs (
    id INTEGER PRIMARY KEY,
    parent_id INTEGER REFERENCES dirs(id),
    name TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS files (
    pbo_id INTEGER NOT NULL REFERENCES pbos(id),
    dir_id INTEGER REFERENCES dirs(id),
    path TEXT NOT NULL,
    original_size INTEGER NOT NULL DEFAULT 0,
    data_size INTEGER NOT NULL DEFAULT 0,
    timestamp INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS p3d_models (
    pbo_id INTEGER NOT NULL REFERENCES pbos(id),
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    format TEXT NOT NULL,
    size_source TEXT NOT NULL DEFAULT '',
    size_x REAL NOT NULL DEFAULT 0,
    size_y REAL NOT NULL DEFAULT 0,
    size_z REAL NOT NULL DEFAULT 0,
    bbox_min_x REAL NOT NULL DEFAULT 0,
    bbox_min_y REAL NOT NULL DEFAULT 0,
    bbox_min_z REAL NOT NULL DEFAULT 0,
    bbox_max_x REAL NOT NULL DEFAULT 0,
    bbox_max_y REAL NOT NULL DEFAULT 0,
    bbox_max_z REAL NOT NULL DEFAULT 0,
    bbox_center_x REAL NOT NULL DEFAULT 0,
    bbox_center_y REAL NOT NULL DEFAULT 0,
    bbox_center_z REAL NOT NULL DEFAULT 0,
    bbox_radius REAL NOT NULL DEFAULT 0,
    mi_max_x REAL NOT NULL DEFAULT 0,
    mi_max_y REAL NOT NULL DEFAULT 0,
    mi_max_z REAL NOT NULL DEFAULT 0,
    vis_min_x REAL NOT NULL DEFAULT 0,
    vis_min_y REAL NOT NULL DEFAULT 0,
    vis_min_z REAL NOT NULL DEFAULT 0,
    vis_max_x REAL NOT NULL DEFAULT 0,
    vis_max_y REAL NOT NULL DEFAULT 0,
    vis_max_z REAL NOT NULL DEFAULT 0,
    vis_center_x REAL NOT NULL DEFAULT 0,
    vis_center_y REAL NOT NULL DEFAULT 0,
    vis_center_z REAL NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS textures (
    pbo_id INTEGER NOT NULL REFERENCES pbos(id),
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    format TEXT NOT NULL DEFAULT '',
    data_size INTEGER NOT NULL DEFAULT 0,
    width INTEGER NOT NULL DEFAULT 0,
    height INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS audio_files (
    pbo_id INTEGER NOT NULL REFERENCES pbos(id),
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    format TEXT NOT NULL DEFAULT '',
    encoder TEXT NOT NULL DEFAULT '',
    sample_rate INTEGER NOT NULL DEFAULT 0,
    channels INTEGER NOT NULL DEFAULT 0,
    data_size INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS model_textures (
    pbo_id INTEGER NOT NULL REFERENCES pbos(id),
    model_path TEXT NOT NULL,
    texture_path TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'lod'
);
CREATE INDEX IF NOT EXISTS idx_dirs_parent_id ON dirs(parent_id);
CREATE INDEX IF NOT EXISTS idx_files_pbo_id ON files(pbo_id);
CREATE INDEX IF NOT EXISTS idx_files_dir_id ON files(dir_id);
CREATE INDEX IF NOT EXISTS idx_p3d_models_pbo_id ON p3d_models(pbo_id);
CREATE INDEX IF NOT EXISTS idx_textures_pbo_id ON textures(pbo_id);
CREATE INDEX IF NOT EXISTS idx_audio_files_pbo_id ON audio_files(pbo_id);
CREATE INDEX IF NOT EXISTS idx_model_textures_pbo_id ON model_textures(pbo_id);
CREATE INDEX IF NOT EXISTS idx_model_textures_model ON model_textures(model_path);
CREATE INDEX IF NOT EXISTS idx_pbos_source ON pbos(source);
";

/// Creates every table and index the database needs. Idempotent.
pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Stamps `meta.schema_version` on a freshly created database.
pub fn stamp_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Verifies an opened database's `schema_version` matches [`SCHEMA_VERSION`]
/// exactly.
pub fn check_version(conn: &Connection) -> Result<()> {
    let found: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .ok();
    let found = found.ok_or(Error::MissingSchemaVersion)?;
    if found != SCHEMA_VERSION {
        return Err(Error::SchemaMismatch {
            expected: SCHEMA_VERSION.to_string(),
            found,
        });
    }
    Ok(())
}

const REQUIRED_TABLES: &[&str] = &["pbos", "files", "p3d_models", "textures", "audio_files"];

/// Checks that the expected tables exist, guarding against an unrelated or
/// partially-migrated database.
pub fn check_tables(conn: &Connection) -> Result<()> {
    for table in REQUIRED_TABLES {
        let exists: bool = conn.query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(true),
        ).unwrap_or(false);
        if !exists {
            return Err(Error::MissingTable(table));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_schema_and_stamps_version() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();
        stamp_version(&conn).unwrap();
        check_version(&conn).unwrap();
        check_tables(&conn).unwrap();
    }

    #[test]
    fn rejects_mismatched_version() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', '999')",
            [],
        )
        .unwrap();
        let err = check_version(&conn).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn apply_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();
        apply(&conn).unwrap();
    }
}
