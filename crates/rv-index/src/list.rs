use crate::error::Result;
use crate::Db;

/// One entry returned by [`Db::list_dir`]: either a subdirectory or a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    /// `None` for directories; the entry's data size for files.
    pub data_size: Option<u64>,
}

impl Db {
    /// Lists the immediate children of the virtual directory `dir`
    /// (empty string for the root), directories first then files, each
    /// group sorted lexicographically, paged with `limit`/`offset`.
    pub fn list_dir(&self, dir: &str, limit: i64, offset: i64) -> Result<Vec<DirEntry>> {
        self.list_dir_for_source(dir, None, limit, offset)
    }

    /// As [`Db::list_dir`], restricted to PBOs whose `source` matches.
    pub fn list_dir_for_source(
        &self,
        dir: &str,
        source: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DirEntry>> {
        let dir = rv_vpath::to_slash_lower(dir);
        let dir = dir.trim_end_matches('/');

        let dir_id: Option<i64> = if dir.is_empty() {
            None
        } else {
            self.conn
                .query_row("SELECT id FROM dirs WHERE path = ?1", [dir], |row| row.get(0))
                .ok()
        };
        if !dir.is_empty() && dir_id.is_none() {
            return Ok(Vec::new());
        }

        let mut subdirs = {
            let mut stmt = self
                .conn
                .prepare("SELECT name FROM dirs WHERE parent_id IS ?1 ORDER BY name")?;
            stmt.query_map([dir_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        subdirs.sort();

        let sql = if source.is_some() {
            "SELECT f.path, f.data_size FROM files f \
             JOIN pbos p ON f.pbo_id = p.id \
             WHERE f.dir_id IS ?1 AND p.source = ?2 ORDER BY f.path"
        } else {
            "SELECT f.path, f.data_size FROM files f WHERE f.dir_id IS ?1 ORDER BY f.path"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let files: Vec<(String, i64)> = if let Some(src) = source {
            stmt.query_map(rusqlite::params![dir_id, src], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(rusqlite::params![dir_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut entries: Vec<DirEntry> = subdirs
            .into_iter()
            .map(|name| DirEntry { name, is_dir: true, data_size: None })
            .collect();
        entries.extend(files.into_iter().map(|(path, size)| {
            let name = path.rsplit(['/', '\\']).next().unwrap_or(&path).to_string();
            DirEntry { name, is_dir: false, data_size: Some(size as u64) }
        }));

        Ok(entries
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_fixture(dir: &std::path::Path) -> std::path::PathBuf {
        let mut builder = rv_pbo::Builder::new();
        builder.extension("prefix", "a3/structures_f");
        builder.entry("data/house.p3d", b"not a real model".to_vec());
        builder.entry("data/barn.p3d", b"not a real model".to_vec());
        builder.entry("readme.txt", b"hi".to_vec());
        let bytes = builder.build().unwrap();
        std::fs::write(dir.join("structures.pbo"), bytes).unwrap();

        let db_path = dir.join("index.db");
        crate::build(
            &db_path,
            &[crate::Root::new(dir, "custom")],
            crate::BuildOptions::default(),
            |_| {},
        )
        .unwrap();
        db_path
    }

    #[test]
    fn list_dir_lists_subdirectory_files() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = build_fixture(dir.path());
        let db = Db::open(&db_path).unwrap();

        let entries = db.list_dir("a3/structures_f/data", 100, 0).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["barn.p3d", "house.p3d"]);
        assert!(entries.iter().all(|e| !e.is_dir));
    }

    #[test]
    fn list_dir_lists_nested_subdirectory_at_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = build_fixture(dir.path());
        let db = Db::open(&db_path).unwrap();

        let entries = db.list_dir("a3/structures_f", 100, 0).unwrap();
        assert!(entries.iter().any(|e| e.is_dir && e.name == "data"));
        assert!(entries.iter().any(|e| !e.is_dir && e.name == "readme.txt"));
    }

    #[test]
    fn list_dir_unknown_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = build_fixture(dir.path());
        let db = Db::open(&db_path).unwrap();

        assert!(db.list_dir("nope/nothing", 100, 0).unwrap().is_empty());
    }
}
