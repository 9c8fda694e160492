use crate::error::Result;
use crate::Db;

/// One file matched by [`Db::find_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindResult {
    pub pbo_path: String,
    pub prefix: String,
    pub source: String,
    pub entry_path: String,
    pub data_size: u64,
}

/// Translates a shell-style glob (`*`, `?`) into a SQL `LIKE` pattern,
/// escaping any existing `%`/`_`/`\` so they match literally.
fn glob_to_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' => out.push('%'),
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

impl Db {
    /// Finds files whose full virtual path matches `pattern` (`*` and `?`
    /// glob wildcards), optionally restricted to a single `source`.
    /// Results are ordered by path and paged with `limit`/`offset`.
    pub fn find_files(
        &self,
        pattern: &str,
        source: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FindResult>> {
        let like = glob_to_like(&rv_vpath::to_slash_lower(pattern));

        let sql = "SELECT p.path, p.prefix, p.source, f.path, f.data_size \
                   FROM files f JOIN pbos p ON f.pbo_id = p.id \
                   WHERE LOWER(REPLACE(\
                       CASE WHEN p.prefix != '' THEN p.prefix || '/' || f.path ELSE f.path END, \
                   '\\', '/')) LIKE ?1 ESCAPE '\\' \
                   AND (?2 IS NULL OR p.source = ?2) \
                   ORDER BY f.path LIMIT ?3 OFFSET ?4";

        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(rusqlite::params![like, source, limit, offset], |row| {
                Ok(FindResult {
                    pbo_path: row.get(0)?,
                    prefix: row.get(1)?,
                    source: row.get(2)?,
                    entry_path: row.get(3)?,
                    data_size: row.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_to_like_translates_wildcards() {
        assert_eq!(glob_to_like("data/*.p3d"), "data/%.p3d");
        assert_eq!(glob_to_like("house_?.p3d"), "house__.p3d");
    }

    #[test]
    fn glob_to_like_escapes_sql_wildcards() {
        assert_eq!(glob_to_like("100%_done.txt"), "100\\%\\_done.txt");
    }

    #[test]
    fn find_files_matches_glob_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = rv_pbo::Builder::new();
        builder.extension("prefix", "a3/structures_f");
        builder.entry("data/house.p3d", b"not a real model".to_vec());
        builder.entry("data/barn.p3d", b"not a real model".to_vec());
        let bytes = builder.build().unwrap();
        std::fs::write(dir.path().join("structures.pbo"), bytes).unwrap();

        let db_path = dir.path().join("index.db");
        crate::build(
            &db_path,
            &[crate::Root::new(dir.path(), "custom")],
            crate::BuildOptions::default(),
            |_| {},
        )
        .unwrap();

        let db = Db::open(&db_path).unwrap();
        let results = db.find_files("*house*", None, 100, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry_path, "data/house.p3d");
    }
}
