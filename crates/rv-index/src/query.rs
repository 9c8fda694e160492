use std::collections::HashMap;

use crate::error::Result;
use crate::{full_virtual_path, Db};

/// Bounding geometry of one indexed P3D model, keyed by its full virtual
/// path in [`Db::query_model_bboxes`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelBbox {
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
    pub bbox_center: [f32; 3],
    pub bbox_radius: f32,
    pub mi_max: [f32; 3],
    pub vis_min: [f32; 3],
    pub vis_max: [f32; 3],
    pub vis_center: [f32; 3],
}

/// Aggregate counts and metadata over an entire index database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub schema_version: String,
    pub created_at: String,
    pub pbo_count: u64,
    pub pbos_with_prefix: u64,
    pub file_count: u64,
    pub total_data_size: u64,
    pub p3d_model_count: u64,
    pub texture_count: u64,
    pub audio_file_count: u64,
}

impl Db {
    /// Every distinct `source` value present in `pbos`.
    pub fn query_sources(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT source FROM pbos WHERE source != '' ORDER BY source")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every indexed PBO path, sorted.
    pub fn list_pbo_paths(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM pbos ORDER BY path")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full lower-cased virtual path to original-case basename (without
    /// extension) for every indexed P3D model.
    pub fn query_model_paths(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.path, m.name, p.prefix FROM p3d_models m JOIN pbos p ON m.pbo_id = p.id",
        )?;
        let mut result = HashMap::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let path: String = row.get(0)?;
            let name: String = row.get(1)?;
            let prefix: String = row.get(2)?;
            result.insert(full_virtual_path(&prefix, &path), name);
        }
        Ok(result)
    }

    /// Texture paths referenced by each given model's full virtual path.
    pub fn query_model_textures(&self, models: &[String]) -> Result<HashMap<String, Vec<String>>> {
        let mut result = HashMap::new();
        if models.is_empty() {
            return Ok(result);
        }
        let mut stmt = self.conn.prepare(
            "SELECT mt.texture_path FROM model_textures mt JOIN pbos p ON mt.pbo_id = p.id \
             WHERE LOWER(REPLACE(CASE WHEN p.prefix != '' THEN \
             REPLACE(p.prefix, '\\', '/') || '/' || REPLACE(mt.model_path, '\\', '/') \
             ELSE REPLACE(mt.model_path, '\\', '/') END, '\\', '/')) = ?1",
        )?;
        for model in models {
            let norm = rv_vpath::to_slash_lower(model);
            let textures = stmt
                .query_map([&norm], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if !textures.is_empty() {
                result.insert(norm, textures);
            }
        }
        Ok(result)
    }

    /// Bounding geometry for every indexed P3D model, keyed by full virtual
    /// path.
    pub fn query_model_bboxes(&self) -> Result<HashMap<String, ModelBbox>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.path, p.prefix, \
             bbox_min_x, bbox_min_y, bbox_min_z, bbox_max_x, bbox_max_y, bbox_max_z, \
             bbox_center_x, bbox_center_y, bbox_center_z, bbox_radius, \
             mi_max_x, mi_max_y, mi_max_z, \
             vis_min_x, vis_min_y, vis_min_z, vis_max_x, vis_max_y, vis_max_z, \
             vis_center_x, vis_center_y, vis_center_z \
             FROM p3d_models m JOIN pbos p ON m.pbo_id = p.id",
        )?;
        let mut result = HashMap::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let path: String = row.get(0)?;
            let prefix: String = row.get(1)?;
            let bbox = ModelBbox {
                bbox_min: [row.get(2)?, row.get(3)?, row.get(4)?],
                bbox_max: [row.get(5)?, row.get(6)?, row.get(7)?],
                bbox_center: [row.get(8)?, row.get(9)?, row.get(10)?],
                bbox_radius: row.get(11)?,
                mi_max: [row.get(12)?, row.get(13)?, row.get(14)?],
                vis_min: [row.get(15)?, row.get(16)?, row.get(17)?],
                vis_max: [row.get(18)?, row.get(19)?, row.get(20)?],
                vis_center: [row.get(21)?, row.get(22)?, row.get(23)?],
            };
            result.insert(full_virtual_path(&prefix, &path), bbox);
        }
        Ok(result)
    }

    /// Aggregate counts and top-level metadata for the whole database.
    pub fn stats(&self) -> Result<IndexStats> {
        let meta = |key: &str| -> String {
            self.conn
                .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| row.get(0))
                .unwrap_or_default()
        };
        let count = |sql: &str| -> Result<u64> {
            Ok(self.conn.query_row(sql, [], |row| row.get::<_, i64>(0))? as u64)
        };

        Ok(IndexStats {
            schema_version: meta("schema_version"),
            created_at: meta("created_at"),
            pbo_count: count("SELECT COUNT(*) FROM pbos")?,
            pbos_with_prefix: count("SELECT COUNT(*) FROM pbos WHERE prefix != ''")?,
            file_count: count("SELECT COUNT(*) FROM files")?,
            total_data_size: count("SELECT COALESCE(SUM(data_size), 0) FROM files")?,
            p3d_model_count: count("SELECT COUNT(*) FROM p3d_models")?,
            texture_count: count("SELECT COUNT(*) FROM textures")?,
            audio_file_count: count("SELECT COUNT(*) FROM audio_files")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_fixture(dir: &std::path::Path) -> std::path::PathBuf {
        let mut builder = rv_pbo::Builder::new();
        builder.extension("prefix", "a3/structures_f");
        builder.entry("data/house.p3d", b"not a real model".to_vec());
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
    fn stats_reports_counts_and_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = build_fixture(dir.path());
        let db = Db::open(&db_path).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.schema_version, crate::SCHEMA_VERSION);
        assert_eq!(stats.pbo_count, 1);
        assert_eq!(stats.file_count, 1);
        assert!(!stats.created_at.is_empty());
    }

    #[test]
    fn query_sources_and_list_pbo_paths() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = build_fixture(dir.path());
        let db = Db::open(&db_path).unwrap();

        assert_eq!(db.query_sources().unwrap(), vec!["custom".to_string()]);
        assert_eq!(db.list_pbo_paths().unwrap().len(), 1);
    }

    #[test]
    fn query_model_bboxes_is_keyed_by_full_virtual_path() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = build_fixture(dir.path());
        let db = Db::open(&db_path).unwrap();

        let bboxes = db.query_model_bboxes().unwrap();
        assert!(bboxes.contains_key("a3/structures_f/data/house.p3d"));
    }
}
