use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Seek};
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::discover::{discover, PboRef, Root};
use crate::error::Result;
use crate::{basename_no_ext, full_virtual_path, schema, virtual_dir_path};

/// Which stage of a build/update a [`BuildProgress`] report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovery,
    Pbo,
    Commit,
    Warning,
}

impl Phase {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Pbo => "pbo",
            Self::Commit => "commit",
            Self::Warning => "warning",
        }
    }
}

/// One progress notification, fired synchronously on the build thread.
/// Implementations must not re-enter the index engine from inside the
/// callback.
#[derive(Debug, Clone, Default)]
pub struct BuildProgress {
    pub phase: Option<Phase>,
    pub pbo_index: usize,
    pub pbo_total: usize,
    pub pbo_path: String,
    pub message: String,
}

/// Controls what metadata is eagerly indexed during build/update.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// When set, only the directory/file skeleton is indexed; P3D/PAA/
    /// audio metadata extraction is deferred (left for a caller-driven
    /// on-demand pass, not implemented here).
    pub on_demand_metadata: bool,
}

/// Counts accumulated by a [`build`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub pbo_count: usize,
    pub file_count: usize,
    pub p3d_count: usize,
    pub paa_count: usize,
    pub audio_count: usize,
}

/// Builds a fresh index database at `db_path` from every PBO discovered
/// under `roots`. Writes to a `{db_path}.tmp` sibling and atomically
/// renames it into place on success so a reader never observes a
/// partially built database.
pub fn build(
    db_path: impl AsRef<Path>,
    roots: &[Root],
    opts: BuildOptions,
    mut progress: impl FnMut(&BuildProgress),
) -> Result<BuildResult> {
    let db_path = db_path.as_ref();
    let tmp_path = tmp_sibling(db_path);
    let _ = std::fs::remove_file(&tmp_path);

    let mut result = BuildResult::default();
    let build_outcome = (|| -> Result<BuildResult> {
        let mut conn = Connection::open(&tmp_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        schema::apply(&conn)?;

        let tx = conn.transaction()?;
        stamp_meta(&tx, roots, opts)?;

        tracing::debug!("scanning {} root(s) for PBO archives", roots.len());
        progress(&BuildProgress { phase: Some(Phase::Discovery), ..Default::default() });
        let refs = discover(roots);
        result.pbo_count = refs.len();
        tracing::debug!("discovery complete: {} PBO(s) found", result.pbo_count);

        index_refs(&tx, &refs, opts, &mut progress, &mut result)?;

        tracing::debug!("committing index transaction: {} file(s) indexed", result.file_count);
        progress(&BuildProgress { phase: Some(Phase::Commit), ..Default::default() });
        tx.commit()?;

        conn.pragma_update(None, "wal_checkpoint", "TRUNCATE")?;
        drop(conn);
        Ok(result)
    })();

    match build_outcome {
        Ok(result) => {
            std::fs::rename(&tmp_path, db_path)?;
            let _ = std::fs::remove_file(sidecar(&tmp_path, "-wal"));
            let _ = std::fs::remove_file(sidecar(&tmp_path, "-shm"));
            Ok(result)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_path);
            let _ = std::fs::remove_file(sidecar(&tmp_path, "-wal"));
            let _ = std::fs::remove_file(sidecar(&tmp_path, "-shm"));
            Err(e)
        }
    }
}

pub(crate) fn tmp_sibling(db_path: &Path) -> PathBuf {
    let mut os = db_path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

fn stamp_meta(conn: &Connection, roots: &[Root], opts: BuildOptions) -> Result<()> {
    let mut insert = |key: &str, value: &str| -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )?;
        Ok(())
    };
    insert("schema_version", schema::SCHEMA_VERSION)?;
    insert("created_at", &chrono::Utc::now().to_rfc3339())?;
    let origins = roots
        .iter()
        .map(|r| format!("{}={}", r.source, r.path.display()))
        .collect::<Vec<_>>()
        .join("\n");
    insert("origins", &origins)?;
    insert(
        "metadata_mode",
        if opts.on_demand_metadata { "ondemand" } else { "prefill" },
    )?;
    Ok(())
}

/// Recognized-extension dispatch, shared by `build` and `update`.
pub(crate) fn index_refs(
    conn: &Connection,
    refs: &[PboRef],
    opts: BuildOptions,
    progress: &mut impl FnMut(&BuildProgress),
    result: &mut BuildResult,
) -> Result<()> {
    let mut pbo_stmt = conn.prepare(
        "INSERT INTO pbos (path, prefix, file_size, mod_time, source) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut ext_stmt = conn.prepare(
        "INSERT OR REPLACE INTO pbo_extensions (pbo_id, key, value) VALUES (?1, ?2, ?3)",
    )?;
    let mut file_stmt = conn.prepare(
        "INSERT INTO files (pbo_id, dir_id, path, original_size, data_size, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut model_stmt = conn.prepare(
        "INSERT INTO p3d_models (pbo_id, path, name, format, size_source, \
         size_x, size_y, size_z, \
         bbox_min_x, bbox_min_y, bbox_min_z, bbox_max_x, bbox_max_y, bbox_max_z, \
         bbox_center_x, bbox_center_y, bbox_center_z, bbox_radius, \
         mi_max_x, mi_max_y, mi_max_z, \
         vis_min_x, vis_min_y, vis_min_z, vis_max_x, vis_max_y, vis_max_z, \
         vis_center_x, vis_center_y, vis_center_z) \
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24,?25,?26,?27,?28,?29,?30)",
    )?;
    let mut mtex_stmt = conn.prepare(
        "INSERT INTO model_textures (pbo_id, model_path, texture_path, source) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut tex_stmt = conn.prepare(
        "INSERT INTO textures (pbo_id, path, name, format, data_size, width, height) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut audio_stmt = conn.prepare(
        "INSERT INTO audio_files (pbo_id, path, name, format, encoder, sample_rate, channels, data_size) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    let mut dirs = DirCache::new(conn)?;
    let pbo_total = refs.len();

    for (i, pbo_ref) in refs.iter().enumerate() {
        tracing::debug!("indexing archive {}/{}: {}", i + 1, pbo_total, pbo_ref.path.display());
        progress(&BuildProgress {
            phase: Some(Phase::Pbo),
            pbo_index: i + 1,
            pbo_total,
            pbo_path: pbo_ref.path.display().to_string(),
            ..Default::default()
        });

        let Ok(file) = File::open(&pbo_ref.path) else {
            tracing::warn!("cannot open PBO file: {}", pbo_ref.path.display());
            progress(&BuildProgress {
                phase: Some(Phase::Warning),
                pbo_index: i + 1,
                pbo_total,
                pbo_path: pbo_ref.path.display().to_string(),
                message: "cannot open file".to_string(),
            });
            continue;
        };
        let file_size = file.metadata().ok().map(|m| m.len()).unwrap_or(0);
        let mod_time = file
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
            .unwrap_or_default();

        let mut reader = BufReader::new(file);
        let archive = match rv_pbo::Archive::read(&mut reader) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!("invalid PBO {}: {e}", pbo_ref.path.display());
                progress(&BuildProgress {
                    phase: Some(Phase::Warning),
                    pbo_index: i + 1,
                    pbo_total,
                    pbo_path: pbo_ref.path.display().to_string(),
                    message: format!("invalid PBO: {e}"),
                });
                continue;
            }
        };

        pbo_stmt.execute(rusqlite::params![
            pbo_ref.path.display().to_string(),
            pbo_ref.prefix,
            file_size as i64,
            mod_time,
            pbo_ref.source,
        ])?;
        let pbo_id = conn.last_insert_rowid();

        for (key, value) in &archive.extensions {
            ext_stmt.execute(rusqlite::params![pbo_id, key, value])?;
        }

        for entry in &archive.entries {
            let vdir = virtual_dir_path(&pbo_ref.prefix, &entry.filename);
            let dir_id = if vdir.is_empty() { None } else { Some(dirs.ensure(conn, &vdir)?) };

            file_stmt.execute(rusqlite::params![
                pbo_id,
                dir_id,
                entry.filename,
                i64::from(entry.original_size),
                i64::from(entry.data_size),
                i64::from(entry.timestamp),
            ])?;
            result.file_count += 1;

            if opts.on_demand_metadata {
                continue;
            }

            let lower = rv_vpath::to_slash_lower(&entry.filename);
            if lower.ends_with(".p3d") {
                if index_p3d(&mut reader, &archive, entry, pbo_id, &mut model_stmt, &mut mtex_stmt).is_ok() {
                    result.p3d_count += 1;
                }
            } else if lower.ends_with(".paa") || lower.ends_with(".pac") {
                if index_paa(&mut reader, &archive, entry, pbo_id, &mut tex_stmt).is_ok() {
                    result.paa_count += 1;
                }
            } else if lower.ends_with(".ogg") {
                if index_ogg(&mut reader, &archive, entry, pbo_id, &mut audio_stmt).is_ok() {
                    result.audio_count += 1;
                }
            } else if lower.ends_with(".wss") || lower.ends_with(".wav") {
                if index_audio(&mut reader, &archive, entry, pbo_id, &mut audio_stmt).is_ok() {
                    result.audio_count += 1;
                }
            }
        }
    }

    Ok(())
}

/// Caches `dirs` closure rows by full virtual path so a re-encountered
/// directory is never inserted (or selected) twice within one run.
struct DirCache {
    ids: HashMap<String, i64>,
}

impl DirCache {
    fn new(_conn: &Connection) -> Result<Self> {
        Ok(Self { ids: HashMap::new() })
    }

    /// Ensures every path component of `dir_path` exists in `dirs`,
    /// returning the id of the deepest (leaf) directory.
    fn ensure(&mut self, conn: &Connection, dir_path: &str) -> Result<i64> {
        if let Some(&id) = self.ids.get(dir_path) {
            return Ok(id);
        }

        let mut parent_id: Option<i64> = None;
        let mut sub = String::new();
        for part in dir_path.split('/').filter(|p| !p.is_empty()) {
            if !sub.is_empty() {
                sub.push('/');
            }
            sub.push_str(part);

            if let Some(&id) = self.ids.get(&sub) {
                parent_id = Some(id);
                continue;
            }

            conn.execute(
                "INSERT OR IGNORE INTO dirs (parent_id, name, path) VALUES (?1, ?2, ?3)",
                rusqlite::params![parent_id, part, sub],
            )?;
            let id: i64 = conn.query_row(
                "SELECT id FROM dirs WHERE path = ?1",
                [&sub],
                |row| row.get(0),
            )?;
            self.ids.insert(sub.clone(), id);
            parent_id = Some(id);
        }

        Ok(parent_id.expect("dir_path was non-empty, so at least one component was inserted"))
    }
}

fn index_p3d(
    reader: &mut (impl std::io::Read + Seek),
    archive: &rv_pbo::Archive,
    entry: &rv_pbo::ArchiveEntry,
    pbo_id: i64,
    model_stmt: &mut rusqlite::Statement<'_>,
    mtex_stmt: &mut rusqlite::Statement<'_>,
) -> Result<()> {
    let data = archive.extract(reader, entry).map_err(|e| {
        tracing::debug!("p3d: extract failed for {}: {e}", entry.filename);
        crate::error::Error::EntryIndexFailed(entry.filename.clone())
    })?;
    let mut cursor = std::io::Cursor::new(data);
    let model = rv_p3d::read(&mut cursor).map_err(|e| {
        tracing::debug!("p3d: parse failed for {}: {e}", entry.filename);
        crate::error::Error::EntryIndexFailed(entry.filename.clone())
    })?;

    let name = basename_no_ext(&entry.filename);
    let format = match model.format {
        rv_p3d::Format::Odol => "ODOL",
        rv_p3d::Format::Mlod => "MLOD",
    };

    let mi_max = model.model_info.as_ref().map_or([0.0; 3], |mi| mi.bounding_box_max);
    let (size, size_note) = rv_p3d::calculate_size(&model);
    let _ = size_note;
    let vis = rv_p3d::visual_bbox(&model);

    let (size_source, size_x, size_y, size_z, bbox_min, bbox_max, bbox_center, bbox_radius) =
        size.map_or(
            (String::new(), 0.0, 0.0, 0.0, [0.0; 3], [0.0; 3], [0.0; 3], 0.0),
            |s| {
                (
                    s.source,
                    s.dimensions[0],
                    s.dimensions[1],
                    s.dimensions[2],
                    s.bbox_min,
                    s.bbox_max,
                    s.bbox_center,
                    s.bbox_radius,
                )
            },
        );
    let (vis_min, vis_max, vis_center) =
        vis.map_or(([0.0; 3], [0.0; 3], [0.0; 3]), |v| (v.bbox_min, v.bbox_max, v.bbox_center));

    model_stmt.execute(rusqlite::params![
        pbo_id,
        entry.filename,
        name,
        format,
        size_source,
        size_x,
        size_y,
        size_z,
        bbox_min[0], bbox_min[1], bbox_min[2],
        bbox_max[0], bbox_max[1], bbox_max[2],
        bbox_center[0], bbox_center[1], bbox_center[2],
        bbox_radius,
        mi_max[0], mi_max[1], mi_max[2],
        vis_min[0], vis_min[1], vis_min[2],
        vis_max[0], vis_max[1], vis_max[2],
        vis_center[0], vis_center[1], vis_center[2],
    ])?;

    let mut seen_textures = Vec::new();
    let mut seen_materials = Vec::new();
    for lod in &model.lods {
        for tex in &lod.textures {
            let norm = rv_vpath::to_slash_lower(tex);
            if norm.is_empty() || rv_vpath::is_procedural_texture(&norm) {
                continue;
            }
            if !seen_textures.contains(&norm) {
                seen_textures.push(norm.clone());
                mtex_stmt.execute(rusqlite::params![pbo_id, entry.filename, norm, "lod"])?;
            }
        }
        for mat in &lod.materials {
            let norm = rv_vpath::to_slash_lower(mat);
            if norm.is_empty() {
                continue;
            }
            if !seen_materials.contains(&norm) {
                seen_materials.push(norm.clone());
                mtex_stmt.execute(rusqlite::params![pbo_id, entry.filename, norm, "material"])?;
            }
        }
    }

    Ok(())
}

fn index_paa(
    reader: &mut (impl std::io::Read + Seek),
    archive: &rv_pbo::Archive,
    entry: &rv_pbo::ArchiveEntry,
    pbo_id: i64,
    stmt: &mut rusqlite::Statement<'_>,
) -> Result<()> {
    let data = archive.extract(reader, entry).map_err(|e| {
        tracing::debug!("paa: extract failed for {}: {e}", entry.filename);
        crate::error::Error::EntryIndexFailed(entry.filename.clone())
    })?;
    let mut cursor = std::io::Cursor::new(data);
    let header = rv_paa::read_header(&mut cursor).map_err(|e| {
        tracing::debug!("paa: parse failed for {}: {e}", entry.filename);
        crate::error::Error::EntryIndexFailed(entry.filename.clone())
    })?;

    stmt.execute(rusqlite::params![
        pbo_id,
        entry.filename,
        basename_no_ext(&entry.filename),
        header.format.name(),
        i64::from(entry.data_size),
        i64::from(header.width),
        i64::from(header.height),
    ])?;
    Ok(())
}

fn index_ogg(
    reader: &mut (impl std::io::Read + Seek),
    archive: &rv_pbo::Archive,
    entry: &rv_pbo::ArchiveEntry,
    pbo_id: i64,
    stmt: &mut rusqlite::Statement<'_>,
) -> Result<()> {
    let data = archive.extract(reader, entry).map_err(|e| {
        tracing::debug!("ogg: extract failed for {}: {e}", entry.filename);
        crate::error::Error::EntryIndexFailed(entry.filename.clone())
    })?;
    let mut cursor = std::io::Cursor::new(data);
    let header = rv_ogg::read_header(&mut cursor).map_err(|e| {
        tracing::debug!("ogg: parse failed for {}: {e}", entry.filename);
        crate::error::Error::EntryIndexFailed(entry.filename.clone())
    })?;

    stmt.execute(rusqlite::params![
        pbo_id,
        entry.filename,
        basename_no_ext(&entry.filename),
        "OGG",
        header.encoder,
        i64::from(header.sample_rate),
        i64::from(header.channels),
        i64::from(entry.data_size),
    ])?;
    Ok(())
}

fn index_audio(
    reader: &mut (impl std::io::Read + Seek),
    archive: &rv_pbo::Archive,
    entry: &rv_pbo::ArchiveEntry,
    pbo_id: i64,
    stmt: &mut rusqlite::Statement<'_>,
) -> Result<()> {
    let data = archive.extract(reader, entry).map_err(|e| {
        tracing::debug!("audio: extract failed for {}: {e}", entry.filename);
        crate::error::Error::EntryIndexFailed(entry.filename.clone())
    })?;
    let mut cursor = std::io::Cursor::new(data);
    let audio = rv_wss::read(&mut cursor).map_err(|e| {
        tracing::debug!("audio: parse failed for {}: {e}", entry.filename);
        crate::error::Error::EntryIndexFailed(entry.filename.clone())
    })?;

    let lower = rv_vpath::to_slash_lower(&entry.filename);
    let format = if lower.ends_with(".wav") { "WAV" } else { "WSS" };

    stmt.execute(rusqlite::params![
        pbo_id,
        entry.filename,
        basename_no_ext(&entry.filename),
        format,
        audio.encoding.name(),
        i64::from(audio.sample_rate),
        i64::from(audio.channels),
        i64::from(entry.data_size),
    ])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::Root;

    fn build_test_pbo(dir: &Path) -> PathBuf {
        let mut builder = rv_pbo::Builder::new();
        builder.extension("prefix", "test/data");
        builder.entry("model.p3d", b"not a real model".to_vec());
        builder.entry("readme.txt", b"hello".to_vec());
        let bytes = builder.build().unwrap();
        let path = dir.join("test.pbo");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn build_creates_database_with_expected_counts() {
        let dir = tempfile::tempdir().unwrap();
        build_test_pbo(dir.path());
        let db_path = dir.path().join("index.db");

        let result = build(
            &db_path,
            &[Root::new(dir.path(), "custom")],
            BuildOptions::default(),
            |_| {},
        )
        .unwrap();

        assert_eq!(result.pbo_count, 1);
        assert_eq!(result.file_count, 2);
        assert!(db_path.exists());
        assert!(!tmp_sibling(&db_path).exists());
    }

    #[test]
    fn build_resolves_entries_through_index() {
        let dir = tempfile::tempdir().unwrap();
        build_test_pbo(dir.path());
        let db_path = dir.path().join("index.db");
        build(&db_path, &[Root::new(dir.path(), "custom")], BuildOptions::default(), |_| {}).unwrap();

        let db = crate::Db::open(&db_path).unwrap();
        let index = db.index().unwrap();
        let resolved = index.resolve("test/data/model.p3d").unwrap();
        assert_eq!(resolved.entry_name, "model.p3d");
    }
}
