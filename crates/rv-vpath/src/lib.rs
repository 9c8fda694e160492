//! Virtual-path normalization shared by the archive, index and
//! model/texture resolvers.
//!
//! Real Virtuality asset paths are backslash-separated and
//! case-insensitive on disk but stored case-preserved inside archives;
//! every consumer needs the same normalization so that lookups agree
//! regardless of which form a path arrived in.

use std::fs;
use std::path::{Path, PathBuf};

/// Converts backslashes to forward slashes and lowercases the whole
/// string (ASCII-only; Real Virtuality paths are not expected to carry
/// non-ASCII bytes).
pub fn to_slash_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\\' { '/' } else { c })
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Converts forward slashes to the platform separator, preserving case.
pub fn to_os(s: &str) -> PathBuf {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '/' || c == '\\' {
            out.push(std::path::MAIN_SEPARATOR);
        } else {
            out.push(c);
        }
    }
    PathBuf::from(out)
}

/// Procedural textures are generated by the engine from a `#(...)`
/// macro string rather than read from disk (e.g.
/// `#(argb,8,8,3)color(1,1,1,1,co)`); they never resolve to a file.
pub fn is_procedural_texture(s: &str) -> bool {
    s.trim_start().starts_with("#(")
}

/// Case-insensitively resolves `rel` (a forward-slash path) against
/// `root` on disk, walking one path component at a time so neither the
/// directories nor the final filename need to match case.
pub fn find_file_ci(root: &Path, rel: &str) -> Option<PathBuf> {
    let mut current = root.to_path_buf();
    for component in rel.split('/').filter(|c| !c.is_empty()) {
        current = match_component_ci(&current, component)?;
    }
    Some(current)
}

fn match_component_ci(dir: &Path, name: &str) -> Option<PathBuf> {
    if dir.join(name).exists() {
        return Some(dir.join(name));
    }
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let entry_name = entry.file_name();
        if let Some(entry_name) = entry_name.to_str() {
            if entry_name.eq_ignore_ascii_case(name) {
                return Some(entry.path());
            }
        }
    }
    None
}
