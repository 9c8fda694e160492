use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A directory tree to scan for `.pbo` files, tagged with a source label
/// (`"arma3"`, `"workshop"`, `"ofp"`, `"arma1"`, `"arma2"`, `"custom"`, ...).
#[derive(Debug, Clone)]
pub struct Root {
    pub path: PathBuf,
    pub source: String,
}

impl Root {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// One discovered PBO archive, with its declared (or synthesized) prefix.
#[derive(Debug, Clone)]
pub struct PboRef {
    pub path: PathBuf,
    pub prefix: String,
    pub source: String,
    /// True when `prefix` wasn't declared in the PBO header and was
    /// synthesized from the file stem instead.
    pub synthesized_prefix: bool,
}

/// Legacy engines (Operation Flashpoint, Arma 1/2) commonly ship PBOs with
/// no `prefix` extension at all; the file stem stands in for it.
fn is_legacy_source(source: &str) -> bool {
    matches!(source, "ofp" | "arma1" | "arma2")
}

fn is_pbo_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pbo"))
}

/// Walks every root, opening each `.pbo` found to read its declared prefix.
/// PBOs that fail to open are skipped, not fatal.
#[must_use]
pub fn discover(roots: &[Root]) -> Vec<PboRef> {
    let mut refs = Vec::new();

    for root in roots {
        for entry in WalkDir::new(&root.path)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() || !is_pbo_file(entry.path()) {
                continue;
            }
            let path = entry.path().to_path_buf();

            let prefix = File::open(&path)
                .ok()
                .and_then(|f| rv_pbo::Archive::read(&mut BufReader::new(f)).ok())
                .and_then(|archive| archive.prefix().map(str::to_string));

            let (prefix, synthesized_prefix) = match prefix {
                Some(p) if !p.is_empty() => (p, false),
                _ if is_legacy_source(&root.source) => {
                    let stem = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default();
                    (rv_vpath::to_slash_lower(stem), true)
                }
                _ => (String::new(), false),
            };

            refs.push(PboRef {
                path,
                prefix,
                source: root.source.clone(),
                synthesized_prefix,
            });
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_non_pbo_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"hi").unwrap();
        let refs = discover(&[Root::new(dir.path(), "custom")]);
        assert!(refs.is_empty());
    }

    #[test]
    fn skips_unreadable_pbo() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.pbo"), b"not a pbo").unwrap();
        let refs = discover(&[Root::new(dir.path(), "custom")]);
        assert_eq!(refs.len(), 1);
        assert!(refs[0].prefix.is_empty());
    }
}
