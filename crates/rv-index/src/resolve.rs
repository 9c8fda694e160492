use std::path::PathBuf;

use crate::discover::PboRef;
use crate::error::{Error, Result};

/// Describes where a virtual model path resolves to on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveResult {
    pub pbo_path: PathBuf,
    pub prefix: String,
    pub entry_name: String,
    pub full_path: String,
}

/// Maps normalized prefixes to PBO references for longest-prefix-match
/// virtual-path resolution.
pub struct Index {
    refs: Vec<PboRef>,
}

impl Index {
    #[must_use]
    pub fn new(mut refs: Vec<PboRef>) -> Self {
        refs.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { refs }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Resolves `virtual_path` to the PBO that declares a matching prefix,
    /// trying the longest prefix first.
    pub fn resolve(&self, virtual_path: &str) -> Result<ResolveResult> {
        let normalized = rv_vpath::to_slash_lower(virtual_path);

        for pbo in &self.refs {
            if pbo.prefix.is_empty() {
                continue;
            }
            let mut prefix = rv_vpath::to_slash_lower(&pbo.prefix);
            if !prefix.ends_with('/') {
                prefix.push('/');
            }
            if let Some(entry_name) = normalized.strip_prefix(&prefix) {
                return Ok(ResolveResult {
                    pbo_path: pbo.path.clone(),
                    prefix: pbo.prefix.clone(),
                    entry_name: entry_name.to_string(),
                    full_path: normalized,
                });
            }
        }

        Err(Error::NotFound(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pbo(path: &str, prefix: &str) -> PboRef {
        PboRef {
            path: PathBuf::from(path),
            prefix: prefix.to_string(),
            source: "custom".to_string(),
            synthesized_prefix: false,
        }
    }

    #[test]
    fn resolves_longest_matching_prefix() {
        let index = Index::new(vec![
            pbo("a3.pbo", "a3"),
            pbo("structures.pbo", "a3/structures_f"),
        ]);
        let result = index
            .resolve("a3/structures_f/data/house.p3d")
            .unwrap();
        assert_eq!(result.pbo_path, PathBuf::from("structures.pbo"));
        assert_eq!(result.entry_name, "data/house.p3d");
    }

    #[test]
    fn errors_when_no_prefix_matches() {
        let index = Index::new(vec![pbo("a3.pbo", "a3")]);
        assert!(matches!(
            index.resolve("other/model.p3d"),
            Err(Error::NotFound(_))
        ));
    }
}
