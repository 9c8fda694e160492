use std::collections::BTreeMap;

use rv_binio::WriteExt;

use crate::error::Result;

/// Assembles a new PBO archive in memory from an ordered list of entries
/// plus an optional extension map. Entries are always written stored
/// (uncompressed); the format does not require writers to produce
/// compressed payloads, and the original tooling this mirrors writes
/// archives the same way.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    extensions: BTreeMap<String, String>,
    entries: Vec<(String, Vec<u8>)>,
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extension(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    pub fn entry(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.push((name.into(), data.into()));
        self
    }

    /// Serializes the archive: the extension block (if non-empty), the
    /// entry directory, the concatenated payloads, and no trailing
    /// signature (callers that need one compute and append it themselves).
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();

        if !self.extensions.is_empty() {
            out.write_cstring("")?;
            out.write_u32(0x5665_7273)?;
            out.write_u32(0)?;
            out.write_u32(0)?;
            out.write_u32(0)?;
            out.write_u32(0)?;
            for (key, value) in &self.extensions {
                out.write_cstring(key)?;
                out.write_cstring(value)?;
            }
            out.write_cstring("")?;
        }

        for (name, data) in &self.entries {
            out.write_cstring(name)?;
            out.write_u32(0)?;
            out.write_u32(0)?;
            out.write_u32(0)?;
            out.write_u32(0)?;
            out.write_u32(data.len() as u32)?;
        }

        // End-of-directory marker: empty filename, all zero fields.
        out.write_cstring("")?;
        out.write_u32(0)?;
        out.write_u32(0)?;
        out.write_u32(0)?;
        out.write_u32(0)?;
        out.write_u32(0)?;

        for (_, data) in &self.entries {
            out.extend_from_slice(data);
        }

        Ok(out)
    }
}
