use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

use rv_binio::ReadExt;

use crate::entry::ArchiveEntry;
use crate::error::{Error, Result};

const EXTENSION_SENTINEL: u32 = 0x5665_7273; // "Vers"

/// A parsed PBO archive: its extension properties, entry directory, and
/// optional trailing signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Archive {
    pub extensions: BTreeMap<String, String>,
    pub entries: Vec<ArchiveEntry>,
    /// Trailing SHA-1 over the file, present on most modern archives but
    /// never required.
    pub signature: Option<[u8; 20]>,
}

impl Archive {
    /// Parses the header, extension block and entry directory, then
    /// computes every entry's absolute data offset and opportunistically
    /// reads the trailing signature.
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let mut extensions = BTreeMap::new();
        let mut entries = Vec::new();
        let mut first = true;

        loop {
            let filename = r.read_cstring()?;
            let packing_method = r.read_u32()?;
            let original_size = r.read_u32()?;
            let reserved = r.read_u32()?;
            let timestamp = r.read_u32()?;
            let data_size = r.read_u32()?;

            if packing_method == EXTENSION_SENTINEL {
                if !first {
                    return Err(Error::MisplacedExtensionHeader);
                }
                loop {
                    let key = r.read_cstring()?;
                    if key.is_empty() {
                        break;
                    }
                    let value = r.read_cstring()?;
                    extensions.insert(key, value);
                }
            } else if filename.is_empty() {
                break;
            } else {
                entries.push(ArchiveEntry {
                    filename,
                    packing_method,
                    original_size,
                    reserved,
                    timestamp,
                    data_size,
                    data_offset: 0,
                });
            }

            first = false;
        }

        let data_start = r.stream_position()?;
        let mut offset = data_start;
        for entry in &mut entries {
            entry.data_offset = offset;
            offset += u64::from(entry.data_size);
        }

        r.seek(SeekFrom::Start(offset))?;

        let mut signature = None;
        let mut zero = [0u8; 1];
        if r.read_exact(&mut zero).is_ok() && zero[0] == 0 {
            let mut buf = [0u8; 20];
            if r.read_exact(&mut buf).is_ok() {
                signature = Some(buf);
            }
        }

        Ok(Self {
            extensions,
            entries,
            signature,
        })
    }

    /// Looks up an entry by its stored (case-preserved) filename.
    #[must_use]
    pub fn entry(&self, filename: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    /// Virtual-path prefix advertised by the extension block, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.extensions.get("prefix").map(String::as_str)
    }

    /// Reads an entry's payload, transparently decompressing it when the
    /// entry is LZSS-compressed.
    pub fn extract<R: Read + Seek>(&self, r: &mut R, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        r.seek(SeekFrom::Start(entry.data_offset))?;
        let raw = r.read_bytes(entry.data_size as usize)?;

        if entry.is_compressed() {
            rv_lzss::decompress(&raw, entry.original_size as usize, rv_lzss::ChecksumMode::Unsigned).map_err(|source| {
                Error::Decompress {
                    name: entry.filename.clone(),
                    source,
                }
            })
        } else {
            Ok(raw)
        }
    }
}
