//! PBO archive reader and writer.
//!
//! A PBO is a flat directory of entries (ASCII-Z filename plus five
//! little-endian `u32` fields) followed by the concatenated entry
//! payloads and an optional trailing SHA-1 signature. An optional
//! extension block, identified by the `"Vers"` packing-method sentinel
//! in the first record, carries free-form key/value properties such as
//! the archive's virtual-path `prefix`.

mod archive;
mod builder;
mod entry;
mod error;

pub use archive::Archive;
pub use builder::Builder;
pub use entry::ArchiveEntry;
pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_freshly_built_archive() {
        let mut builder = Builder::new();
        builder.extension("prefix", "test_prefix");
        builder.entry("config.bin", b"hello config".to_vec());
        builder.entry("data\\model.p3d", b"not really a model".to_vec());
        let bytes = builder.build().unwrap();

        let archive = Archive::read(&mut Cursor::new(bytes.clone())).unwrap();
        assert_eq!(archive.prefix(), Some("test_prefix"));
        assert_eq!(archive.entries.len(), 2);

        let mut cursor = Cursor::new(bytes);
        let entry = archive.entry("config.bin").unwrap();
        let data = archive.extract(&mut cursor, entry).unwrap();
        assert_eq!(data, b"hello config");

        let entry = archive.entry("data\\model.p3d").unwrap();
        let data = archive.extract(&mut cursor, entry).unwrap();
        assert_eq!(data, b"not really a model");
    }

    #[test]
    fn archive_without_extension_block_has_no_prefix() {
        let mut builder = Builder::new();
        builder.entry("a.txt", b"one".to_vec());
        builder.entry("b.txt", b"two".to_vec());
        let bytes = builder.build().unwrap();

        let archive = Archive::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(archive.prefix(), None);
        assert_eq!(archive.entries.len(), 2);
    }

    #[test]
    fn missing_trailing_signature_is_not_an_error() {
        let mut builder = Builder::new();
        builder.entry("only.txt", b"payload".to_vec());
        let bytes = builder.build().unwrap();

        let archive = Archive::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(archive.signature, None);
    }

    #[test]
    fn compressed_entry_is_decompressed_on_extract() {
        let original = b"AAAAAAAAAAAAAAAAAAAABBBBBBBBBBBBBBBBBBBBBBBBBBBB".to_vec();
        let compressed = rv_lzss::compress(&original, rv_lzss::ChecksumMode::Unsigned);

        let mut out = Vec::new();
        {
            use rv_binio::WriteExt;
            out.write_cstring("packed.bin").unwrap();
            out.write_u32(1).unwrap();
            out.write_u32(original.len() as u32).unwrap();
            out.write_u32(0).unwrap();
            out.write_u32(0).unwrap();
            out.write_u32(compressed.len() as u32).unwrap();
            // end of directory
            out.write_cstring("").unwrap();
            out.write_u32(0).unwrap();
            out.write_u32(0).unwrap();
            out.write_u32(0).unwrap();
            out.write_u32(0).unwrap();
            out.write_u32(0).unwrap();
            out.extend_from_slice(&compressed);
        }

        let archive = Archive::read(&mut Cursor::new(out.clone())).unwrap();
        let entry = archive.entry("packed.bin").unwrap();
        assert!(entry.is_compressed());

        let mut cursor = Cursor::new(out);
        let data = archive.extract(&mut cursor, entry).unwrap();
        assert_eq!(data, original);
    }
}
