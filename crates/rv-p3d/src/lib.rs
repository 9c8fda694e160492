//! Reader for the Real Virtuality P3D model format: ODOL v7, ODOL v28-75,
//! and MLOD (editable source) variants, dispatched by signature.

mod error;
mod mlod;
mod odol28;
mod odol_v7;
mod resolution;
mod size;
mod types;

use std::io::{Cursor, Read, Seek, SeekFrom};

use rv_binio::ReadExt;

pub use error::{Error, Result};
pub use resolution::{is_visual_lod, resolution_name};
pub use size::{calculate_size, visual_bbox};
pub use types::{
    Face, FaceVertex, Format, Lod, LodRoles, ModelInfo, NamedProperty, P3dFile, SizeInfo, Uv, Vec3,
};

/// An LZSS-framed P3D starts with one flag byte (any value is valid)
/// followed by literal bytes spelling the first three signature
/// characters, since the flag's bit pattern governs which of the
/// following tokens are literals rather than back-references.
fn has_lzss_framed_signature(sig: &[u8; 4]) -> bool {
    &sig[1..4] == b"ODO" || &sig[1..4] == b"MLO"
}

/// Reads a P3D model, dispatching on the four-byte signature. `ODOL`
/// branches on the following version; `MLOD` uses the editable-source
/// reader; anything else is checked for an LZSS-framed signature before
/// giving up.
pub fn read<R: Read + Seek>(r: &mut R) -> Result<P3dFile> {
    let start = r.stream_position()?;
    let sig = r.read_signature()?;

    if &sig == b"ODOL" {
        let version = r.read_u32()?;
        return if version < 28 {
            odol_v7::read_odol7(r, version)
        } else {
            odol28::read_odol28(r, version)
        };
    }

    if &sig == b"MLOD" {
        return mlod::read_mlod(r);
    }

    if has_lzss_framed_signature(&sig) {
        r.seek(SeekFrom::Start(start))?;
        let mut rest = Vec::new();
        r.read_to_end(&mut rest)?;
        let decompressed = rv_lzss::decompress_auto(&rest);
        if decompressed.is_empty() {
            return Err(Error::NotAP3dFile(sig));
        }
        let mut cursor = Cursor::new(decompressed);
        return read(&mut cursor);
    }

    Err(Error::NotAP3dFile(sig))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn rejects_unknown_signature() {
        let mut cursor = Cursor::new(b"XXXX".to_vec());
        let err = read(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::NotAP3dFile(_)));
    }

    #[test]
    fn dispatches_odol_v7_by_version() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"ODOL");
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // lod count = 0
        buf.extend_from_slice(&0f32.to_le_bytes()); // bounding sphere
        buf.extend_from_slice(&[0u8; 4 * 9]);
        buf.extend_from_slice(&0f32.to_le_bytes());
        buf.extend_from_slice(&0f32.to_le_bytes());
        for _ in 0..12 {
            buf.extend_from_slice(&(-1i32).to_le_bytes());
        }
        let mut cursor = Cursor::new(buf);
        let file = read(&mut cursor).unwrap();
        assert_eq!(file.format, Format::Odol);
        assert_eq!(file.version, 7);
        assert!(file.lods.is_empty());
    }
}
