//! PAA/PAC texture codec.
//!
//! A PAA file is a leading two-byte type tag (absent for the legacy
//! OFP palette-indexed variant), an optional chain of `TAGG` blocks, an
//! optional BGR palette, and one or more mipmaps. This crate decodes
//! mipmap 0 of every documented variant and encodes DXT1/3/5 from RGBA.

mod direct;
mod dxt;
mod error;
mod texture;

pub use error::{Error, Result};
pub use texture::{Format, PaaHeader, Texture};

use rv_binio::ReadExt;
use std::io::Read;

/// Reject palette-indexed dimensions above this; the spec names no
/// documented upper bound for the `0x04D2`/`0x223D` sentinel, so this is a
/// configured ceiling against implausible streams, not a format limit.
pub const MAX_TEXTURE_DIM: u32 = 16384;

fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) => return Err(rv_binio::Error::Io(e).into()),
        }
    }
    Ok(total)
}

/// Peeks 4 bytes from a seekable reader and reports whether they're a
/// `GGAT` TAGG signature, restoring the position either way.
fn peek_is_tagg<R: std::io::Read + std::io::Seek>(r: &mut R) -> Result<bool> {
    let pos = r.stream_position().map_err(rv_binio::Error::Io)?;
    let mut sig = [0u8; 4];
    let n = read_up_to(r, &mut sig)?;
    r.seek(std::io::SeekFrom::Start(pos)).map_err(rv_binio::Error::Io)?;
    Ok(n == 4 && &sig == b"GGAT")
}

fn skip_taggs_seekable<R: std::io::Read + std::io::Seek>(r: &mut R) -> Result<()> {
    while peek_is_tagg(r)? {
        let _ = r.read_bytes(8)?; // "GGAT" + 4-byte name
        let len = r.read_u32()?;
        let _ = r.read_bytes(len as usize)?;
    }
    Ok(())
}

struct MipmapHeader {
    format: Format,
    width: u32,
    height: u32,
    lzo_compressed: bool,
    /// Palette-indexed payload arrived via the LZSS `0x04D2`/`0x223D`
    /// sentinel rather than the RLE scheme.
    palette_lzss: bool,
    data: Vec<u8>,
}

fn read_mipmap0<R: std::io::Read + std::io::Seek>(
    r: &mut R,
    format: Format,
    is_indexed: bool,
) -> Result<MipmapHeader> {
    let mut width_raw = r.read_u16()?;
    let mut height_raw = r.read_u16()?;

    let mut palette_lzss = false;
    if is_indexed && width_raw == 0x04D2 && height_raw == 0x223D {
        palette_lzss = true;
        width_raw = r.read_u16()?;
        height_raw = r.read_u16()?;
    }

    let lzo_compressed = width_raw & 0x8000 != 0;
    let width = u32::from(width_raw & 0x7FFF);
    let height = u32::from(height_raw);

    if width == 0 || height == 0 {
        return Err(Error::ZeroDimension { width, height });
    }
    if width > MAX_TEXTURE_DIM || height > MAX_TEXTURE_DIM {
        return Err(Error::DimensionTooLarge { width, height, max: MAX_TEXTURE_DIM });
    }

    let mut len_buf = [0u8; 3];
    r.read_exact(&mut len_buf).map_err(rv_binio::Error::Io)?;
    let data_len = u32::from(len_buf[0]) | (u32::from(len_buf[1]) << 8) | (u32::from(len_buf[2]) << 16);
    let data = r.read_bytes(data_len as usize)?;

    Ok(MipmapHeader { format, width, height, lzo_compressed, palette_lzss, data })
}

fn format_or_indexed<R: std::io::Read + std::io::Seek>(r: &mut R) -> Result<(Format, bool)> {
    let tag = r.read_u16()?;
    if let Some(format) = Format::from_tag(tag) {
        skip_taggs_seekable(r)?;
        Ok((format, false))
    } else {
        // Not a recognized tag: the two bytes we consumed are either the
        // start of a "GGAT" TAGG signature or the palette count itself.
        // Un-read them and let the palette branch re-interpret.
        r.seek(std::io::SeekFrom::Current(-2)).map_err(rv_binio::Error::Io)?;
        let peek = r.read_u8()?;
        r.seek(std::io::SeekFrom::Current(-1)).map_err(rv_binio::Error::Io)?;
        if peek >= 0x20 {
            skip_taggs_seekable(r)?;
        }
        Ok((Format::Indexed, true))
    }
}

/// Reads the discovered format and dimensions without decoding pixels.
pub fn read_header<R: std::io::Read + std::io::Seek>(r: &mut R) -> Result<PaaHeader> {
    let (format, is_indexed) = format_or_indexed(r)?;

    let n_palette = r.read_u16()?;
    if n_palette > 0 {
        r.seek(std::io::SeekFrom::Current(i64::from(n_palette) * 3)).map_err(rv_binio::Error::Io)?;
    }

    let mut width_raw = r.read_u16()?;
    let mut height_raw = r.read_u16()?;
    if is_indexed && width_raw == 0x04D2 && height_raw == 0x223D {
        width_raw = r.read_u16()?;
        height_raw = r.read_u16()?;
    }
    let width = u32::from(width_raw & 0x7FFF);
    let height = u32::from(height_raw);

    Ok(PaaHeader { format, width, height })
}

/// Decodes mipmap 0 of a PAA/PAC stream into an RGBA [`Texture`].
pub fn decode<R: std::io::Read + std::io::Seek>(r: &mut R) -> Result<Texture> {
    let (format, is_indexed) = format_or_indexed(r)?;

    let n_palette = r.read_u16()?;
    let palette = if n_palette > 0 { r.read_bytes(usize::from(n_palette) * 3)? } else { Vec::new() };

    let mip = read_mipmap0(r, format, is_indexed)?;
    tracing::trace!(format = mip.format.name(), width = mip.width, height = mip.height, "paa: decoding mipmap 0");

    let expected = format.expected_pixel_size(mip.width, mip.height);
    let pixel_data: Vec<u8> = if is_indexed {
        if mip.palette_lzss {
            rv_lzss::decompress(&mip.data, expected, rv_lzss::ChecksumMode::None)?
        } else {
            direct::rle_decompress(&mip.data, expected)
        }
    } else if format.is_dxt() {
        if mip.lzo_compressed {
            rv_lzo::decompress_auto(&mip.data, expected)?
        } else {
            mip.data
        }
    } else if mip.data.len() < expected {
        rv_lzss::decompress(&mip.data, expected, rv_lzss::ChecksumMode::Signed)?
    } else {
        mip.data
    };

    let pixels = match format {
        Format::Dxt1 => decode_block_image(&pixel_data, mip.width, mip.height, 8, dxt::decode_block_dxt1),
        Format::Dxt2 | Format::Dxt3 => decode_block_image(&pixel_data, mip.width, mip.height, 16, dxt::decode_block_dxt3),
        Format::Dxt4 | Format::Dxt5 => decode_block_image(&pixel_data, mip.width, mip.height, 16, dxt::decode_block_dxt5),
        Format::Argb4444 => direct::decode_argb4444(&pixel_data, mip.width, mip.height),
        Format::Argb1555 => direct::decode_argb1555(&pixel_data, mip.width, mip.height),
        Format::Ai88 => direct::decode_ai88(&pixel_data, mip.width, mip.height),
        Format::Argb8888 => direct::decode_argb8888(&pixel_data, mip.width, mip.height),
        Format::Indexed => direct::decode_indexed(&pixel_data, &palette, mip.width, mip.height),
    };

    Ok(Texture::new(mip.width, mip.height, format, pixels))
}

fn decode_block_image(
    data: &[u8],
    width: u32,
    height: u32,
    block_size: usize,
    decode_block: fn(&[u8]) -> [[u8; 4]; 16],
) -> Vec<u8> {
    let mut out = vec![0u8; width as usize * height as usize * 4];
    let bw = (width as usize / 4).max(1);
    let bh = (height as usize / 4).max(1);
    for by in 0..bh {
        for bx in 0..bw {
            let idx = (by * bw + bx) * block_size;
            if idx + block_size > data.len() {
                return out;
            }
            let pixels = decode_block(&data[idx..idx + block_size]);
            for py in 0..4 {
                for px in 0..4 {
                    let x = bx * 4 + px;
                    let y = by * 4 + py;
                    if x < width as usize && y < height as usize {
                        let o = (y * width as usize + x) * 4;
                        out[o..o + 4].copy_from_slice(&pixels[py * 4 + px]);
                    }
                }
            }
        }
    }
    out
}

fn encode_image_dxt(tex: &Texture, block_size: usize, encode_block: fn(&[[u8; 4]; 16]) -> Vec<u8>) -> Vec<u8> {
    let bw = ((tex.width as usize + 3) / 4).max(1);
    let bh = ((tex.height as usize + 3) / 4).max(1);
    let mut out = vec![0u8; bw * bh * block_size];
    for by in 0..bh {
        for bx in 0..bw {
            let mut block = [[0u8; 4]; 16];
            for py in 0..4 {
                for px in 0..4 {
                    let x = (bx * 4 + px).min(tex.width as usize - 1) as u32;
                    let y = (by * 4 + py).min(tex.height as usize - 1) as u32;
                    block[py * 4 + px] = tex.get(x, y);
                }
            }
            let encoded = encode_block(&block);
            let off = (by * bw + bx) * block_size;
            out[off..off + block_size].copy_from_slice(&encoded);
        }
    }
    out
}

/// Encodes `tex` into a PAA byte stream with DXT1, DXT3, or DXT5
/// compression (one valid DXT encoding of many; byte-identical output is
/// not guaranteed). Rejects non-power-of-two dimensions.
pub fn encode(tex: &Texture, format: Format) -> Result<Vec<u8>> {
    if tex.width == 0 || tex.height == 0 {
        return Err(Error::ZeroDimension { width: tex.width, height: tex.height });
    }
    if !tex.width.is_power_of_two() || !tex.height.is_power_of_two() {
        return Err(Error::NotPowerOfTwo { width: tex.width, height: tex.height });
    }

    let data = match format {
        Format::Dxt1 => encode_image_dxt(tex, 8, |b| dxt::encode_block_dxt1(b).to_vec()),
        Format::Dxt3 => encode_image_dxt(tex, 16, |b| dxt::encode_block_dxt3(b).to_vec()),
        Format::Dxt5 => encode_image_dxt(tex, 16, |b| dxt::encode_block_dxt5(b).to_vec()),
        other => return Err(Error::UnsupportedEncodeFormat(other)),
    };
    let Some(tag) = format.tag() else {
        return Err(Error::UnsupportedEncodeFormat(format));
    };

    if data.len() > 0x00FF_FFFF {
        return Err(Error::MipmapTooLarge(data.len()));
    }

    let mut out = Vec::with_capacity(data.len() + 16);
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // no palette
    out.extend_from_slice(&(tex.width as u16).to_le_bytes());
    out.extend_from_slice(&(tex.height as u16).to_le_bytes());
    out.push((data.len() & 0xFF) as u8);
    out.push(((data.len() >> 8) & 0xFF) as u8);
    out.push(((data.len() >> 16) & 0xFF) as u8);
    out.extend_from_slice(&data);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    /// §8 scenario 4: palette-indexed 2x2, 4-entry BGR palette, no TAGGs.
    #[test]
    fn palette_indexed_round_trip_scenario() {
        let mut buf = Vec::new();
        // No type tag recognized: write the palette count directly (< 0x20
        // so no TAGGs are assumed) followed by palette, dims, data length,
        // indices.
        buf.extend_from_slice(&4u16.to_le_bytes()); // n_palette
        // BGR palette: blue, green, red, yellow
        buf.extend_from_slice(&[255, 0, 0, 0, 255, 0, 0, 0, 255, 0, 255, 255]);
        buf.extend_from_slice(&2u16.to_le_bytes()); // width
        buf.extend_from_slice(&2u16.to_le_bytes()); // height
        let indices = [0u8, 1, 2, 3];
        buf.push((indices.len() & 0xFF) as u8);
        buf.push(0);
        buf.push(0);
        buf.extend_from_slice(&indices);

        let mut cursor = Cursor::new(buf);
        let tex = decode(&mut cursor).unwrap();
        assert_eq!(tex.width, 2);
        assert_eq!(tex.height, 2);
        assert_eq!(tex.format, Format::Indexed);
        assert_eq!(
            tex.pixels,
            vec![
                0, 0, 255, 255, //
                0, 255, 0, 255, //
                255, 0, 0, 255, //
                255, 255, 0, 255, //
            ]
        );
    }

    #[test]
    fn header_reports_dxt1_dimensions() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0xFF01u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes()); // no palette
        buf.extend_from_slice(&64u16.to_le_bytes());
        buf.extend_from_slice(&32u16.to_le_bytes());
        buf.push(0);
        buf.push(0);
        buf.push(0);

        let mut cursor = Cursor::new(buf);
        let header = read_header(&mut cursor).unwrap();
        assert_eq!(header.format, Format::Dxt1);
        assert_eq!(header.width, 64);
        assert_eq!(header.height, 32);
    }

    #[test]
    fn dxt1_encode_then_decode_round_trips_a_solid_texture() {
        let width = 8u32;
        let height = 8u32;
        let pixels = vec![200u8, 50, 20, 255].repeat((width * height) as usize);
        let tex = Texture::new(width, height, Format::Dxt1, pixels);

        let encoded = encode(&tex, Format::Dxt1).unwrap();
        let mut cursor = Cursor::new(encoded);
        let decoded = decode(&mut cursor).unwrap();

        assert_eq!(decoded.width, width);
        assert_eq!(decoded.height, height);
        for chunk in decoded.pixels.chunks(4) {
            assert_eq!(chunk, &[200, 50, 20, 255]);
        }
    }

    #[test]
    fn encode_rejects_non_power_of_two() {
        let tex = Texture::new(3, 4, Format::Dxt1, vec![0u8; 3 * 4 * 4]);
        assert!(matches!(encode(&tex, Format::Dxt1), Err(Error::NotPowerOfTwo { .. })));
    }
}
