use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

/// Typed little-endian reads on any [`Read`].
///
/// Every method surfaces a short read as [`Error::ShortRead`] rather than
/// the raw `io::ErrorKind::UnexpectedEof`, so callers across every format
/// crate match on one error type.
pub trait ReadExt: Read {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        read_exact(self, &mut buf, 0)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        read_exact(self, &mut buf, 0)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        read_exact(self, &mut buf, 0)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        read_exact(self, &mut buf, 0)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        read_exact(self, &mut buf, 0)?;
        Ok(f32::from_le_bytes(buf))
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        read_exact(self, &mut buf, 0)?;
        Ok(buf)
    }

    fn read_u16_slice(&mut self, count: usize) -> Result<Vec<u16>> {
        (0..count).map(|_| self.read_u16()).collect()
    }

    fn read_u32_slice(&mut self, count: usize) -> Result<Vec<u32>> {
        (0..count).map(|_| self.read_u32()).collect()
    }

    fn read_f32_slice(&mut self, count: usize) -> Result<Vec<f32>> {
        (0..count).map(|_| self.read_f32()).collect()
    }

    /// ASCII-Z string; fails if end-of-stream is reached before a NUL byte.
    fn read_cstring(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            let mut b = [0u8; 1];
            match self.read(&mut b) {
                Ok(0) => return Err(Error::UnterminatedString),
                Ok(_) => {
                    if b[0] == 0 {
                        return Ok(String::from_utf8_lossy(&bytes).into_owned());
                    }
                    bytes.push(b[0]);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Fixed-size string; always consumes exactly `len` bytes, truncating
    /// the returned string at the first NUL.
    fn read_fixed_string(&mut self, len: usize) -> Result<String> {
        let buf = self.read_bytes(len)?;
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    /// Four-byte ASCII signature, e.g. `b"ODOL"`.
    fn read_signature(&mut self) -> Result<[u8; 4]> {
        let mut buf = [0u8; 4];
        read_exact(self, &mut buf, 0)?;
        Ok(buf)
    }

    /// 7-bit groups, low group first, high bit marks continuation.
    fn read_compressed_int(&mut self) -> Result<u32> {
        let mut result: u32 = 0;
        let mut shift = 0u32;
        for _ in 0..5 {
            let byte = self.read_u8()?;
            result |= u32::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(Error::CompressedIntOverflow)
    }

    /// A 12-float affine/rotation+translation matrix (row-major, 3x4).
    fn read_matrix3x4(&mut self) -> Result<[f32; 12]> {
        let mut out = [0f32; 12];
        for slot in &mut out {
            *slot = self.read_f32()?;
        }
        Ok(out)
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

/// Reads that additionally require the stream to be seekable.
pub trait SeekReadExt: Read + Seek {
    fn stream_len_remaining(&mut self) -> Result<u64> {
        let current = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(current))?;
        Ok(end - current)
    }
}

impl<R: Read + Seek + ?Sized> SeekReadExt for R {}

fn read_exact<R: Read + ?Sized>(r: &mut R, buf: &mut [u8], at: u64) -> Result<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ShortRead {
                expected: buf.len(),
                at,
            }
        } else {
            Error::Io(e)
        }
    })
}

/// Typed little-endian writes on any [`Write`].
pub trait WriteExt: Write {
    fn write_u8(&mut self, v: u8) -> Result<()> {
        write_all(self, &[v])
    }

    fn write_u16(&mut self, v: u16) -> Result<()> {
        write_all(self, &v.to_le_bytes())
    }

    fn write_u32(&mut self, v: u32) -> Result<()> {
        write_all(self, &v.to_le_bytes())
    }

    fn write_i32(&mut self, v: i32) -> Result<()> {
        write_all(self, &v.to_le_bytes())
    }

    fn write_f32(&mut self, v: f32) -> Result<()> {
        write_all(self, &v.to_le_bytes())
    }

    /// Writes `s` followed by a terminating NUL.
    fn write_cstring(&mut self, s: &str) -> Result<()> {
        write_all(self, s.as_bytes())?;
        self.write_u8(0)
    }

    fn write_signature(&mut self, sig: &[u8; 4]) -> Result<()> {
        write_all(self, sig)
    }

    fn write_compressed_int(&mut self, mut v: u32) -> Result<()> {
        loop {
            let mut byte = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                byte |= 0x80;
            }
            self.write_u8(byte)?;
            if v == 0 {
                return Ok(());
            }
        }
    }
}

impl<W: Write + ?Sized> WriteExt for W {}

fn write_all<W: Write + ?Sized>(w: &mut W, buf: &[u8]) -> Result<()> {
    w.write_all(buf).map_err(|_| Error::ShortWrite { expected: buf.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn read_u32_round_trip() {
        let mut buf = Vec::new();
        buf.write_u32(0xdead_beef).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(cur.read_u32().unwrap(), 0xdead_beef);
    }

    #[test]
    fn read_cstring_reads_to_nul() {
        let mut cur = Cursor::new(b"hello\0world".to_vec());
        assert_eq!(cur.read_cstring().unwrap(), "hello");
        // stream continues right after the NUL
        assert_eq!(cur.read_fixed_string(5).unwrap(), "world");
    }

    #[test]
    fn read_cstring_errors_without_terminator() {
        let mut cur = Cursor::new(b"no-terminator".to_vec());
        assert!(cur.read_cstring().is_err());
    }

    #[test]
    fn read_fixed_string_truncates_at_first_nul_but_consumes_all_bytes() {
        let mut cur = Cursor::new(b"ab\0\0\0more".to_vec());
        assert_eq!(cur.read_fixed_string(5).unwrap(), "ab");
        assert_eq!(cur.read_fixed_string(4).unwrap(), "more");
    }

    #[test]
    fn signature_round_trip() {
        let mut buf = Vec::new();
        buf.write_signature(b"ODOL").unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(&cur.read_signature().unwrap(), b"ODOL");
    }

    proptest! {
        #[test]
        fn compressed_int_round_trips(v in 0u32..(1u32 << 30)) {
            let mut buf = Vec::new();
            buf.write_compressed_int(v).unwrap();
            let mut cur = Cursor::new(buf);
            prop_assert_eq!(cur.read_compressed_int().unwrap(), v);
        }
    }
}
