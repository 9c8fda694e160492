//! LZO1X-1 decompressor used by ODOL compressed/condensed arrays and PAA
//! mipmap payloads.
//!
//! The bitstream is the standard LZO1X instruction set: literal runs, three
//! match classes distinguished by the top bits of the opcode byte (M2/M3/M4
//! below), and a compact two-byte "M1" match used only directly after a
//! literal run. Run lengths beyond a class's inline field extend through a
//! run of zero bytes, each worth 255. End of stream is an M4 instruction
//! whose distance field works out to zero before the fixed 0x4000 bias is
//! added.

mod error;

pub use error::{Error, Result};

/// Below this decompressed size, callers store the payload raw instead of
/// paying for the LZO framing.
pub const RAW_THRESHOLD: usize = 1024;

/// A byte source the decoder can pull single bytes from, with one byte of
/// lookahead. Implemented over an in-memory slice (the common case, where
/// the compressed span's end is unknown but its start is already sliced
/// out of a larger buffer) and over a plain [`std::io::Read`] (for ODOL
/// condensed arrays embedded in a larger seekable stream, where slicing
/// out the compressed span ahead of time isn't possible).
trait ByteSource {
    fn next(&mut self) -> Result<u8>;
    fn peek(&mut self) -> Result<u8>;

    fn extend_len(&mut self, len: &mut usize) -> Result<()> {
        while self.peek()? == 0 {
            *len += 255;
            self.next()?;
        }
        *len += usize::from(self.next()?);
        Ok(())
    }

    fn read_u16le(&mut self) -> Result<u16> {
        let lo = self.next()?;
        let hi = self.next()?;
        Ok(u16::from(lo) | (u16::from(hi) << 8))
    }
}

struct Input<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0 }
    }
}

impl ByteSource for Input<'_> {
    fn next(&mut self) -> Result<u8> {
        let b = *self.src.get(self.pos).ok_or(Error::InputOverrun)?;
        self.pos += 1;
        Ok(b)
    }

    fn peek(&mut self) -> Result<u8> {
        self.src.get(self.pos).copied().ok_or(Error::InputOverrun)
    }
}

struct ReaderInput<'a, R> {
    r: &'a mut R,
    lookahead: Option<u8>,
}

impl<'a, R: std::io::Read> ReaderInput<'a, R> {
    fn new(r: &'a mut R) -> Self {
        Self { r, lookahead: None }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.r.read_exact(&mut b).map_err(|_| Error::InputOverrun)?;
        Ok(b[0])
    }
}

impl<R: std::io::Read> ByteSource for ReaderInput<'_, R> {
    fn next(&mut self) -> Result<u8> {
        if let Some(b) = self.lookahead.take() {
            return Ok(b);
        }
        self.read_byte()
    }

    fn peek(&mut self) -> Result<u8> {
        if let Some(b) = self.lookahead {
            return Ok(b);
        }
        let b = self.read_byte()?;
        self.lookahead = Some(b);
        Ok(b)
    }
}

/// Outcome of decoding one match instruction.
struct MatchResult {
    /// Number of raw literal bytes that must follow before the next match
    /// instruction (0..=3), taken from the low bits of the distance field.
    trailing_literals: usize,
    eos: bool,
}

fn copy_match(out: &mut Vec<u8>, distance: usize, length: usize) -> Result<()> {
    let start = out.len().checked_sub(distance).ok_or(Error::LookbehindOverrun)?;
    for i in 0..length {
        let b = out[start + i];
        out.push(b);
    }
    Ok(())
}

/// Decodes the M1 two-byte match: fixed length 2, distance packed across
/// the opcode's upper six bits and one trailing byte. Used only for the
/// instruction immediately following a literal run.
fn do_m1<S: ByteSource>(opcode: u8, input: &mut S, out: &mut Vec<u8>) -> Result<MatchResult> {
    let extra = input.next()?;
    let distance = (usize::from(opcode) >> 2) + (usize::from(extra) << 2) + 1;
    copy_match(out, distance, 2)?;
    Ok(MatchResult {
        trailing_literals: usize::from(opcode) & 3,
        eos: false,
    })
}

/// Dispatches a match instruction whose opcode is `>= 16` (M2/M3/M4), or an
/// opcode `< 16` reached via a match's trailing-literal continuation (which
/// is also an M1 match, identical to [`do_m1`]).
fn do_match<S: ByteSource>(opcode: u8, input: &mut S, out: &mut Vec<u8>) -> Result<MatchResult> {
    if opcode >= 64 {
        // M2: 3-bit length, 11-bit distance.
        let length = (usize::from(opcode) >> 5) + 1;
        let extra = input.next()?;
        let distance = ((usize::from(opcode) >> 2) & 0x07) + (usize::from(extra) << 3) + 1;
        copy_match(out, distance, length)?;
        Ok(MatchResult {
            trailing_literals: usize::from(opcode) & 3,
            eos: false,
        })
    } else if opcode >= 32 {
        // M3: 5-bit extensible length, 14-bit distance.
        let mut length = usize::from(opcode) & 0x1F;
        if length == 0 {
            input.extend_len(&mut length)?;
            length += 31;
        }
        length += 2;
        let word = input.read_u16le()?;
        let distance = (usize::from(word) >> 2) + 1;
        let trailing_literals = usize::from(word) & 3;
        copy_match(out, distance, length)?;
        Ok(MatchResult { trailing_literals, eos: false })
    } else if opcode >= 16 {
        // M4: 3-bit extensible length, distance up to 16384 + 0x4000 bias,
        // with one extra distance bit carried in the opcode.
        let mut length = usize::from(opcode) & 0x07;
        if length == 0 {
            input.extend_len(&mut length)?;
            length += 7;
        }
        length += 2;
        let word = input.read_u16le()?;
        let trailing_literals = usize::from(word) & 3;
        let raw = ((usize::from(opcode) & 0x08) << 11) + (usize::from(word) >> 2);
        if raw == 0 {
            return Ok(MatchResult { trailing_literals: 0, eos: true });
        }
        let distance = raw + 0x4000;
        copy_match(out, distance, length)?;
        Ok(MatchResult { trailing_literals, eos: false })
    } else {
        do_m1(opcode, input, out)
    }
}

fn decompress_from_source<S: ByteSource>(mut input: S, expected_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_size);

    // An initial opcode above 17 starts an extra-long literal run with no
    // length extension (used for an incompressible first block).
    let first = input.peek().unwrap_or(0);
    if first > 17 {
        input.next()?;
        let len = usize::from(first) - 17;
        for _ in 0..len {
            out.push(input.next()?);
        }
    }

    let mut expect_fresh = true;
    loop {
        let opcode = input.next()?;

        let result = if expect_fresh && opcode < 16 {
            let mut len = usize::from(opcode);
            if len == 0 {
                input.extend_len(&mut len)?;
                len += 15;
            }
            len += 3;
            for _ in 0..len {
                out.push(input.next()?);
            }
            // The instruction immediately following a literal run is
            // always a match, even when its opcode is < 16.
            let next_opcode = input.next()?;
            do_match(next_opcode, &mut input, &mut out)?
        } else {
            do_match(opcode, &mut input, &mut out)?
        };

        if result.eos {
            break;
        }

        if result.trailing_literals == 0 {
            expect_fresh = true;
        } else {
            for _ in 0..result.trailing_literals {
                out.push(input.next()?);
            }
            expect_fresh = false;
        }
    }

    match out.len().cmp(&expected_size) {
        std::cmp::Ordering::Equal => Ok(out),
        std::cmp::Ordering::Less => Err(Error::OutputUnderrunAtEos),
        std::cmp::Ordering::Greater => Err(Error::OutputOverrun),
    }
}

/// Decompresses `src` into exactly `expected_size` bytes.
pub fn decompress(src: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    decompress_from_source(Input::new(src), expected_size)
}

/// Decompresses directly off a [`std::io::Read`], for compressed spans
/// embedded in a larger stream whose length isn't known up front. Leaves
/// `r` positioned immediately after the LZO end-of-stream marker.
pub fn decompress_from_reader<R: std::io::Read>(r: &mut R, expected_size: usize) -> Result<Vec<u8>> {
    decompress_from_source(ReaderInput::new(r), expected_size)
}

/// Reader counterpart of [`decompress_auto`]: below [`RAW_THRESHOLD`]
/// bytes the payload is stored raw, otherwise it's LZO-framed.
pub fn decompress_auto_from_reader<R: std::io::Read>(r: &mut R, expected_size: usize) -> Result<Vec<u8>> {
    if expected_size < RAW_THRESHOLD {
        let mut buf = vec![0u8; expected_size];
        r.read_exact(&mut buf).map_err(|_| Error::InputOverrun)?;
        return Ok(buf);
    }
    decompress_from_reader(r, expected_size)
}

/// Chooses raw passthrough for small payloads (below [`RAW_THRESHOLD`]
/// decompressed bytes) instead of paying for LZO framing, matching the
/// convention used by condensed ODOL arrays and PAA mipmap storage.
pub fn decompress_auto(src: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    if expected_size < RAW_THRESHOLD {
        if src.len() < expected_size {
            return Err(Error::InputOverrun);
        }
        return Ok(src[..expected_size].to_vec());
    }
    decompress(src, expected_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Hand-assembled LZO1X-1 stream: an initial literal run of 4 bytes
    /// (opcode 0 + len-extension byte, encoding run length 1+3=4), then an
    /// M3 match copying 4 bytes at distance 4, then the M4 end marker.
    fn build_sample() -> (Vec<u8>, Vec<u8>) {
        let expected = vec![b'A', b'B', b'C', b'D', b'A', b'B', b'C', b'D'];
        let mut stream = Vec::new();
        // literal run: opcode 1 => len = 1 + 3 = 4 literal bytes
        stream.push(1);
        stream.extend_from_slice(b"ABCD");
        // M3 opcode: 0b0010_0010 = 0x22 -> base (opcode&0x1F)=2, length=2+2=4
        stream.push(0x22);
        // distance word: distance=4 -> raw = (distance-1)<<2 = 12 = 0x000C
        let word: u16 = ((4usize - 1) << 2) as u16;
        stream.extend_from_slice(&word.to_le_bytes());
        // M4 end marker: opcode 0x11 (>=16, &0x08==0, length field nonzero
        // so no extension needed), distance word producing raw==0
        stream.push(0x11);
        stream.extend_from_slice(&0u16.to_le_bytes());
        (stream, expected)
    }

    #[test]
    fn decodes_literal_run_then_match_then_eos() {
        let (stream, expected) = build_sample();
        let out = decompress(&stream, expected.len()).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn raw_passthrough_below_threshold() {
        let data = vec![1u8, 2, 3, 4, 5];
        let out = decompress_auto(&data, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn short_input_reports_overrun() {
        let stream = vec![1u8, b'A']; // claims 4 literal bytes, only gives 1
        assert!(matches!(decompress(&stream, 4), Err(Error::InputOverrun)));
    }

    #[test]
    fn size_mismatch_at_eos_is_reported() {
        let (stream, expected) = build_sample();
        let err = decompress(&stream, expected.len() + 1).unwrap_err();
        assert!(matches!(err, Error::OutputUnderrunAtEos));
    }

    #[test]
    fn decompress_from_reader_matches_slice_decompress() {
        let (stream, expected) = build_sample();
        let mut cursor = std::io::Cursor::new(stream);
        let out = decompress_from_reader(&mut cursor, expected.len()).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn decompress_auto_from_reader_passes_through_small_payloads() {
        let data = vec![9u8; 10];
        let mut cursor = std::io::Cursor::new(data.clone());
        let out = decompress_auto_from_reader(&mut cursor, data.len()).unwrap();
        assert_eq!(out, data);
    }
}
