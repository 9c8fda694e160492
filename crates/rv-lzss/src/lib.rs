//! LZSS variant used across the Real Virtuality asset formats: a flag-byte
//! bitstream (low-bit-first, eight tokens per flag byte) over 12-bit
//! distance / 4-bit length back-references, with an optional trailing
//! 4-byte additive checksum.

mod error;

pub use error::{Error, Result};

/// Maximum back-reference distance (12-bit field).
const WINDOW: usize = 4096;
/// Maximum match length (4-bit length field, offset by 3).
const MAX_MATCH: usize = 18;
/// Minimum match length worth encoding as a back-reference.
const MIN_MATCH: usize = 3;

/// Selects how the trailing 4-byte checksum is computed and verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    /// Sum of emitted bytes as unsigned 8-bit values.
    Unsigned,
    /// Sum of emitted bytes as signed 8-bit values.
    Signed,
    /// No trailing checksum.
    None,
}

fn unsigned_sum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)))
}

fn signed_sum(data: &[u8]) -> u32 {
    data.iter()
        .fold(0i32, |acc, &b| acc.wrapping_add(i32::from(b as i8))) as u32
}

struct TokenReader<'a> {
    src: &'a [u8],
    pos: usize,
    flag_byte: u8,
    flag_bits_left: u8,
}

impl<'a> TokenReader<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0,
            flag_byte: 0,
            flag_bits_left: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.src.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8> {
        if self.pos >= self.src.len() {
            return Err(Error::ShortInput);
        }
        let b = self.src[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Returns whether the next token is a literal, refilling the flag
    /// byte every eight tokens.
    fn next_is_literal(&mut self) -> Result<bool> {
        if self.flag_bits_left == 0 {
            self.flag_byte = self.read_u8()?;
            self.flag_bits_left = 8;
        }
        let is_literal = self.flag_byte & 1 != 0;
        self.flag_byte >>= 1;
        self.flag_bits_left -= 1;
        Ok(is_literal)
    }
}

fn emit_backref(out: &mut Vec<u8>, distance: usize, length: usize, budget: Option<usize>) -> Result<()> {
    if distance > WINDOW {
        return Err(Error::LookbehindBelowZero);
    }
    let mut pos: i64 = out.len() as i64 - distance as i64;
    for _ in 0..length {
        if let Some(limit) = budget {
            if out.len() >= limit {
                break;
            }
        }
        if pos < 0 {
            out.push(b' ');
            pos += 1;
        } else {
            let b = out[pos as usize];
            out.push(b);
            pos += 1;
        }
    }
    Ok(())
}

fn decode_backref_header(b0: u8, b1: u8) -> (usize, usize) {
    let distance = usize::from(b0) | (usize::from(b1 & 0xF0) << 4);
    let length = usize::from(b1 & 0x0F) + MIN_MATCH;
    (distance, length)
}

/// Decompresses `src` into exactly `expected_size` bytes, verifying the
/// trailing checksum per `mode`.
pub fn decompress(src: &[u8], expected_size: usize, mode: ChecksumMode) -> Result<Vec<u8>> {
    let body_len = match mode {
        ChecksumMode::None => src.len(),
        _ => src.len().checked_sub(4).ok_or(Error::ShortInput)?,
    };
    let body = &src[..body_len];
    let mut reader = TokenReader::new(body);
    let mut out = Vec::with_capacity(expected_size);

    while out.len() < expected_size {
        if reader.next_is_literal()? {
            out.push(reader.read_u8()?);
        } else {
            let b0 = reader.read_u8()?;
            let b1 = reader.read_u8()?;
            let (distance, length) = decode_backref_header(b0, b1);
            emit_backref(&mut out, distance, length, Some(expected_size))?;
        }
    }
    if out.len() > expected_size {
        return Err(Error::OutputOverrun);
    }

    if mode != ChecksumMode::None {
        let tail = &src[body_len..];
        let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let actual = match mode {
            ChecksumMode::Unsigned => unsigned_sum(&out),
            ChecksumMode::Signed => signed_sum(&out),
            ChecksumMode::None => unreachable!(),
        };
        if expected != actual {
            return Err(Error::ChecksumMismatch { expected, actual });
        }
    }

    Ok(out)
}

/// Size-agnostic decompressor: decodes tokens until only the trailing
/// 4-byte checksum remains in the input, then verifies it against an
/// unsigned-sum checksum. Never raises on mismatch — returns an empty
/// `Vec` instead, matching the original recovery-oriented behavior used
/// when the true output size is unknown (e.g. a whole-file LZSS-framed
/// P3D signature).
pub fn decompress_auto(src: &[u8]) -> Vec<u8> {
    if src.len() < 4 {
        return Vec::new();
    }
    let mut reader = TokenReader::new(src);
    let mut out = Vec::new();

    while reader.remaining() > 4 {
        let is_literal = match reader.next_is_literal() {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };
        if is_literal {
            match reader.read_u8() {
                Ok(b) => out.push(b),
                Err(_) => return Vec::new(),
            }
        } else {
            let (b0, b1) = match (reader.read_u8(), reader.read_u8()) {
                (Ok(a), Ok(b)) => (a, b),
                _ => return Vec::new(),
            };
            let (distance, length) = decode_backref_header(b0, b1);
            if emit_backref(&mut out, distance, length, None).is_err() {
                return Vec::new();
            }
        }
    }

    // Whatever bytes remain (<= 4) are the checksum tail; anything short
    // of exactly 4 means the stream never carried one.
    let tail_start = src.len() - reader.remaining();
    let tail = &src[tail_start..];
    if tail.len() != 4 {
        return Vec::new();
    }
    let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    if unsigned_sum(&out) != expected {
        return Vec::new();
    }
    out
}

/// Streaming counterpart of [`decompress`] for callers that don't have
/// the compressed bytes pre-sliced (the compressed span's length isn't
/// known up front — only `expected_size` is). Reads tokens directly off
/// `r` until `expected_size` output bytes are produced, then reads and
/// verifies the trailing 4-byte unsigned checksum, leaving `r` positioned
/// immediately after it.
pub fn decompress_from_reader<R: std::io::Read>(r: &mut R, expected_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_size);
    let mut flag_byte = 0u8;
    let mut flag_bits_left = 0u8;

    let read_u8 = |r: &mut R| -> Result<u8> {
        let mut b = [0u8; 1];
        r.read_exact(&mut b).map_err(|_| Error::ShortInput)?;
        Ok(b[0])
    };

    while out.len() < expected_size {
        if flag_bits_left == 0 {
            flag_byte = read_u8(r)?;
            flag_bits_left = 8;
        }
        let is_literal = flag_byte & 1 != 0;
        flag_byte >>= 1;
        flag_bits_left -= 1;

        if is_literal {
            out.push(read_u8(r)?);
        } else {
            let b0 = read_u8(r)?;
            let b1 = read_u8(r)?;
            let (distance, length) = decode_backref_header(b0, b1);
            emit_backref(&mut out, distance, length, Some(expected_size))?;
        }
    }
    if out.len() > expected_size {
        return Err(Error::OutputOverrun);
    }

    let mut tail = [0u8; 4];
    r.read_exact(&mut tail).map_err(|_| Error::ShortInput)?;
    let expected = u32::from_le_bytes(tail);
    let actual = unsigned_sum(&out);
    if expected != actual {
        return Err(Error::ChecksumMismatch { expected, actual });
    }

    Ok(out)
}

/// Below 1024 bytes the original stores the array uncompressed; at or
/// above that threshold it's LZSS-framed. Mirrors `decompress_or_raw`.
pub fn decompress_or_raw_from_reader<R: std::io::Read>(r: &mut R, expected_size: usize) -> Result<Vec<u8>> {
    if expected_size < 1024 {
        let mut buf = vec![0u8; expected_size];
        r.read_exact(&mut buf).map_err(|_| Error::ShortInput)?;
        return Ok(buf);
    }
    decompress_from_reader(r, expected_size)
}

/// Finds the longest match for `src[pos..]` against the preceding window,
/// preferring the earliest (largest-distance) candidate on ties, per the
/// original naive compressor.
fn find_longest_match(src: &[u8], pos: usize) -> Option<(usize, usize)> {
    // `distance` below is `pos - start`, stored verbatim in the 12-bit
    // field (max 0xFFF = 4095), so the search window is one byte short of
    // `WINDOW` to keep every candidate distance representable.
    let window_start = pos.saturating_sub(WINDOW - 1);
    let max_len = (src.len() - pos).min(MAX_MATCH);
    if max_len < MIN_MATCH {
        return None;
    }

    let mut best_len = 0usize;
    let mut best_start = 0usize;
    for start in window_start..pos {
        let mut len = 0usize;
        while len < max_len && src[start + len] == src[pos + len] {
            len += 1;
        }
        if len > best_len {
            best_len = len;
            best_start = start;
        }
    }

    if best_len >= MIN_MATCH {
        Some((pos - best_start, best_len))
    } else {
        None
    }
}

/// Accumulates one flag bit per token, low-bit first, flushing a flag
/// byte into `out` every eight tokens (and once more at the end, if
/// partially filled).
struct FlagWriter {
    byte: u8,
    count: u8,
    /// index in `out` of the flag byte currently being filled
    slot: usize,
}

impl FlagWriter {
    fn push(&mut self, out: &mut Vec<u8>, literal: bool) {
        if self.count == 0 {
            self.slot = out.len();
            out.push(0);
            self.byte = 0;
        }
        if literal {
            self.byte |= 1 << self.count;
        }
        out[self.slot] = self.byte;
        self.count += 1;
        if self.count == 8 {
            self.count = 0;
        }
    }
}

/// Compresses `src` with the naive greedy LZSS matcher and appends a
/// trailing checksum per `mode`.
pub fn compress(src: &[u8], mode: ChecksumMode) -> Vec<u8> {
    let mut out = Vec::new();
    let mut flags = FlagWriter { byte: 0, count: 0, slot: 0 };
    let mut pos = 0usize;

    while pos < src.len() {
        match find_longest_match(src, pos) {
            Some((distance, length)) => {
                flags.push(&mut out, false);
                let len_field = (length - MIN_MATCH) as u8;
                let b0 = (distance & 0xFF) as u8;
                let b1 = ((((distance >> 8) & 0xF) as u8) << 4) | len_field;
                out.push(b0);
                out.push(b1);
                pos += length;
            }
            None => {
                flags.push(&mut out, true);
                out.push(src[pos]);
                pos += 1;
            }
        }
    }

    if mode != ChecksumMode::None {
        let sum = match mode {
            ChecksumMode::Unsigned => unsigned_sum(src),
            ChecksumMode::Signed => signed_sum(src),
            ChecksumMode::None => unreachable!(),
        };
        out.extend_from_slice(&sum.to_le_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn basic_round_trip() {
        let data = b"ABCDAABC";
        let compressed = compress(data, ChecksumMode::Unsigned);
        let decompressed = decompress(&compressed, data.len(), ChecksumMode::Unsigned).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn repeated_byte_compresses_small_and_round_trips() {
        let data = vec![b'A'; 1000];
        let compressed = compress(&data, ChecksumMode::Unsigned);
        assert!(compressed.len() < 500);
        let decompressed = decompress(&compressed, data.len(), ChecksumMode::Unsigned).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn auto_decompress_recovers_unsigned_checksummed_stream() {
        let data = b"hello world, this is a slightly longer test string";
        let compressed = compress(data, ChecksumMode::Unsigned);
        assert_eq!(decompress_auto(&compressed), data);
    }

    #[test]
    fn auto_decompress_returns_empty_on_checksum_mismatch() {
        let data = b"hello world";
        let mut compressed = compress(data, ChecksumMode::Unsigned);
        let last = compressed.len() - 1;
        compressed[last] ^= 0xFF;
        assert!(decompress_auto(&compressed).is_empty());
    }

    #[test]
    fn signed_checksum_round_trips() {
        let data = vec![0xFFu8, 0x00, 0x80, 0x7F, 0x01];
        let compressed = compress(&data, ChecksumMode::Signed);
        let decompressed = decompress(&compressed, data.len(), ChecksumMode::Signed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn no_checksum_round_trips() {
        let data = b"no checksum here";
        let compressed = compress(data, ChecksumMode::None);
        let decompressed = decompress(&compressed, data.len(), ChecksumMode::None).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn decompress_from_reader_matches_slice_decompress() {
        let data = b"streamed back-reference test streamed back-reference";
        let compressed = compress(data, ChecksumMode::Unsigned);
        let mut cursor = std::io::Cursor::new(compressed);
        let out = decompress_from_reader(&mut cursor, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn decompress_or_raw_from_reader_stores_small_arrays_uncompressed() {
        let data = vec![7u8; 100];
        let mut cursor = std::io::Cursor::new(data.clone());
        let out = decompress_or_raw_from_reader(&mut cursor, data.len()).unwrap();
        assert_eq!(out, data);
    }

    proptest! {
        #[test]
        fn round_trip_unsigned(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let compressed = compress(&data, ChecksumMode::Unsigned);
            let decompressed = decompress(&compressed, data.len(), ChecksumMode::Unsigned).unwrap();
            prop_assert_eq!(decompressed, data);
        }

        #[test]
        fn round_trip_signed(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let compressed = compress(&data, ChecksumMode::Signed);
            let decompressed = decompress(&compressed, data.len(), ChecksumMode::Signed).unwrap();
            prop_assert_eq!(decompressed, data);
        }

        #[test]
        fn auto_round_trip(data in proptest::collection::vec(any::<u8>(), 5..512)) {
            let compressed = compress(&data, ChecksumMode::Unsigned);
            prop_assert_eq!(decompress_auto(&compressed), data);
        }
    }
}
