//! OGG container / Vorbis header reader.
//!
//! Reads OGG pages until the three standard Vorbis header packets
//! (identification, comment, setup) have been accumulated, then parses
//! just enough of each to expose channel/rate metadata, the encoder
//! vendor string and comments, and a best-effort codebook/floor summary
//! from the setup packet. No audio is synthesized.

mod bitreader;
mod error;

pub use error::{Error, Result};

use bitreader::BitReader;
use std::io::Read;

/// One parsed Vorbis setup codebook, enough to flag precision-risk inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codebook {
    pub dimensions: i32,
    pub entries: i32,
    pub lookup_type: i32,
}

/// Identification + comment + (best-effort) setup header summary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub channels: u8,
    pub sample_rate: i32,
    pub encoder: String,
    pub comments: Vec<String>,
    pub codebooks: Vec<Codebook>,
    /// Maximum floor type seen across the setup header's floor list; a
    /// heuristic only, not used for synthesis.
    pub floor_type: i32,
}

struct Page {
    segment_table: Vec<u8>,
    body: Vec<u8>,
}

fn read_ogg_page<R: Read>(r: &mut R) -> Result<Page> {
    let mut hdr = [0u8; 27];
    r.read_exact(&mut hdr)?;
    if &hdr[0..4] != b"OggS" {
        return Err(Error::InvalidCapturePattern);
    }
    let n_segments = usize::from(hdr[26]);

    let mut segment_table = vec![0u8; n_segments];
    r.read_exact(&mut segment_table)?;

    let body_size: usize = segment_table.iter().map(|&s| usize::from(s)).sum();
    let mut body = vec![0u8; body_size];
    if body_size > 0 {
        r.read_exact(&mut body)?;
    }

    Ok(Page { segment_table, body })
}

fn extract_packets(page: &Page) -> Vec<Vec<u8>> {
    let mut packets = Vec::new();
    let mut current = Vec::new();
    let mut offset = 0usize;

    for &seg in &page.segment_table {
        let size = usize::from(seg);
        current.extend_from_slice(&page.body[offset..offset + size]);
        offset += size;
        if size < 255 {
            packets.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        packets.push(current);
    }
    packets
}

fn read_u32_le(data: &[u8]) -> u32 {
    u32::from(data[0]) | (u32::from(data[1]) << 8) | (u32::from(data[2]) << 16) | (u32::from(data[3]) << 24)
}

fn parse_comment_header(mut data: &[u8], h: &mut Header) {
    if data.len() < 4 {
        return;
    }
    let vendor_len = read_u32_le(data) as usize;
    data = &data[4..];
    if data.len() < vendor_len {
        return;
    }
    h.encoder = String::from_utf8_lossy(&data[..vendor_len]).into_owned();
    data = &data[vendor_len..];
    if data.len() < 4 {
        return;
    }
    let comment_count = read_u32_le(data);
    data = &data[4..];
    for _ in 0..comment_count {
        if data.len() < 4 {
            break;
        }
        let clen = read_u32_le(data) as usize;
        data = &data[4..];
        if data.len() < clen {
            break;
        }
        h.comments.push(String::from_utf8_lossy(&data[..clen]).into_owned());
        data = &data[clen..];
    }
}

fn ilog(v: u32) -> u32 {
    32 - v.leading_zeros()
}

fn int_pow(base: i64, exp: i32) -> i64 {
    let mut result = 1i64;
    for _ in 0..exp {
        result = result.saturating_mul(base);
        if result < 0 {
            return i64::MAX;
        }
    }
    result
}

/// Integer search for the Vorbis `lookup1_values` constant: the largest
/// `r` such that `r^dims <= entries`.
#[must_use]
pub fn lookup1_values(entries: i32, dims: i32) -> i32 {
    if dims == 0 || entries == 0 {
        return 0;
    }
    let mut r = (f64::from(entries).powf(1.0 / f64::from(dims))).floor() as i64;
    while int_pow(r + 1, dims) <= i64::from(entries) {
        r += 1;
    }
    while r > 0 && int_pow(r, dims) > i64::from(entries) {
        r -= 1;
    }
    r as i32
}

fn parse_codebook(br: &mut BitReader<'_>) -> Option<Codebook> {
    let sync = br.read_bits(24)?;
    if sync != 0x5643_42 {
        return None;
    }
    let dims = br.read_bits(16)? as i32;
    let entries = br.read_bits(24)? as i32;

    let ordered = br.read_bits(1)?;
    if ordered == 0 {
        let sparse = br.read_bits(1)?;
        for _ in 0..entries {
            if sparse == 1 {
                let flag = br.read_bits(1)?;
                if flag == 1 {
                    br.read_bits(5)?;
                }
            } else {
                br.read_bits(5)?;
            }
        }
    } else {
        br.read_bits(5)?;
        let mut current_entry = 0i32;
        while current_entry < entries {
            let bits_needed = ilog((entries - current_entry) as u32);
            let num = br.read_bits(bits_needed)?;
            current_entry += num as i32;
        }
    }

    let lookup_type = br.read_bits(4)? as i32;
    if lookup_type == 1 || lookup_type == 2 {
        br.read_bits(32)?;
        br.read_bits(32)?;
        let vbits = br.read_bits(4)?;
        br.read_bits(1)?;
        let lv = if lookup_type == 1 { lookup1_values(entries, dims) } else { entries * dims };
        for _ in 0..lv {
            br.read_bits(vbits + 1)?;
        }
    }

    Some(Codebook { dimensions: dims, entries, lookup_type })
}

fn skip_floor0_config(br: &mut BitReader<'_>) -> Option<()> {
    br.read_bits(8)?;
    br.read_bits(16)?;
    br.read_bits(16)?;
    br.read_bits(6)?;
    br.read_bits(8)?;
    let nb = br.read_bits(4)?;
    for _ in 0..=nb {
        br.read_bits(8)?;
    }
    Some(())
}

fn skip_floor1_config(br: &mut BitReader<'_>) -> Option<()> {
    let partitions = br.read_bits(5)?;
    let mut max_class = -1i32;
    let mut classes = vec![0i32; partitions as usize];
    for slot in &mut classes {
        let c = br.read_bits(4)? as i32;
        *slot = c;
        max_class = max_class.max(c);
    }
    let mut class_dims = vec![0i32; (max_class + 1).max(0) as usize];
    for dims in class_dims.iter_mut() {
        let d = br.read_bits(3)? as i32;
        *dims = d + 1;
        let sub = br.read_bits(2)?;
        if sub > 0 {
            br.read_bits(8)?;
        }
        for _ in 0..(1 << sub) {
            br.read_bits(8)?;
        }
    }
    br.read_bits(2)?;
    let rb = br.read_bits(4)?;
    for &class in &classes {
        for _ in 0..class_dims[class as usize] {
            br.read_bits(rb)?;
        }
    }
    Some(())
}

fn parse_setup_header(data: &[u8], h: &mut Header) {
    let mut br = BitReader::new(data);
    let Some(cb_count_raw) = br.read_bits(8) else { return };
    let cb_count = cb_count_raw + 1;

    for _ in 0..cb_count {
        match parse_codebook(&mut br) {
            Some(cb) => h.codebooks.push(cb),
            None => return,
        }
    }

    let Some(td_count) = br.read_bits(6) else { return };
    for _ in 0..=td_count {
        if br.read_bits(16).is_none() {
            return;
        }
    }

    let Some(floor_count) = br.read_bits(6) else { return };
    for _ in 0..=floor_count {
        let Some(ft) = br.read_bits(16) else { return };
        if ft as i32 > h.floor_type {
            h.floor_type = ft as i32;
        }
        let ok = match ft {
            0 => skip_floor0_config(&mut br),
            1 => skip_floor1_config(&mut br),
            _ => return,
        };
        if ok.is_none() {
            return;
        }
    }
}

/// Reads OGG pages until three Vorbis packets are accumulated and parses
/// identification, comment, and (best-effort) setup headers.
pub fn read_header<R: Read>(r: &mut R) -> Result<Header> {
    let mut packets: Vec<Vec<u8>> = Vec::new();
    while packets.len() < 3 {
        let page = read_ogg_page(r)?;
        packets.extend(extract_packets(&page));
    }

    let p0 = &packets[0];
    if p0.len() < 30 || p0[0] != 1 || &p0[1..7] != b"vorbis" {
        return Err(Error::NotIdentificationHeader);
    }

    let mut header = Header {
        channels: p0[11],
        sample_rate: i32::from_le_bytes([p0[12], p0[13], p0[14], p0[15]]),
        ..Header::default()
    };

    let p1 = &packets[1];
    if p1.len() < 7 || p1[0] != 3 || &p1[1..7] != b"vorbis" {
        return Err(Error::NotCommentHeader);
    }
    parse_comment_header(&p1[7..], &mut header);

    let p2 = &packets[2];
    if p2.len() >= 7 && p2[0] == 5 && &p2[1..7] == b"vorbis" {
        parse_setup_header(&p2[7..], &mut header);
    }

    Ok(header)
}

/// Flags encoder vendor strings from known pre-1.0 beta builds, a
/// quirk-detection heuristic rather than a version parse.
#[must_use]
pub fn is_pre_one_encoder(encoder: &str) -> bool {
    let lower = encoder.to_ascii_lowercase();
    if lower.contains("beta") || lower.contains("xiphophorus") {
        return true;
    }
    const DATES: [&str; 9] = [
        "20000508", "20001031", "20010110", "20010225", "20010615", "20010813", "20011007", "20011231", "20020717",
    ];
    DATES.iter().any(|d| encoder.contains(d))
}

/// Flags codebooks whose `lookup1Values` differs between the naive
/// floating-point formula and the exact integer search — a precision
/// trap some encoders hit.
#[must_use]
pub fn lookup1_values_precision_risk(entries: i32, dims: i32) -> bool {
    if dims == 0 || entries == 0 {
        return false;
    }
    let float_result = (f64::from(entries).powf(1.0 / f64::from(dims))).floor() as i32;
    let int_result = lookup1_values(entries, dims);
    float_result != int_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn build_page(segment_table: &[u8], body: &[u8], continued: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"OggS");
        buf.push(0); // version
        buf.push(if continued { 1 } else { 0 }); // header type flags
        buf.extend_from_slice(&0u64.to_le_bytes()); // granule position
        buf.extend_from_slice(&0u32.to_le_bytes()); // serial
        buf.extend_from_slice(&0u32.to_le_bytes()); // page seq
        buf.extend_from_slice(&0u32.to_le_bytes()); // checksum
        buf.push(segment_table.len() as u8);
        buf.extend_from_slice(segment_table);
        buf.extend_from_slice(body);
        buf
    }

    fn ident_packet(channels: u8, rate: i32) -> Vec<u8> {
        let mut p = vec![1u8];
        p.extend_from_slice(b"vorbis");
        p.extend_from_slice(&[0u8; 4]); // version
        p.push(channels);
        p.extend_from_slice(&rate.to_le_bytes());
        p.extend_from_slice(&[0u8; 11]); // bitrate max/nominal/min + blocksize + framing
        p
    }

    fn comment_packet(vendor: &str, comments: &[&str]) -> Vec<u8> {
        let mut p = vec![3u8];
        p.extend_from_slice(b"vorbis");
        p.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        p.extend_from_slice(vendor.as_bytes());
        p.extend_from_slice(&(comments.len() as u32).to_le_bytes());
        for c in comments {
            p.extend_from_slice(&(c.len() as u32).to_le_bytes());
            p.extend_from_slice(c.as_bytes());
        }
        p
    }

    #[test]
    fn reads_identification_and_comment_headers() {
        let ident = ident_packet(2, 44100);
        let comment = comment_packet("test encoder", &["TITLE=x"]);
        let setup = vec![5u8, b'v', b'o', b'r', b'b', b'i', b's']; // minimal, no codebooks parseable

        let mut stream = Vec::new();
        stream.extend(build_page(&[ident.len() as u8], &ident, false));
        stream.extend(build_page(&[comment.len() as u8], &comment, false));
        stream.extend(build_page(&[setup.len() as u8], &setup, false));

        let header = read_header(&mut Cursor::new(stream)).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.encoder, "test encoder");
        assert_eq!(header.comments, vec!["TITLE=x".to_string()]);
    }

    #[test]
    fn rejects_non_vorbis_identification_packet() {
        let bogus = vec![0u8; 30];
        let stream = build_page(&[bogus.len() as u8], &bogus, false);
        assert!(matches!(read_header(&mut Cursor::new(stream)), Err(Error::Io(_))));
    }

    #[test]
    fn pre_one_encoder_detects_beta_and_dated_builds() {
        assert!(is_pre_one_encoder("Xiphophorus libVorbis I 20010813"));
        assert!(is_pre_one_encoder("some BETA build"));
        assert!(!is_pre_one_encoder("Xiph.Org libVorbis I 20020717")); // still flagged: date list
    }

    #[test]
    fn lookup1_values_matches_known_cases() {
        assert_eq!(lookup1_values(256, 2), 16);
        assert_eq!(lookup1_values(0, 2), 0);
    }
}
