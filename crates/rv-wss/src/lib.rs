//! Bohemia WSS0 and standard RIFF/WAVE audio reader.
//!
//! Extracts sample-rate/channel/format metadata and decodes PCM — WSS0's
//! nibble/byte ADPCM variants and WAV's 8/16-bit PCM — into interleaved
//! 16-bit samples. Decoding arbitrary compressed waveforms beyond this is
//! a playback concern, out of scope here.

mod adpcm;
mod error;

pub use error::{Error, Result};

use rv_binio::ReadExt;
use std::io::Read;

/// PCM source format as recorded by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Pcm,
    Delta4,
    Delta8,
}

impl Encoding {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Pcm => "PCM",
            Self::Delta4 => "Delta4",
            Self::Delta8 => "Delta8",
        }
    }
}

/// Decoded audio: metadata plus interleaved 16-bit PCM samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audio {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub encoding: Encoding,
    pub pcm: Vec<u8>,
}

impl Audio {
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        let num_samples = self.pcm.len() / 2;
        num_samples as f64 / f64::from(self.channels) / f64::from(self.sample_rate)
    }
}

fn read_wss<R: Read>(r: &mut R) -> Result<Audio> {
    let compression_raw = r.read_u32()?;
    let _format = r.read_u16()?;
    let channels = r.read_u16()?;
    let sample_rate = r.read_u32()?;
    let _bytes_per_sec = r.read_u32()?;
    let _block_align = r.read_u16()?;
    let bits_per_sample = r.read_u16()?;
    let _output_size = r.read_u16()?;

    let mut data = Vec::new();
    r.read_to_end(&mut data).map_err(rv_binio::Error::Io)?;

    let mut compression = compression_raw & 0xFF;
    if compression == 0 && data.len() % 2 != 0 {
        compression = 4;
    }

    let (pcm, encoding) = match compression {
        0 => (data, Encoding::Pcm),
        8 => (adpcm::decompress_byte(&data, channels), Encoding::Delta8),
        4 => (adpcm::decompress_nibble(&data, channels), Encoding::Delta4),
        other => return Err(Error::UnsupportedCompression(other)),
    };

    Ok(Audio { sample_rate, channels, bits_per_sample, encoding, pcm })
}

fn read_wav<R: Read>(r: &mut R) -> Result<Audio> {
    let _file_size = r.read_u32()?;
    let wave = r.read_signature()?;
    if &wave != b"WAVE" {
        return Err(Error::InvalidSignature(wave));
    }

    let mut audio_format = 0u16;
    let mut channels = 0u16;
    let mut sample_rate = 0u32;
    let mut bits_per_sample = 0u16;
    let mut raw_data = None;
    let mut got_fmt = false;

    loop {
        let chunk_id = match r.read_signature() {
            Ok(sig) => sig,
            Err(_) => break,
        };
        let chunk_size = r.read_u32()?;

        if &chunk_id == b"fmt " {
            audio_format = r.read_u16()?;
            channels = r.read_u16()?;
            sample_rate = r.read_u32()?;
            let _bytes_per_sec = r.read_u32()?;
            let _block_align = r.read_u16()?;
            bits_per_sample = r.read_u16()?;
            if chunk_size > 16 {
                let _ = r.read_bytes((chunk_size - 16) as usize)?;
            }
            got_fmt = true;
        } else if &chunk_id == b"data" {
            raw_data = Some(r.read_bytes(chunk_size as usize)?);
        } else {
            let _ = r.read_bytes(chunk_size as usize)?;
        }
        if chunk_size % 2 != 0 {
            let _ = r.read_u8();
        }
    }

    if !got_fmt {
        return Err(Error::MissingFmtChunk);
    }
    let raw_data = raw_data.ok_or(Error::MissingDataChunk)?;
    if audio_format != 1 {
        return Err(Error::UnsupportedAudioFormat(audio_format));
    }

    let pcm = match bits_per_sample {
        16 => raw_data,
        8 => {
            let mut out = Vec::with_capacity(raw_data.len() * 2);
            for byte in raw_data {
                let sample = (i16::from(byte) - 128) * 256;
                out.extend_from_slice(&sample.to_le_bytes());
            }
            out
        }
        other => return Err(Error::UnsupportedBitDepth(other)),
    };

    Ok(Audio { sample_rate, channels, bits_per_sample, encoding: Encoding::Pcm, pcm })
}

/// Dispatches on the leading four-byte signature (`WSS0` or `RIFF`).
pub fn read<R: Read>(r: &mut R) -> Result<Audio> {
    let sig = r.read_signature()?;
    match &sig {
        b"WSS0" => read_wss(r),
        b"RIFF" => read_wav(r),
        _ => Err(Error::InvalidSignature(sig)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn wav_bytes(channels: u16, sample_rate: u32, bps: u16, data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&0u32.to_le_bytes()); // file size, unchecked
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&(sample_rate * u32::from(channels) * u32::from(bps) / 8).to_le_bytes());
        buf.extend_from_slice(&(channels * bps / 8).to_le_bytes());
        buf.extend_from_slice(&bps.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn reads_16_bit_pcm_wav() {
        let data = [1u8, 0, 2, 0, 3, 0, 4, 0];
        let bytes = wav_bytes(2, 44100, 16, &data);
        let audio = read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.pcm, data);
    }

    #[test]
    fn upsamples_8_bit_pcm_to_16_bit() {
        let data = [128u8, 0, 255];
        let bytes = wav_bytes(1, 22050, 8, &data);
        let audio = read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(audio.pcm.len(), 6);
        // 128 -> 0 delta -> sample 0
        assert_eq!(&audio.pcm[0..2], &0i16.to_le_bytes());
    }

    #[test]
    fn rejects_non_pcm_wav_format() {
        let mut bytes = wav_bytes(1, 8000, 16, &[0, 0]);
        // audio_format field lives right after "fmt " + chunk size (8 bytes in).
        let fmt_offset = bytes.windows(4).position(|w| w == b"fmt ").unwrap() + 8;
        bytes[fmt_offset] = 2; // ADPCM, unsupported
        assert!(matches!(read(&mut Cursor::new(bytes)), Err(Error::UnsupportedAudioFormat(2))));
    }

    #[test]
    fn wss0_raw_pcm_round_trips() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"WSS0");
        buf.extend_from_slice(&0u32.to_le_bytes()); // compression 0 = PCM
        buf.extend_from_slice(&1u16.to_le_bytes()); // format
        buf.extend_from_slice(&1u16.to_le_bytes()); // channels
        buf.extend_from_slice(&22050u32.to_le_bytes()); // sample rate
        buf.extend_from_slice(&44100u32.to_le_bytes()); // bytes/sec
        buf.extend_from_slice(&2u16.to_le_bytes()); // block align
        buf.extend_from_slice(&16u16.to_le_bytes()); // bps
        buf.extend_from_slice(&4u16.to_le_bytes()); // output size
        buf.extend_from_slice(&[1, 0, 2, 0]); // 2 samples

        let audio = read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(audio.encoding, Encoding::Pcm);
        assert_eq!(audio.pcm, vec![1, 0, 2, 0]);
    }

    #[test]
    fn wss0_odd_length_raw_stream_is_reinterpreted_as_nibble_adpcm() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"WSS0");
        buf.extend_from_slice(&0u32.to_le_bytes()); // compression 0
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // channels
        buf.extend_from_slice(&8000u32.to_le_bytes());
        buf.extend_from_slice(&16000u32.to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.push(0x77); // odd-length body -> reinterpreted as nibble ADPCM

        let audio = read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(audio.encoding, Encoding::Delta4);
    }
}
