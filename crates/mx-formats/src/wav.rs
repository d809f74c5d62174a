//! WAV encoding and decoding for PCM audio.

use crate::DecodeError;
use mx_core::{AudioFormat, SampleFormat};
use std::io::Write;

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

// --- Decoding ---

/// Decode a WAV file into its format descriptor and raw interleaved PCM.
///
/// Accepts integer PCM at 8/16/24/32 bits and 32-bit IEEE float. Anything
/// else fails with [`DecodeError::UnsupportedEncoding`] — there is no
/// fallback format. The returned bytes are the data chunk verbatim,
/// trimmed to whole frames, in exactly the layout `mx_core::Source`
/// reads.
pub fn decode_wav(data: &[u8]) -> Result<(AudioFormat, Vec<u8>), DecodeError> {
    let header = parse_header(data)?;

    let float = header.format_tag == FORMAT_IEEE_FLOAT;
    let sample_format = SampleFormat::from_bit_depth(header.bits_per_sample, float)
        .map_err(|_| DecodeError::UnsupportedEncoding)?;
    let format = AudioFormat::new(sample_format, header.num_channels, header.sample_rate);

    let end = (header.data_offset + header.data_size).min(data.len());
    let raw = &data[header.data_offset..end];
    let frame_bytes = format.frame_bytes();
    let whole = (raw.len() / frame_bytes) * frame_bytes;
    Ok((format, raw[..whole].to_vec()))
}

struct WavHeader {
    format_tag: u16,
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_offset: usize,
    data_size: usize,
}

fn parse_header(data: &[u8]) -> Result<WavHeader, DecodeError> {
    if data.len() < 44 {
        return Err(DecodeError::UnexpectedEof);
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(DecodeError::InvalidHeader);
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    let mut data_chunk: Option<(usize, usize)> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32_le(data, pos + 4) as usize;

        if chunk_id == b"fmt " && chunk_size >= 16 {
            if pos + 24 > data.len() {
                return Err(DecodeError::UnexpectedEof);
            }
            let tag = read_u16_le(data, pos + 8);
            let channels = read_u16_le(data, pos + 10);
            let rate = read_u32_le(data, pos + 12);
            let bits = read_u16_le(data, pos + 22);
            fmt = Some((tag, channels, rate, bits));
        } else if chunk_id == b"data" {
            data_chunk = Some((pos + 8, chunk_size));
        }

        pos += 8 + chunk_size;
        if pos % 2 != 0 {
            pos += 1;
        }
    }

    let (format_tag, num_channels, sample_rate, bits_per_sample) =
        fmt.ok_or(DecodeError::InvalidHeader)?;
    let (data_offset, data_size) = data_chunk.ok_or(DecodeError::InvalidHeader)?;

    if format_tag != FORMAT_PCM && format_tag != FORMAT_IEEE_FLOAT {
        return Err(DecodeError::UnsupportedEncoding);
    }
    if num_channels == 0 || sample_rate == 0 {
        return Err(DecodeError::InvalidHeader);
    }
    if data_offset > data.len() {
        return Err(DecodeError::UnexpectedEof);
    }

    Ok(WavHeader {
        format_tag,
        num_channels,
        sample_rate,
        bits_per_sample,
        data_offset,
        data_size,
    })
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

// --- Encoding ---

/// Write interleaved f32 samples as a 16-bit PCM WAV.
pub fn write_wav(
    w: &mut impl Write,
    samples: &[f32],
    sample_rate: u32,
    num_channels: u16,
) -> std::io::Result<()> {
    let bits_per_sample: u16 = 16;
    let block_align = num_channels * (bits_per_sample / 8);
    let frames = samples.len() / num_channels.max(1) as usize;
    let data_size = frames as u32 * block_align as u32;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, num_channels, sample_rate, block_align, bits_per_sample)?;

    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for &sample in &samples[..frames * num_channels as usize] {
        let clamped = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        w.write_all(&clamped.to_le_bytes())?;
    }
    Ok(())
}

/// Encode interleaved f32 samples to an in-memory 16-bit WAV.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32, num_channels: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    write_wav(&mut buf, samples, sample_rate, num_channels).expect("Vec<u8> write cannot fail");
    buf
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

fn write_fmt_chunk(
    w: &mut impl Write,
    num_channels: u16,
    sample_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
) -> std::io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&FORMAT_PCM.to_le_bytes())?;
    w.write_all(&num_channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits_per_sample.to_le_bytes())
}
