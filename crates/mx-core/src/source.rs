//! Decoded PCM sources.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::format::{AudioFormat, SampleFormat};

slotmap::new_key_type! {
    /// Key for referencing sources in the mix graph's source arena.
    pub struct SourceKey;
}

/// Backing storage for a source's raw PCM bytes.
///
/// `Owned` data lives as long as the source. `Static` holds a non-owning
/// view; the `'static` bound is the Rust form of the contract that the
/// memory outlives every voice created from the source (embedded assets,
/// leaked arenas).
#[derive(Clone, Debug)]
pub enum PcmData {
    Owned(Vec<u8>),
    Static(&'static [u8]),
}

impl PcmData {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PcmData::Owned(v) => v,
            PcmData::Static(s) => s,
        }
    }
}

/// Decoded audio: raw interleaved PCM bytes plus their fixed format.
#[derive(Clone, Debug)]
pub struct Source {
    name: ArrayString<32>,
    format: AudioFormat,
    data: PcmData,
}

impl Source {
    /// Create a source that copies and owns the given buffer.
    pub fn from_buffer(format: AudioFormat, bytes: &[u8]) -> Self {
        Self::from_vec(format, bytes.to_vec())
    }

    /// Create a source taking ownership of an already-allocated buffer.
    pub fn from_vec(format: AudioFormat, bytes: Vec<u8>) -> Self {
        Self {
            name: ArrayString::new(),
            format,
            data: PcmData::Owned(bytes),
        }
    }

    /// Create a source over caller-owned static memory (no copy).
    pub fn from_static(format: AudioFormat, bytes: &'static [u8]) -> Self {
        Self {
            name: ArrayString::new(),
            format,
            data: PcmData::Static(bytes),
        }
    }

    /// Attach a display name. Names beyond the fixed capacity are dropped.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name.clear();
        let _ = self.name.try_push_str(name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Number of complete frames in the source.
    pub fn frames(&self) -> usize {
        let frame_bytes = self.format.frame_bytes();
        if frame_bytes == 0 {
            return 0;
        }
        self.data.as_bytes().len() / frame_bytes
    }

    /// Returns true if the source holds no complete frame.
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Read one sample as f32 in [-1, 1].
    ///
    /// Out-of-range frames read as 0.0 so interpolation fades to silence at
    /// the tail. A channel index beyond the source's layout reads the last
    /// channel (mono sources answer every channel).
    pub fn read_f32(&self, ch: u16, frame: usize) -> f32 {
        if frame >= self.frames() {
            return 0.0;
        }
        let ch = ch.min(self.format.channels.saturating_sub(1)) as usize;
        let stride = self.format.sample_format.bytes_per_sample();
        let offset = (frame * self.format.channels as usize + ch) * stride;
        let bytes = self.data.as_bytes();
        match self.format.sample_format {
            SampleFormat::Pcm8 => (bytes[offset] as f32 - 128.0) / 128.0,
            SampleFormat::Pcm16 => {
                let v = i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
                v as f32 / 32768.0
            }
            SampleFormat::Pcm24 => {
                let raw =
                    bytes[offset] as u32 | (bytes[offset + 1] as u32) << 8 | (bytes[offset + 2] as u32) << 16;
                // Sign-extend from bit 23.
                let v = ((raw << 8) as i32) >> 8;
                v as f32 / 8_388_608.0
            }
            SampleFormat::Pcm32 => {
                let v = i32::from_le_bytes([
                    bytes[offset],
                    bytes[offset + 1],
                    bytes[offset + 2],
                    bytes[offset + 3],
                ]);
                v as f32 / 2_147_483_648.0
            }
            SampleFormat::PcmFloat => f32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]),
        }
    }

    /// Read a linearly interpolated sample at a 16.16 fixed-point position.
    ///
    /// Blends the two nearest frames using the fractional part; past the last
    /// frame the missing neighbor reads as 0.0.
    pub fn read_f32_lerp(&self, ch: u16, pos_fixed: u64) -> f32 {
        let idx = (pos_fixed >> 16) as usize;
        let frac = (pos_fixed & 0xFFFF) as f32 / 65536.0;
        let a = self.read_f32(ch, idx);
        let b = self.read_f32(ch, idx + 1);
        a + (b - a) * frac
    }
}
