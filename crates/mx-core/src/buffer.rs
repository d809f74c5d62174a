//! Multichannel f32 mix buffer with planar layout.

use alloc::vec;
use alloc::vec::Vec;

/// Maximum number of audio channels per buffer.
pub const MAX_CHANNELS: u16 = 8;

/// Default frames-per-tick block size.
pub const BLOCK_SIZE: usize = 256;

/// A multichannel f32 audio buffer in planar layout.
///
/// Data is stored as `channels` contiguous planes of `frames` samples each;
/// `data[ch * frames + frame]` addresses channel `ch` at `frame`. Buffers are
/// meant to be reused tick after tick: [`AudioBuffer::ensure_shape`] only
/// reallocates when the requested shape outgrows the existing allocation.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: u16,
    frames: usize,
}

impl AudioBuffer {
    /// Create a new silent buffer with the given dimensions.
    pub fn new(channels: u16, frames: usize) -> Self {
        Self {
            data: vec![0.0; channels as usize * frames],
            channels,
            frames,
        }
    }

    /// Reshape the buffer, growing the backing storage only when needed.
    ///
    /// Sample contents after a reshape are unspecified; callers on the render
    /// path follow this with [`AudioBuffer::silence`] or a full overwrite.
    pub fn ensure_shape(&mut self, channels: u16, frames: usize) {
        let needed = channels as usize * frames;
        if self.data.len() < needed {
            self.data.resize(needed, 0.0);
        }
        self.channels = channels;
        self.frames = frames;
    }

    /// Fill all samples with zero.
    pub fn silence(&mut self) {
        let used = self.channels as usize * self.frames;
        self.data[..used].fill(0.0);
    }

    /// Number of channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Read-only access to one channel's sample plane.
    pub fn channel(&self, ch: u16) -> &[f32] {
        let start = ch as usize * self.frames;
        &self.data[start..start + self.frames]
    }

    /// Mutable access to one channel's sample plane.
    pub fn channel_mut(&mut self, ch: u16) -> &mut [f32] {
        let start = ch as usize * self.frames;
        let len = self.frames;
        &mut self.data[start..start + len]
    }

    /// Become a copy of `source`, reshaping as needed.
    pub fn copy_from(&mut self, source: &AudioBuffer) {
        self.ensure_shape(source.channels, source.frames);
        let used = source.channels as usize * source.frames;
        self.data[..used].copy_from_slice(&source.data[..used]);
    }

    /// Sum overlapping channels from `source` into this buffer.
    pub fn mix_from(&mut self, source: &AudioBuffer) {
        self.mix_from_scaled(source, 1.0);
    }

    /// Sum overlapping channels from `source` into this buffer with gain.
    pub fn mix_from_scaled(&mut self, source: &AudioBuffer, gain: f32) {
        let chs = self.channels.min(source.channels);
        let frs = self.frames.min(source.frames);
        for ch in 0..chs {
            let dst = self.channel_mut(ch);
            let src = source.channel(ch);
            for i in 0..frs {
                dst[i] += src[i] * gain;
            }
        }
    }

    /// Sum `source` into this buffer with independent left/right gains.
    ///
    /// A mono source is broadcast to the first two channels (left gain on
    /// channel 0, right gain on channel 1); mono-to-mono collapses the two
    /// gains to their average. Multichannel sources apply the left gain to
    /// channel 0, the right gain to channel 1, and unity to any further
    /// overlapping channels.
    pub fn mix_from_panned(&mut self, source: &AudioBuffer, left: f32, right: f32) {
        if self.channels == 0 || source.channels == 0 {
            return;
        }
        let frs = self.frames.min(source.frames);
        if source.channels == 1 {
            if self.channels == 1 {
                let gain = 0.5 * (left + right);
                let dst = self.channel_mut(0);
                let src = source.channel(0);
                for i in 0..frs {
                    dst[i] += src[i] * gain;
                }
            } else {
                for (ch, gain) in [(0u16, left), (1u16, right)] {
                    let dst = self.channel_mut(ch);
                    let src = source.channel(0);
                    for i in 0..frs {
                        dst[i] += src[i] * gain;
                    }
                }
            }
            return;
        }
        let chs = self.channels.min(source.channels);
        for ch in 0..chs {
            let gain = match ch {
                0 => left,
                1 => right,
                _ => 1.0,
            };
            let dst = self.channel_mut(ch);
            let src = source.channel(ch);
            for i in 0..frs {
                dst[i] += src[i] * gain;
            }
        }
    }

    /// Scale all samples by `gain`.
    pub fn apply_gain(&mut self, gain: f32) {
        let used = self.channels as usize * self.frames;
        for s in &mut self.data[..used] {
            *s *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_silent() {
        let buf = AudioBuffer::new(2, 4);
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.frames(), 4);
        assert!(buf.channel(0).iter().all(|&s| s == 0.0));
        assert!(buf.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn channel_mut_writes_the_right_plane() {
        let mut buf = AudioBuffer::new(2, 2);
        buf.channel_mut(0)[0] = 1.0;
        buf.channel_mut(1)[1] = -0.5;
        assert_eq!(buf.channel(0), &[1.0, 0.0]);
        assert_eq!(buf.channel(1), &[0.0, -0.5]);
    }

    #[test]
    fn ensure_shape_grows_without_losing_dims() {
        let mut buf = AudioBuffer::new(1, 2);
        buf.ensure_shape(2, 8);
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.frames(), 8);
        buf.silence();
        assert!(buf.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn ensure_shape_shrink_keeps_working() {
        let mut buf = AudioBuffer::new(2, 8);
        buf.ensure_shape(2, 3);
        assert_eq!(buf.frames(), 3);
        buf.channel_mut(1)[2] = 0.25;
        assert_eq!(buf.channel(1)[2], 0.25);
    }

    #[test]
    fn silence_clears_data() {
        let mut buf = AudioBuffer::new(1, 2);
        buf.channel_mut(0)[0] = 1.0;
        buf.silence();
        assert_eq!(buf.channel(0), &[0.0, 0.0]);
    }

    #[test]
    fn copy_from_duplicates_shape_and_data() {
        let mut src = AudioBuffer::new(2, 3);
        src.channel_mut(0)[1] = 0.5;
        src.channel_mut(1)[2] = -0.25;

        let mut dst = AudioBuffer::new(1, 1);
        dst.copy_from(&src);
        assert_eq!(dst.channels(), 2);
        assert_eq!(dst.frames(), 3);
        assert_eq!(dst.channel(0), src.channel(0));
        assert_eq!(dst.channel(1), src.channel(1));
    }

    #[test]
    fn mix_from_sums_channels() {
        let mut dst = AudioBuffer::new(2, 2);
        dst.channel_mut(0)[0] = 0.5;

        let mut src = AudioBuffer::new(2, 2);
        src.channel_mut(0)[0] = 0.3;
        src.channel_mut(1)[1] = 0.7;

        dst.mix_from(&src);
        assert!((dst.channel(0)[0] - 0.8).abs() < 1e-6);
        assert!((dst.channel(1)[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn mix_from_scaled_applies_gain() {
        let mut dst = AudioBuffer::new(1, 2);
        let mut src = AudioBuffer::new(1, 2);
        src.channel_mut(0)[0] = 1.0;
        src.channel_mut(0)[1] = -1.0;

        dst.mix_from_scaled(&src, 0.5);
        assert!((dst.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((dst.channel(0)[1] - -0.5).abs() < 1e-6);
    }

    #[test]
    fn mix_from_mismatched_sizes_uses_minimum() {
        let mut dst = AudioBuffer::new(2, 4);
        let mut src = AudioBuffer::new(1, 2);
        src.channel_mut(0)[0] = 1.0;
        src.channel_mut(0)[1] = 2.0;

        dst.mix_from(&src);
        assert!((dst.channel(0)[0] - 1.0).abs() < 1e-6);
        assert!((dst.channel(0)[1] - 2.0).abs() < 1e-6);
        assert_eq!(dst.channel(0)[2], 0.0);
        assert_eq!(dst.channel(1)[0], 0.0);
    }

    #[test]
    fn mix_from_panned_broadcasts_mono() {
        let mut dst = AudioBuffer::new(2, 2);
        let mut src = AudioBuffer::new(1, 2);
        src.channel_mut(0)[0] = 1.0;
        src.channel_mut(0)[1] = -1.0;

        dst.mix_from_panned(&src, 1.0, 0.25);
        assert!((dst.channel(0)[0] - 1.0).abs() < 1e-6);
        assert!((dst.channel(1)[0] - 0.25).abs() < 1e-6);
        assert!((dst.channel(0)[1] - -1.0).abs() < 1e-6);
        assert!((dst.channel(1)[1] - -0.25).abs() < 1e-6);
    }

    #[test]
    fn mix_from_panned_stereo_is_a_balance() {
        let mut dst = AudioBuffer::new(2, 1);
        let mut src = AudioBuffer::new(2, 1);
        src.channel_mut(0)[0] = 0.8;
        src.channel_mut(1)[0] = 0.6;

        dst.mix_from_panned(&src, 0.5, 1.0);
        assert!((dst.channel(0)[0] - 0.4).abs() < 1e-6);
        assert!((dst.channel(1)[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn mix_from_panned_mono_to_mono_averages_gains() {
        let mut dst = AudioBuffer::new(1, 1);
        let mut src = AudioBuffer::new(1, 1);
        src.channel_mut(0)[0] = 1.0;

        dst.mix_from_panned(&src, 1.0, 0.5);
        assert!((dst.channel(0)[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn apply_gain_scales_all() {
        let mut buf = AudioBuffer::new(2, 1);
        buf.channel_mut(0)[0] = 1.0;
        buf.channel_mut(1)[0] = -0.5;
        buf.apply_gain(2.0);
        assert!((buf.channel(0)[0] - 2.0).abs() < 1e-6);
        assert!((buf.channel(1)[0] - -1.0).abs() < 1e-6);
    }
}
