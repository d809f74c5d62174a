//! Voice: one playing instance of a source.

use mx_core::{AudioBuffer, EffectChain, Error, Source, SourceKey};

use crate::resample::{increment_for, FP_SHIFT, MIN_PITCH};
use crate::submix::SubmixKey;

slotmap::new_key_type! {
    /// Key for referencing voices in the mix graph's voice arena.
    pub struct VoiceKey;
}

/// Voice lifecycle state.
///
/// `Stopped` and `Finished` are terminal: a voice never leaves them, and
/// the graph drops terminal voices on [`crate::MixGraph::reap_finished`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    /// Producing audio and advancing its cursor.
    Playing,
    /// Held in place; renders silence without advancing.
    Paused,
    /// Explicitly stopped by the caller.
    Stopped,
    /// Ran out of source data with no loops left.
    Finished,
}

impl VoiceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, VoiceState::Stopped | VoiceState::Finished)
    }
}

/// A single playing instance of a [`Source`], attached to one submix.
pub struct Voice {
    source: SourceKey,
    pub(crate) submix: SubmixKey,
    state: VoiceState,
    /// Playback cursor in source frames, 16.16 fixed point.
    position: u64,
    volume: f32,
    pitch: f32,
    pan: f32,
    /// -1 = loop forever, 0 = play once, n = n extra passes.
    loop_count: i32,
    loops_done: i32,
    pub(crate) effects: EffectChain,
}

impl Voice {
    /// Create a voice at position zero.
    pub(crate) fn new(source: SourceKey, submix: SubmixKey, start_paused: bool) -> Self {
        Self {
            source,
            submix,
            state: if start_paused {
                VoiceState::Paused
            } else {
                VoiceState::Playing
            },
            position: 0,
            volume: 1.0,
            pitch: 1.0,
            pan: 0.0,
            loop_count: 0,
            loops_done: 0,
            effects: EffectChain::new(),
        }
    }

    pub fn source(&self) -> SourceKey {
        self.source
    }

    pub fn submix(&self) -> SubmixKey {
        self.submix
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// True only while actively producing audio.
    pub fn is_playing(&self) -> bool {
        self.state == VoiceState::Playing
    }

    /// Current cursor position in whole source frames.
    pub fn position_frames(&self) -> u64 {
        self.position >> FP_SHIFT
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }

    pub fn effects(&self) -> &EffectChain {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectChain {
        &mut self.effects
    }

    fn ensure_live(&self, what: &'static str) -> Result<(), Error> {
        if self.state.is_terminal() {
            Err(Error::InvalidState(what))
        } else {
            Ok(())
        }
    }

    /// Set volume. Negative values clamp to 0 rather than failing.
    pub fn set_volume(&mut self, volume: f32) -> Result<(), Error> {
        self.ensure_live("voice is stopped")?;
        self.volume = volume.max(0.0);
        Ok(())
    }

    /// Set the pitch multiplier, clamped to a small positive minimum.
    pub fn set_pitch(&mut self, pitch: f32) -> Result<(), Error> {
        self.ensure_live("voice is stopped")?;
        self.pitch = pitch.max(MIN_PITCH);
        Ok(())
    }

    /// Set pan, clamped to [-1, 1].
    pub fn set_pan(&mut self, pan: f32) -> Result<(), Error> {
        self.ensure_live("voice is stopped")?;
        self.pan = pan.clamp(-1.0, 1.0);
        Ok(())
    }

    /// Set the loop count: -1 loops forever, 0 plays once, n adds n passes.
    pub fn set_loop_count(&mut self, count: i32) -> Result<(), Error> {
        self.ensure_live("voice is stopped")?;
        self.loop_count = count.max(-1);
        Ok(())
    }

    /// Playing -> Paused. No-op when already paused.
    pub fn pause(&mut self) -> Result<(), Error> {
        self.ensure_live("voice is stopped")?;
        self.state = VoiceState::Paused;
        Ok(())
    }

    /// Paused -> Playing. No-op when already playing.
    pub fn resume(&mut self) -> Result<(), Error> {
        self.ensure_live("voice is stopped")?;
        self.state = VoiceState::Playing;
        Ok(())
    }

    /// Stop playback. Idempotent; a finished voice stays finished.
    pub fn stop(&mut self) {
        if self.state != VoiceState::Finished {
            self.state = VoiceState::Stopped;
        }
    }

    /// Move the cursor to a frame offset (not clamped against the source
    /// here; the graph clamps where the source length is known).
    pub(crate) fn set_position_frames(&mut self, frames: u64) {
        self.position = frames << FP_SHIFT;
    }

    /// Pull `out.frames()` frames from `source` through the pitch-scaled
    /// cursor, wrapping per the loop count. The tail past the last pass is
    /// silence-padded and the voice transitions to `Finished`.
    ///
    /// `bus_pitch` is the accumulated pitch of the submix chain above this
    /// voice; the voice's own pitch multiplies on top of it.
    pub fn render(&mut self, source: &Source, bus_pitch: f32, output_rate: u32, out: &mut AudioBuffer) {
        let frames = out.frames();
        let channels = out.channels();

        if self.state != VoiceState::Playing {
            out.silence();
            return;
        }

        let total = source.frames() as u64;
        if total == 0 {
            self.state = VoiceState::Finished;
            out.silence();
            return;
        }

        let end = total << FP_SHIFT;
        let increment = increment_for(self.pitch * bus_pitch, source.format().frequency, output_rate);

        for i in 0..frames {
            if self.state != VoiceState::Playing {
                for ch in 0..channels {
                    out.channel_mut(ch)[i] = 0.0;
                }
                continue;
            }
            for ch in 0..channels {
                out.channel_mut(ch)[i] = source.read_f32_lerp(ch, self.position);
            }
            self.position += increment;
            while self.position >= end {
                if self.loop_count < 0 || self.loops_done < self.loop_count {
                    self.position -= end;
                    if self.loop_count >= 0 {
                        self.loops_done += 1;
                    }
                } else {
                    self.state = VoiceState::Finished;
                    self.position = end;
                    break;
                }
            }
        }
    }
}

/// Volume/pan to per-side gains: linear crossfade, unity at center.
///
/// pan -1 is (1, 0), 0 is (1, 1), +1 is (0, 1), scaled by volume.
pub(crate) fn stereo_gains(volume: f32, pan: f32) -> (f32, f32) {
    (volume * (1.0 - pan.max(0.0)), volume * (1.0 + pan.min(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use mx_core::{AudioFormat, SampleFormat};
    use slotmap::SlotMap;

    fn mono16_source(samples: &[i16], frequency: u32) -> Source {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Source::from_vec(AudioFormat::new(SampleFormat::Pcm16, 1, frequency), bytes)
    }

    fn keys() -> (SourceKey, SubmixKey) {
        let mut sources: SlotMap<SourceKey, ()> = SlotMap::with_key();
        let mut submixes: SlotMap<SubmixKey, ()> = SlotMap::with_key();
        (sources.insert(()), submixes.insert(()))
    }

    fn playing_voice() -> Voice {
        let (src, sub) = keys();
        Voice::new(src, sub, false)
    }

    fn render_frames(voice: &mut Voice, source: &Source, frames: usize) -> AudioBuffer {
        let mut buf = AudioBuffer::new(1, frames);
        voice.render(source, 1.0, 48000, &mut buf);
        buf
    }

    #[test]
    fn new_voice_is_playing_at_zero() {
        let v = playing_voice();
        assert!(v.is_playing());
        assert_eq!(v.position_frames(), 0);
        assert_eq!(v.volume(), 1.0);
        assert_eq!(v.pan(), 0.0);
    }

    #[test]
    fn start_paused_voice_is_paused() {
        let (src, sub) = keys();
        let v = Voice::new(src, sub, true);
        assert_eq!(v.state(), VoiceState::Paused);
        assert!(!v.is_playing());
    }

    #[test]
    fn pause_resume_roundtrip() {
        let mut v = playing_voice();
        v.pause().unwrap();
        assert_eq!(v.state(), VoiceState::Paused);
        v.pause().unwrap(); // no-op
        assert_eq!(v.state(), VoiceState::Paused);
        v.resume().unwrap();
        assert!(v.is_playing());
    }

    #[test]
    fn stop_is_idempotent_and_terminal() {
        let mut v = playing_voice();
        v.stop();
        assert_eq!(v.state(), VoiceState::Stopped);
        v.stop();
        assert_eq!(v.state(), VoiceState::Stopped);
        assert!(v.pause().is_err());
        assert!(v.resume().is_err());
        assert!(v.set_volume(0.5).is_err());
    }

    #[test]
    fn out_of_domain_parameters_are_clamped() {
        let mut v = playing_voice();
        v.set_volume(-5.0).unwrap();
        assert_eq!(v.volume(), 0.0);
        v.set_pan(3.0).unwrap();
        assert_eq!(v.pan(), 1.0);
        v.set_pan(-2.0).unwrap();
        assert_eq!(v.pan(), -1.0);
        v.set_pitch(-1.0).unwrap();
        assert!(v.pitch() > 0.0);
        v.set_loop_count(-7).unwrap();
        assert_eq!(v.loop_count(), -1);
    }

    #[test]
    fn render_reads_source_and_advances() {
        let source = mono16_source(&[16384, -16384, 8192, 0], 48000);
        let mut v = playing_voice();
        let buf = render_frames(&mut v, &source, 2);
        assert!((buf.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((buf.channel(0)[1] - -0.5).abs() < 1e-6);
        assert_eq!(v.position_frames(), 2);
    }

    #[test]
    fn paused_voice_renders_silence_without_advancing() {
        let source = mono16_source(&[16384; 8], 48000);
        let mut v = playing_voice();
        v.pause().unwrap();
        let buf = render_frames(&mut v, &source, 4);
        assert!(buf.channel(0).iter().all(|&s| s == 0.0));
        assert_eq!(v.position_frames(), 0);
    }

    #[test]
    fn non_looping_voice_finishes_and_pads_silence() {
        let source = mono16_source(&[16384, 16384], 48000);
        let mut v = playing_voice();
        let buf = render_frames(&mut v, &source, 4);
        assert!((buf.channel(0)[0] - 0.5).abs() < 1e-6);
        assert_eq!(buf.channel(0)[2], 0.0);
        assert_eq!(buf.channel(0)[3], 0.0);
        assert_eq!(v.state(), VoiceState::Finished);
    }

    #[test]
    fn finished_voice_keeps_rendering_silence() {
        let source = mono16_source(&[16384], 48000);
        let mut v = playing_voice();
        render_frames(&mut v, &source, 2);
        assert_eq!(v.state(), VoiceState::Finished);
        let buf = render_frames(&mut v, &source, 2);
        assert!(buf.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn loop_once_plays_twice_then_finishes() {
        let source = mono16_source(&[16384, 8192], 48000);
        let mut v = playing_voice();
        v.set_loop_count(1).unwrap();

        let buf = render_frames(&mut v, &source, 4);
        assert!((buf.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((buf.channel(0)[2] - 0.5).abs() < 1e-6);
        assert!(v.is_playing() || v.state() == VoiceState::Finished);

        // One more frame consumes the last sample's advance and finishes.
        let buf = render_frames(&mut v, &source, 1);
        assert_eq!(v.state(), VoiceState::Finished);
        assert!(buf.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn infinite_loop_never_finishes() {
        let source = mono16_source(&[16384, 8192], 48000);
        let mut v = playing_voice();
        v.set_loop_count(-1).unwrap();
        for _ in 0..16 {
            render_frames(&mut v, &source, 3);
        }
        assert!(v.is_playing());
    }

    #[test]
    fn double_pitch_advances_twice_as_fast() {
        let source = mono16_source(&[16384; 64], 48000);
        let mut v = playing_voice();
        v.set_pitch(2.0).unwrap();
        render_frames(&mut v, &source, 8);
        assert_eq!(v.position_frames(), 16);
    }

    #[test]
    fn bus_pitch_compounds_with_voice_pitch() {
        let source = mono16_source(&[16384; 64], 48000);
        let mut v = playing_voice();
        v.set_pitch(2.0).unwrap();
        let mut buf = AudioBuffer::new(1, 8);
        v.render(&source, 2.0, 48000, &mut buf);
        assert_eq!(v.position_frames(), 32);
    }

    #[test]
    fn empty_source_finishes_immediately() {
        let source = mono16_source(&[], 48000);
        let mut v = playing_voice();
        let buf = render_frames(&mut v, &source, 2);
        assert_eq!(v.state(), VoiceState::Finished);
        assert!(buf.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn stereo_gains_center_is_unity() {
        assert_eq!(stereo_gains(1.0, 0.0), (1.0, 1.0));
    }

    #[test]
    fn stereo_gains_hard_sides() {
        assert_eq!(stereo_gains(1.0, -1.0), (1.0, 0.0));
        assert_eq!(stereo_gains(1.0, 1.0), (0.0, 1.0));
    }

    #[test]
    fn stereo_gains_scale_with_volume() {
        let (l, r) = stereo_gains(0.5, 0.5);
        assert!((l - 0.25).abs() < 1e-6);
        assert!((r - 0.5).abs() < 1e-6);
    }
}
