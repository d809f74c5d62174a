//! Submix: a mixing bus in the routing tree.

use alloc::vec::Vec;
use mx_core::EffectChain;

use crate::resample::MIN_PITCH;
use crate::voice::VoiceKey;

slotmap::new_key_type! {
    /// Key for referencing submixes in the mix graph's submix arena.
    pub struct SubmixKey;
}

/// A mixing bus: attached voices plus child buses, summed and processed
/// into the parent. The tree is rooted at the graph's master submix.
///
/// Gating policy: `paused` freezes the whole subtree (nothing beneath it
/// renders or advances); `muted` only gates the bus's contribution to its
/// parent while the subtree keeps advancing.
pub struct Submix {
    volume: f32,
    pitch: f32,
    muted: bool,
    paused: bool,
    pub(crate) parent: Option<SubmixKey>,
    pub(crate) children: Vec<SubmixKey>,
    pub(crate) voices: Vec<VoiceKey>,
    pub(crate) effects: EffectChain,
}

impl Submix {
    pub(crate) fn new(parent: Option<SubmixKey>) -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
            muted: false,
            paused: false,
            parent,
            children: Vec::new(),
            voices: Vec::new(),
            effects: EffectChain::new(),
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn parent(&self) -> Option<SubmixKey> {
        self.parent
    }

    pub fn children(&self) -> &[SubmixKey] {
        &self.children
    }

    pub fn voices(&self) -> &[VoiceKey] {
        &self.voices
    }

    pub fn effects(&self) -> &EffectChain {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectChain {
        &mut self.effects
    }

    /// Set bus volume. Negative values clamp to 0.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.max(0.0);
    }

    /// Set the bus pitch multiplier, clamped to a small positive minimum.
    /// Applies to every voice below this bus, compounding down the tree.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.max(MIN_PITCH);
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.muted = mute;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_submix_defaults() {
        let s = Submix::new(None);
        assert_eq!(s.volume(), 1.0);
        assert_eq!(s.pitch(), 1.0);
        assert!(!s.is_muted());
        assert!(!s.is_paused());
        assert!(s.parent().is_none());
        assert!(s.children().is_empty());
        assert!(s.voices().is_empty());
        assert!(s.effects().is_empty());
    }

    #[test]
    fn volume_clamps_at_zero() {
        let mut s = Submix::new(None);
        s.set_volume(-0.5);
        assert_eq!(s.volume(), 0.0);
        s.set_volume(2.5);
        assert_eq!(s.volume(), 2.5);
    }

    #[test]
    fn pitch_clamps_positive() {
        let mut s = Submix::new(None);
        s.set_pitch(0.0);
        assert!(s.pitch() > 0.0);
    }

    #[test]
    fn mute_and_pause_toggle() {
        let mut s = Submix::new(None);
        s.set_mute(true);
        s.set_paused(true);
        assert!(s.is_muted());
        assert!(s.is_paused());
        s.set_mute(false);
        s.set_paused(false);
        assert!(!s.is_muted());
        assert!(!s.is_paused());
    }
}
