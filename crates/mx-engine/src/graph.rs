//! Mix graph: arenas for sources, voices, and submixes, plus the
//! structural operations that keep the routing tree consistent.
//!
//! All relations are slotmap keys rather than pointers; a dead key reads
//! back as `None`. Structural errors surface synchronously here, while
//! the render walk in [`crate::MixEngine`] degrades to silence instead
//! of erroring.

use alloc::vec::Vec;
use mx_core::{Error, Source, SourceKey};
use slotmap::SlotMap;

use crate::submix::{Submix, SubmixKey};
use crate::voice::{Voice, VoiceKey};

/// Ownership registry for the whole mix hierarchy.
///
/// Every voice belongs to exactly one submix at any time; the submix tree
/// has exactly one root (the master), created with the graph and never
/// removed.
pub struct MixGraph {
    pub(crate) sources: SlotMap<SourceKey, Source>,
    pub(crate) voices: SlotMap<VoiceKey, Voice>,
    pub(crate) submixes: SlotMap<SubmixKey, Submix>,
    pub(crate) master: SubmixKey,
}

impl MixGraph {
    pub fn new() -> Self {
        let mut submixes = SlotMap::with_key();
        let master = submixes.insert(Submix::new(None));
        Self {
            sources: SlotMap::with_key(),
            voices: SlotMap::with_key(),
            submixes,
            master,
        }
    }

    /// Key of the master submix, the root every mix bottoms out at.
    pub fn master(&self) -> SubmixKey {
        self.master
    }

    // --- Sources ---

    pub fn add_source(&mut self, source: Source) -> SourceKey {
        self.sources.insert(source)
    }

    pub fn source(&self, key: SourceKey) -> Option<&Source> {
        self.sources.get(key)
    }

    /// Remove a source. Voices still referencing it degrade to silence and
    /// stop on their next render.
    pub fn remove_source(&mut self, key: SourceKey) -> Option<Source> {
        self.sources.remove(key)
    }

    // --- Submix tree ---

    /// Create a submix under `parent` (master when `None`).
    pub fn create_submix(&mut self, parent: Option<SubmixKey>) -> Result<SubmixKey, Error> {
        let parent = parent.unwrap_or(self.master);
        if !self.submixes.contains_key(parent) {
            return Err(Error::InvalidState("unknown parent submix handle"));
        }
        let key = self.submixes.insert(Submix::new(Some(parent)));
        self.submixes[parent].children.push(key);
        Ok(key)
    }

    pub fn submix(&self, key: SubmixKey) -> Option<&Submix> {
        self.submixes.get(key)
    }

    pub fn submix_mut(&mut self, key: SubmixKey) -> Option<&mut Submix> {
        self.submixes.get_mut(key)
    }

    /// Would attaching `child` under `parent` make the tree cyclic?
    fn is_reachable_upward(&self, from: SubmixKey, needle: SubmixKey) -> bool {
        let mut cursor = Some(from);
        while let Some(key) = cursor {
            if key == needle {
                return true;
            }
            cursor = self.submixes.get(key).and_then(|s| s.parent);
        }
        false
    }

    /// Re-parent `child` under `new_parent`.
    ///
    /// Fails with [`Error::Cycle`] when `new_parent` sits inside `child`'s
    /// own subtree (including `child == new_parent`); the tree is left
    /// untouched on any failure. Also reattaches orphaned roots produced
    /// by [`MixGraph::release_submix`].
    pub fn attach_submix(&mut self, child: SubmixKey, new_parent: SubmixKey) -> Result<(), Error> {
        if child == self.master {
            return Err(Error::InvalidState("master submix cannot be re-parented"));
        }
        if !self.submixes.contains_key(child) || !self.submixes.contains_key(new_parent) {
            return Err(Error::InvalidState("unknown submix handle"));
        }
        if self.is_reachable_upward(new_parent, child) {
            return Err(Error::Cycle);
        }
        if let Some(old_parent) = self.submixes[child].parent {
            if let Some(old) = self.submixes.get_mut(old_parent) {
                old.children.retain(|&k| k != child);
            }
        }
        self.submixes[new_parent].children.push(child);
        self.submixes[child].parent = Some(new_parent);
        Ok(())
    }

    /// Release a submix: stop and re-home its voices, orphan its children,
    /// detach from its parent, and drop it from the arena.
    ///
    /// Returns the orphaned child keys. Orphans keep their state but are
    /// unreachable from the master until re-attached, so they render
    /// nothing; the caller decides whether to reattach or release them.
    pub fn release_submix(&mut self, key: SubmixKey) -> Result<Vec<SubmixKey>, Error> {
        if key == self.master {
            return Err(Error::InvalidState("master submix cannot be released"));
        }
        let Some(mut submix) = self.submixes.remove(key) else {
            return Err(Error::InvalidState("unknown submix handle"));
        };

        for vkey in submix.voices.drain(..) {
            if let Some(voice) = self.voices.get_mut(vkey) {
                voice.stop();
                voice.submix = self.master;
                self.submixes[self.master].voices.push(vkey);
            }
        }

        let orphans = core::mem::take(&mut submix.children);
        for &ckey in &orphans {
            if let Some(child) = self.submixes.get_mut(ckey) {
                child.parent = None;
            }
        }

        if let Some(parent) = submix.parent {
            if let Some(p) = self.submixes.get_mut(parent) {
                p.children.retain(|&k| k != key);
            }
        }
        Ok(orphans)
    }

    // --- Voices ---

    /// Start playing `source` on `submix` (master when `None`).
    ///
    /// Fails with [`Error::SourceUnavailable`] when the source is missing
    /// or holds no decoded frames; no voice is created in that case.
    pub fn play(
        &mut self,
        source: SourceKey,
        submix: Option<SubmixKey>,
        start_paused: bool,
    ) -> Result<VoiceKey, Error> {
        match self.sources.get(source) {
            Some(s) if !s.is_empty() => {}
            _ => return Err(Error::SourceUnavailable),
        }
        let target = submix.unwrap_or(self.master);
        if !self.submixes.contains_key(target) {
            return Err(Error::InvalidState("unknown submix handle"));
        }
        let key = self.voices.insert(Voice::new(source, target, start_paused));
        self.submixes[target].voices.push(key);
        Ok(key)
    }

    pub fn voice(&self, key: VoiceKey) -> Option<&Voice> {
        self.voices.get(key)
    }

    pub fn voice_mut(&mut self, key: VoiceKey) -> Option<&mut Voice> {
        self.voices.get_mut(key)
    }

    /// True only for a live, actively playing voice.
    pub fn is_voice_playing(&self, key: VoiceKey) -> bool {
        self.voices.get(key).is_some_and(Voice::is_playing)
    }

    /// Move a voice to another submix, atomically with respect to the two
    /// voice lists: the voice is never attached to both or neither.
    pub fn assign_to_submix(&mut self, voice: VoiceKey, submix: SubmixKey) -> Result<(), Error> {
        if !self.submixes.contains_key(submix) {
            return Err(Error::InvalidState("unknown submix handle"));
        }
        let Some(v) = self.voices.get_mut(voice) else {
            return Err(Error::InvalidState("unknown voice handle"));
        };
        let old = v.submix;
        if old == submix {
            return Ok(());
        }
        v.submix = submix;
        if let Some(old_submix) = self.submixes.get_mut(old) {
            old_submix.voices.retain(|&k| k != voice);
        }
        self.submixes[submix].voices.push(voice);
        Ok(())
    }

    /// Move a voice's cursor, clamped to the source length.
    pub fn seek_voice(&mut self, key: VoiceKey, frame: u64) -> Result<(), Error> {
        let Some(voice) = self.voices.get(key) else {
            return Err(Error::InvalidState("unknown voice handle"));
        };
        if voice.state().is_terminal() {
            return Err(Error::InvalidState("voice is stopped"));
        }
        let limit = self
            .sources
            .get(voice.source())
            .map(|s| s.frames() as u64)
            .unwrap_or(0);
        self.voices[key].set_position_frames(frame.min(limit));
        Ok(())
    }

    /// Gain accumulated from `start` up to the master: product of bus
    /// volumes, zero anywhere muted or paused, zero for orphaned subtrees.
    fn chain_gain(&self, start: SubmixKey) -> f32 {
        let mut gain = 1.0;
        let mut key = start;
        loop {
            let Some(submix) = self.submixes.get(key) else {
                return 0.0;
            };
            if submix.is_muted() || submix.is_paused() {
                return 0.0;
            }
            gain *= submix.volume();
            match submix.parent() {
                Some(parent) => key = parent,
                None if key == self.master => return gain,
                None => return 0.0,
            }
        }
    }

    /// Effective audibility of a voice: its volume scaled by every bus up
    /// to the master. Zero when the voice is not playing, anything above
    /// it is muted or paused, or its subtree is orphaned.
    pub fn voice_audibility(&self, key: VoiceKey) -> Option<f32> {
        let voice = self.voices.get(key)?;
        if !voice.is_playing() {
            return Some(0.0);
        }
        Some(voice.volume() * self.chain_gain(voice.submix()))
    }

    /// Effective audibility of a submix's output at the master.
    pub fn submix_audibility(&self, key: SubmixKey) -> Option<f32> {
        if !self.submixes.contains_key(key) {
            return None;
        }
        Some(self.chain_gain(key))
    }

    /// Drop terminal voices from the arena and their submix lists.
    /// Returns how many were reaped.
    pub fn reap_finished(&mut self) -> usize {
        let mut dead: Vec<VoiceKey> = Vec::new();
        for (key, voice) in &self.voices {
            if voice.state().is_terminal() {
                dead.push(key);
            }
        }
        for &key in &dead {
            let voice = self.voices.remove(key).expect("key collected above");
            if let Some(submix) = self.submixes.get_mut(voice.submix) {
                submix.voices.retain(|&k| k != key);
            }
        }
        dead.len()
    }

    /// Number of live voices (any non-reaped state).
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }
}

impl Default for MixGraph {
    fn default() -> Self {
        Self::new()
    }
}
