//! The per-tick render walk.

use alloc::vec::Vec;
use mx_core::AudioBuffer;

use crate::graph::MixGraph;
use crate::submix::SubmixKey;
use crate::voice::stereo_gains;

/// One node of the flattened traversal order.
///
/// `parent` indexes into the same order vector; parents always precede
/// their children, so walking the order in reverse visits every subtree
/// before the bus it feeds.
#[derive(Clone, Copy)]
struct OrderEntry {
    key: SubmixKey,
    parent: Option<usize>,
    /// Product of this bus's pitch and every ancestor's.
    pitch: f32,
    /// True when this bus or any ancestor is paused.
    paused: bool,
}

/// Drives the submix tree: one [`MixEngine::tick`] renders one block.
///
/// The engine is cadence-agnostic; whatever owns the audio sink decides
/// how often to tick and with how many frames. All per-node bus buffers,
/// the traversal order, and the scratch buffers are reused across ticks,
/// so the steady-state render path does not allocate.
pub struct MixEngine {
    graph: MixGraph,
    sample_rate: u32,
    channels: u16,
    buses: Vec<AudioBuffer>,
    order: Vec<OrderEntry>,
    dfs_stack: Vec<(SubmixKey, Option<usize>, f32, bool)>,
    voice_buf: AudioBuffer,
    fx_scratch: AudioBuffer,
}

impl MixEngine {
    /// Create an engine mixing at `sample_rate` into `channels` output
    /// channels, with a fresh graph containing only the master submix.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            graph: MixGraph::new(),
            sample_rate,
            channels,
            buses: Vec::new(),
            order: Vec::new(),
            dfs_stack: Vec::new(),
            voice_buf: AudioBuffer::new(channels, 0),
            fx_scratch: AudioBuffer::new(channels, 0),
        }
    }

    pub fn graph(&self) -> &MixGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut MixGraph {
        &mut self.graph
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Adopt a new output rate (e.g. the rate the sink actually opened).
    /// Voice increments follow immediately; effects constructed against
    /// the old rate keep their configured coefficients.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Render one block of `frames` frames and return the master bus.
    ///
    /// Walks the tree bottom-up: each bus sums its playing voices (voice
    /// effect chain, then volume/pan), then its children's buses (scaled
    /// by the child's own volume), runs its own effect chain, and applies
    /// mute gating. A paused bus freezes its whole subtree. Render-path
    /// problems (dead keys, missing sources) degrade to silence; this
    /// method never fails.
    pub fn tick(&mut self, frames: usize) -> &AudioBuffer {
        self.rebuild_order();

        while self.buses.len() < self.order.len() {
            self.buses.push(AudioBuffer::new(self.channels, frames));
        }
        for bus in &mut self.buses[..self.order.len()] {
            bus.ensure_shape(self.channels, frames);
            bus.silence();
        }

        let MixGraph {
            sources,
            voices,
            submixes,
            ..
        } = &mut self.graph;

        for idx in (0..self.order.len()).rev() {
            let entry = self.order[idx];
            if entry.paused {
                continue;
            }
            let Some(submix) = submixes.get_mut(entry.key) else {
                continue;
            };

            // Attached voices.
            for vi in 0..submix.voices.len() {
                let vkey = submix.voices[vi];
                let Some(voice) = voices.get_mut(vkey) else {
                    continue;
                };
                if !voice.is_playing() {
                    continue;
                }
                let Some(source) = sources.get(voice.source()) else {
                    // Source yanked out from under the voice: silence, not a crash.
                    voice.stop();
                    continue;
                };
                self.voice_buf.ensure_shape(source.format().channels, frames);
                voice.render(source, entry.pitch, self.sample_rate, &mut self.voice_buf);
                voice.effects.process(&mut self.voice_buf, &mut self.fx_scratch);
                let (left, right) = stereo_gains(voice.volume(), voice.pan());
                self.buses[idx].mix_from_panned(&self.voice_buf, left, right);
            }

            // Bus effect chain over voices + already-summed children.
            submix.effects.process(&mut self.buses[idx], &mut self.fx_scratch);
            if submix.is_muted() {
                self.buses[idx].silence();
            }

            match entry.parent {
                Some(pidx) => {
                    let (head, tail) = self.buses.split_at_mut(idx);
                    head[pidx].mix_from_scaled(&tail[0], submix.volume());
                }
                None => self.buses[idx].apply_gain(submix.volume()),
            }
        }

        &self.buses[0]
    }

    /// Flatten the tree into parent-before-child order with inherited
    /// pitch and pause state. Unreachable submixes (orphaned roots) are
    /// simply never visited.
    fn rebuild_order(&mut self) {
        self.order.clear();
        self.dfs_stack.clear();
        self.dfs_stack.push((self.graph.master, None, 1.0, false));
        while let Some((key, parent, pitch, paused)) = self.dfs_stack.pop() {
            let Some(submix) = self.graph.submix(key) else {
                continue;
            };
            let pitch = pitch * submix.pitch();
            let paused = paused || submix.is_paused();
            let idx = self.order.len();
            self.order.push(OrderEntry {
                key,
                parent,
                pitch,
                paused,
            });
            for &child in submix.children() {
                self.dfs_stack.push((child, Some(idx), pitch, paused));
            }
        }
    }
}
