//! Device facade for the mixdown audio engine.
//!
//! Ties the collaborators together: the WAV codec decodes sounds, the
//! mix engine owns the submix tree, and a CPAL sink drives playback from
//! its own render thread. Offline rendering shares the same engine.
//!
//! Concurrency model: the engine sits behind a mutex. The render thread
//! locks it once per block; control calls lock it between blocks. That
//! serializes every structural mutation (voice/submix attach, effect
//! insert/remove) against the in-flight tick, and every tick observes an
//! internally consistent parameter set.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use mx_audio::{AudioError, AudioSink, CpalSink};
use mx_core::{AudioBuffer, Error, BLOCK_SIZE};
use mx_engine::Voice;
use mx_formats::DecodeError;

// Re-export common types so callers don't need the inner crates directly.
pub use mx_core::{AudioFormat, Effect, SampleFormat, Source, SourceKey};
pub use mx_engine::{effects, MixEngine, Submix, SubmixKey, VoiceKey, VoiceState};
pub use mx_formats::{samples_to_wav, write_wav};

/// Default output rate when the caller doesn't pick one.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Unit for playback-position getters and setters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    /// Source frames.
    Frames,
    /// Milliseconds at the source's own frequency.
    Milliseconds,
}

/// Error type for device-level operations.
#[derive(Debug)]
pub enum DeviceError {
    Io(std::io::Error),
    Decode(DecodeError),
    Engine(Error),
    Audio(AudioError),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::Io(e) => write!(f, "I/O error: {}", e),
            DeviceError::Decode(e) => write!(f, "decode error: {}", e),
            DeviceError::Engine(e) => write!(f, "engine error: {}", e),
            DeviceError::Audio(e) => write!(f, "audio error: {}", e),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<std::io::Error> for DeviceError {
    fn from(e: std::io::Error) -> Self {
        DeviceError::Io(e)
    }
}

impl From<DecodeError> for DeviceError {
    fn from(e: DecodeError) -> Self {
        DeviceError::Decode(e)
    }
}

impl From<Error> for DeviceError {
    fn from(e: Error) -> Self {
        DeviceError::Engine(e)
    }
}

impl From<AudioError> for DeviceError {
    fn from(e: AudioError) -> Self {
        DeviceError::Audio(e)
    }
}

/// The top-level handle: loads sounds, routes them through submixes, and
/// plays the mix through the default output device or renders it offline.
pub struct Device {
    engine: Arc<Mutex<MixEngine>>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Device {
    /// Create a device mixing at the default rate in stereo.
    pub fn new() -> Self {
        Self::with_output(DEFAULT_SAMPLE_RATE, 2)
    }

    /// Create a device with an explicit output rate and channel count.
    pub fn with_output(sample_rate: u32, channels: u16) -> Self {
        Self {
            engine: Arc::new(Mutex::new(MixEngine::new(sample_rate, channels))),
            playback: None,
        }
    }

    fn engine(&self) -> MutexGuard<'_, MixEngine> {
        // Recover rather than propagate poisoning: the engine's state is
        // all plain data and stays usable after a panicked control call.
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a closure against the engine under the serialization lock.
    /// Escape hatch for graph operations without a dedicated wrapper.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut MixEngine) -> R) -> R {
        f(&mut self.engine())
    }

    // --- Sounds ---

    /// Load and decode a WAV file into a source.
    pub fn load_sound(&self, path: impl AsRef<Path>) -> Result<SourceKey, DeviceError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        self.load_sound_bytes(name, &bytes)
    }

    /// Decode in-memory WAV bytes into a source.
    pub fn load_sound_bytes(&self, name: &str, bytes: &[u8]) -> Result<SourceKey, DeviceError> {
        let (format, pcm) = mx_formats::decode_wav(bytes)?;
        let source = Source::from_vec(format, pcm).with_name(name);
        Ok(self.engine().graph_mut().add_source(source))
    }

    /// Register an already-built source (owned or static-borrowed PCM).
    pub fn add_source(&self, source: Source) -> SourceKey {
        self.engine().graph_mut().add_source(source)
    }

    pub fn source_format(&self, key: SourceKey) -> Option<AudioFormat> {
        self.engine().graph().source(key).map(|s| s.format())
    }

    // --- Submixes ---

    /// Key of the master submix.
    pub fn master(&self) -> SubmixKey {
        self.engine().graph().master()
    }

    /// Create a submix under `parent` (master when `None`).
    pub fn create_submix(&self, parent: Option<SubmixKey>) -> Result<SubmixKey, DeviceError> {
        Ok(self.engine().graph_mut().create_submix(parent)?)
    }

    /// Re-parent a submix; fails on cycles, leaving the tree unchanged.
    pub fn attach_submix(&self, child: SubmixKey, parent: SubmixKey) -> Result<(), DeviceError> {
        Ok(self.engine().graph_mut().attach_submix(child, parent)?)
    }

    /// Release a submix, returning any orphaned children.
    pub fn release_submix(&self, key: SubmixKey) -> Result<Vec<SubmixKey>, DeviceError> {
        Ok(self.engine().graph_mut().release_submix(key)?)
    }

    fn submix_op<R>(
        &self,
        key: SubmixKey,
        f: impl FnOnce(&mut Submix) -> R,
    ) -> Result<R, DeviceError> {
        let mut engine = self.engine();
        let submix = engine
            .graph_mut()
            .submix_mut(key)
            .ok_or(Error::InvalidState("unknown submix handle"))?;
        Ok(f(submix))
    }

    pub fn set_submix_volume(&self, key: SubmixKey, volume: f32) -> Result<(), DeviceError> {
        self.submix_op(key, |s| s.set_volume(volume))
    }

    pub fn set_submix_pitch(&self, key: SubmixKey, pitch: f32) -> Result<(), DeviceError> {
        self.submix_op(key, |s| s.set_pitch(pitch))
    }

    pub fn set_submix_mute(&self, key: SubmixKey, mute: bool) -> Result<(), DeviceError> {
        self.submix_op(key, |s| s.set_mute(mute))
    }

    pub fn set_submix_paused(&self, key: SubmixKey, paused: bool) -> Result<(), DeviceError> {
        self.submix_op(key, |s| s.set_paused(paused))
    }

    /// Append an effect to a submix's chain (applied after its voices and
    /// children are summed).
    pub fn add_submix_effect(
        &self,
        key: SubmixKey,
        effect: Box<dyn Effect>,
    ) -> Result<(), DeviceError> {
        self.submix_op(key, |s| s.effects_mut().push(effect))
    }

    // --- Voices ---

    /// Start playing a source, optionally paused, on a submix (master when
    /// `None`). Fails without creating a voice if the source is missing or
    /// empty.
    pub fn play_sound(
        &self,
        source: SourceKey,
        submix: Option<SubmixKey>,
        paused: bool,
    ) -> Result<VoiceKey, DeviceError> {
        Ok(self.engine().graph_mut().play(source, submix, paused)?)
    }

    fn voice_op(
        &self,
        key: VoiceKey,
        f: impl FnOnce(&mut Voice) -> Result<(), Error>,
    ) -> Result<(), DeviceError> {
        let mut engine = self.engine();
        let voice = engine
            .graph_mut()
            .voice_mut(key)
            .ok_or(Error::InvalidState("unknown voice handle"))?;
        Ok(f(voice)?)
    }

    pub fn set_volume(&self, key: VoiceKey, volume: f32) -> Result<(), DeviceError> {
        self.voice_op(key, |v| v.set_volume(volume))
    }

    pub fn set_pitch(&self, key: VoiceKey, pitch: f32) -> Result<(), DeviceError> {
        self.voice_op(key, |v| v.set_pitch(pitch))
    }

    pub fn set_pan(&self, key: VoiceKey, pan: f32) -> Result<(), DeviceError> {
        self.voice_op(key, |v| v.set_pan(pan))
    }

    pub fn set_loop_count(&self, key: VoiceKey, count: i32) -> Result<(), DeviceError> {
        self.voice_op(key, |v| v.set_loop_count(count))
    }

    pub fn pause(&self, key: VoiceKey) -> Result<(), DeviceError> {
        self.voice_op(key, |v| v.pause())
    }

    pub fn resume(&self, key: VoiceKey) -> Result<(), DeviceError> {
        self.voice_op(key, |v| v.resume())
    }

    /// Stop a voice. Idempotent; a dead handle is a no-op.
    pub fn stop_voice(&self, key: VoiceKey) {
        if let Some(voice) = self.engine().graph_mut().voice_mut(key) {
            voice.stop();
        }
    }

    /// Move a voice to another submix.
    pub fn assign_to_submix(&self, voice: VoiceKey, submix: SubmixKey) -> Result<(), DeviceError> {
        Ok(self.engine().graph_mut().assign_to_submix(voice, submix)?)
    }

    /// Append an effect to a voice's chain.
    pub fn add_voice_effect(&self, key: VoiceKey, effect: Box<dyn Effect>) -> Result<(), DeviceError> {
        self.voice_op(key, |v| {
            v.effects_mut().push(effect);
            Ok(())
        })
    }

    pub fn is_playing(&self, key: VoiceKey) -> bool {
        self.engine().graph().is_voice_playing(key)
    }

    pub fn voice_state(&self, key: VoiceKey) -> Option<VoiceState> {
        self.engine().graph().voice(key).map(|v| v.state())
    }

    /// Effective gain of a voice at the master output (volume compounded
    /// up the bus chain; zero when silenced anywhere along it).
    pub fn audibility(&self, key: VoiceKey) -> Option<f32> {
        self.engine().graph().voice_audibility(key)
    }

    /// Effective gain of a submix's output at the master.
    pub fn submix_audibility(&self, key: SubmixKey) -> Option<f32> {
        self.engine().graph().submix_audibility(key)
    }

    /// Current playback position; `None` for a dead handle.
    pub fn playback_position(&self, key: VoiceKey, unit: TimeUnit) -> Option<u64> {
        let engine = self.engine();
        let graph = engine.graph();
        let voice = graph.voice(key)?;
        let frames = voice.position_frames();
        match unit {
            TimeUnit::Frames => Some(frames),
            TimeUnit::Milliseconds => {
                let rate = graph.source(voice.source())?.format().frequency as u64;
                if rate == 0 {
                    return None;
                }
                Some(frames * 1000 / rate)
            }
        }
    }

    /// Seek a voice, clamped to its source length.
    pub fn set_playback_position(
        &self,
        key: VoiceKey,
        position: u64,
        unit: TimeUnit,
    ) -> Result<(), DeviceError> {
        let mut engine = self.engine();
        let frames = match unit {
            TimeUnit::Frames => position,
            TimeUnit::Milliseconds => {
                let rate = engine
                    .graph()
                    .voice(key)
                    .and_then(|v| engine.graph().source(v.source()))
                    .map(|s| s.format().frequency as u64)
                    .ok_or(Error::InvalidState("unknown voice handle"))?;
                position * rate / 1000
            }
        };
        Ok(engine.graph_mut().seek_voice(key, frames)?)
    }

    /// Drop finished and stopped voices, invalidating their handles.
    pub fn reap_finished(&self) -> usize {
        self.engine().graph_mut().reap_finished()
    }

    // --- Real-time playback ---

    /// Spawn the render thread over the default output device.
    ///
    /// The sink is opened on the render thread (stream handles are not
    /// sendable); open failures flip the handle into the finished state,
    /// observable via [`Device::is_active`]. No-op when already running.
    pub fn start(&mut self) {
        if self.playback.is_some() {
            return;
        }

        let engine = self.engine.clone();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let stop = stop_signal.clone();
        let done = finished.clone();
        let thread = std::thread::spawn(move || render_thread(engine, stop, done));

        self.playback = Some(PlaybackHandle {
            stop_signal,
            finished,
            thread: Some(thread),
        });
    }

    /// Stop the render thread and join it.
    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                let _ = handle.join();
            }
        }
    }

    /// True while the render thread is up and feeding the sink.
    pub fn is_active(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    // --- Offline rendering ---

    /// Render `frames` frames of the current mix as interleaved f32.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut engine = self.engine();
        let channels = engine.channels() as usize;
        let mut out = Vec::with_capacity(frames * channels);
        let mut remaining = frames;
        while remaining > 0 {
            let block = remaining.min(BLOCK_SIZE);
            interleave_into(engine.tick(block), channels, &mut out);
            remaining -= block;
        }
        out
    }

    /// Render `seconds` of the current mix to an in-memory 16-bit WAV.
    pub fn render_to_wav(&self, seconds: u32) -> Vec<u8> {
        let (rate, channels) = {
            let engine = self.engine();
            (engine.sample_rate(), engine.channels())
        };
        let samples = self.render_frames((rate * seconds) as usize);
        samples_to_wav(&samples, rate, channels)
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Copy a planar buffer into an interleaved vector, duplicating or
/// dropping channels to match `out_channels`.
fn interleave_into(buf: &AudioBuffer, out_channels: usize, out: &mut Vec<f32>) {
    for i in 0..buf.frames() {
        for ch in 0..out_channels {
            let src_ch = (ch as u16).min(buf.channels().saturating_sub(1));
            out.push(buf.channel(src_ch)[i]);
        }
    }
}

fn render_thread(engine: Arc<Mutex<MixEngine>>, stop_signal: Arc<AtomicBool>, finished: Arc<AtomicBool>) {
    let Ok(mut sink) = CpalSink::new() else {
        finished.store(true, Ordering::Relaxed);
        return;
    };
    if sink.build_stream().is_err() || sink.start().is_err() {
        finished.store(true, Ordering::Relaxed);
        return;
    }

    let sink_channels = sink.channels() as usize;
    {
        let mut engine = engine.lock().unwrap_or_else(|e| e.into_inner());
        engine.set_sample_rate(sink.sample_rate());
    }

    let mut interleaved: Vec<f32> = Vec::with_capacity(BLOCK_SIZE * sink_channels);
    while !stop_signal.load(Ordering::Relaxed) {
        interleaved.clear();
        {
            let mut engine = engine.lock().unwrap_or_else(|e| e.into_inner());
            interleave_into(engine.tick(BLOCK_SIZE), sink_channels, &mut interleaved);
        }
        // The ring buffer paces us against the device callback.
        sink.write_spin(&interleaved);
    }

    let _ = sink.stop();
    finished.store(true, Ordering::Relaxed);
}
