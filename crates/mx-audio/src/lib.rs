//! Audio output sinks for the mixdown audio engine.
//!
//! The engine itself never talks to hardware; it hands mixed buffers to
//! an [`AudioSink`], and the sink's callback cadence decides how often
//! the engine ticks.

mod cpal_sink;
mod traits;

pub use cpal_sink::CpalSink;
pub use traits::{AudioError, AudioSink};
