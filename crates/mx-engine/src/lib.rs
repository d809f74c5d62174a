//! Mix runtime for the mixdown audio engine.
//!
//! Owns the submix tree, voice lifecycle, and the per-tick render walk.
//! The engine is purely reactive: an audio sink (or an offline renderer)
//! calls [`MixEngine::tick`] once per buffer and receives the mixed
//! master bus back.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod effects;
mod graph;
mod mixer;
mod resample;
mod submix;
mod voice;

pub use graph::MixGraph;
pub use mixer::MixEngine;
pub use resample::{increment_for, FP_ONE, FP_SHIFT, MIN_PITCH};
pub use submix::{Submix, SubmixKey};
pub use voice::{Voice, VoiceKey, VoiceState};
