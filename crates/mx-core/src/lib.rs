//! Core types for the mixdown audio engine.
//!
//! This crate defines the data model shared by the engine and its
//! collaborators: sample formats, decoded PCM sources, the planar
//! audio buffer, and the effect contract. The mix runtime lives in
//! `mx-engine`; codecs and sinks are separate collaborator crates.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod buffer;
mod effect;
mod error;
mod format;
mod source;

pub use buffer::{AudioBuffer, BLOCK_SIZE, MAX_CHANNELS};
pub use effect::{Effect, EffectChain};
pub use error::Error;
pub use format::{AudioFormat, SampleFormat};
pub use source::{PcmData, Source, SourceKey};
