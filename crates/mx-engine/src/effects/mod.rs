//! Built-in effect implementations.

mod gain;
mod lowpass;
mod passthrough;

pub use gain::Gain;
pub use lowpass::{OnePoleLowPass, DEFAULT_CUTOFF_HZ};
pub use passthrough::Passthrough;

use alloc::boxed::Box;
use mx_core::Effect;

/// Create a built-in effect by name.
///
/// Unknown names yield `None` rather than a silent substitute; the caller
/// decides whether that is fatal.
pub fn create_effect(name: &str, sample_rate: u32) -> Option<Box<dyn Effect>> {
    Some(match name {
        "gain" => Box::new(Gain::new(1.0)),
        "lowpass" => Box::new(OnePoleLowPass::new(DEFAULT_CUTOFF_HZ, sample_rate)),
        "passthrough" => Box::new(Passthrough),
        _ => return None,
    })
}
