//! Passthrough effect.
//!
//! Copies input to output unchanged. Useful as a chain placeholder and
//! for exercising the chain plumbing in tests.

use mx_core::{AudioBuffer, Effect};

pub struct Passthrough;

impl Effect for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn process(&mut self, input: &AudioBuffer, output: &mut AudioBuffer) {
        output.copy_from(input);
    }
}
