//! Scalar gain stage.

use mx_core::{AudioBuffer, Effect};

/// Multiplies every sample by a fixed factor. Stateless.
pub struct Gain {
    gain: f32,
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }
}

impl Effect for Gain {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn process(&mut self, input: &AudioBuffer, output: &mut AudioBuffer) {
        for ch in 0..input.channels() {
            let src = input.channel(ch);
            let dst = output.channel_mut(ch);
            for i in 0..src.len() {
                dst[i] = src[i] * self.gain;
            }
        }
    }
}
