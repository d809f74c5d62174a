//! CPAL-based audio sink.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traits::{AudioError, AudioSink};

/// CPAL-backed sink feeding the default output device through a ring of
/// interleaved f32 samples.
pub struct CpalSink {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<f32>,
    consumer: Option<HeapCons<f32>>,
    running: Arc<AtomicBool>,
}

impl CpalSink {
    /// Open the default output device in stereo at its default rate.
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // Force stereo output; the callback assumes 2-channel interleaving.
        config.channels = 2;

        // Ring of about 100ms of interleaved samples.
        let capacity = (config.sample_rate.0 as usize / 10) * config.channels as usize;
        let rb = HeapRb::<f32>::new(capacity);
        let (producer, consumer) = rb.split();

        Ok(Self {
            device,
            config,
            stream: None,
            producer,
            consumer: Some(consumer),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Build and start the output stream. Must be called once before
    /// [`AudioSink::start`].
    pub fn build_stream(&mut self) -> Result<(), AudioError> {
        let mut consumer = self
            .consumer
            .take()
            .ok_or_else(|| AudioError::StreamCreate("stream already built".into()))?;
        let running = self.running.clone();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    for sample in data.iter_mut() {
                        *sample = consumer.try_pop().unwrap_or(0.0);
                    }
                },
                |err| eprintln!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Push samples, spinning until the ring has room for all of them.
    /// Used by the render thread to pace itself against the callback.
    pub fn write_spin(&mut self, samples: &[f32]) {
        for &sample in samples {
            while self.producer.try_push(sample).is_err() {
                std::hint::spin_loop();
            }
        }
    }
}

impl AudioSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn write(&mut self, samples: &[f32]) {
        for &sample in samples {
            // Non-blocking push; drop samples if the ring is full.
            let _ = self.producer.try_push(sample);
        }
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream
                .play()
                .map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream
                .pause()
                .map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
