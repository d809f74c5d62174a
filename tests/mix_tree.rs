//! End-to-end mix-tree scenarios through the device facade.

use mx_core::{AudioFormat, SampleFormat, Source};
use mx_engine::effects::Passthrough;
use mx_master::{Device, DeviceError, TimeUnit, VoiceState};

const RATE: u32 = 48000;

fn constant_source(value: f32, frames: usize) -> Source {
    let bytes: Vec<u8> = std::iter::repeat(value)
        .take(frames)
        .flat_map(|v| v.to_le_bytes())
        .collect();
    Source::from_vec(AudioFormat::new(SampleFormat::PcmFloat, 1, RATE), bytes)
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()))
}

#[test]
fn sfx_bus_gain_reaches_the_master_output() {
    let device = Device::with_output(RATE, 2);
    let src = device.add_source(constant_source(1.0, RATE as usize));

    let sfx = device.create_submix(None).unwrap();
    device.set_submix_volume(sfx, 0.0625).unwrap();
    device.play_sound(src, Some(sfx), false).unwrap();

    let samples = device.render_frames(512);
    assert!((peak(&samples) - 0.0625).abs() < 1e-6);
}

#[test]
fn two_buses_mix_independently() {
    let device = Device::with_output(RATE, 2);
    let src = device.add_source(constant_source(0.5, RATE as usize));

    let sfx = device.create_submix(None).unwrap();
    let music = device.create_submix(None).unwrap();
    device.set_submix_volume(sfx, 0.5).unwrap();
    device.play_sound(src, Some(sfx), false).unwrap();
    device.play_sound(src, Some(music), false).unwrap();

    // 0.5 * 0.5 from sfx plus 0.5 from music.
    let samples = device.render_frames(64);
    assert!((samples[0] - 0.75).abs() < 1e-6);
}

#[test]
fn cycle_rejection_leaves_the_tree_usable() {
    let device = Device::with_output(RATE, 2);
    let a = device.create_submix(None).unwrap();
    let b = device.create_submix(Some(a)).unwrap();

    let result = device.attach_submix(a, b);
    assert!(matches!(
        result,
        Err(DeviceError::Engine(mx_core::Error::Cycle))
    ));

    // The rejected mutation must not have disturbed routing: audio still
    // flows through both buses.
    let src = device.add_source(constant_source(0.25, RATE as usize));
    device.play_sound(src, Some(b), false).unwrap();
    let samples = device.render_frames(64);
    assert!((peak(&samples) - 0.25).abs() < 1e-6);
}

#[test]
fn release_stops_every_attached_voice() {
    let device = Device::with_output(RATE, 2);
    let src = device.add_source(constant_source(1.0, RATE as usize));

    let bus = device.create_submix(None).unwrap();
    let v1 = device.play_sound(src, Some(bus), false).unwrap();
    let v2 = device.play_sound(src, Some(bus), false).unwrap();

    device.release_submix(bus).unwrap();
    assert!(!device.is_playing(v1));
    assert!(!device.is_playing(v2));
    assert_eq!(peak(&device.render_frames(64)), 0.0);
}

#[test]
fn pause_bus_freezes_and_resume_continues() {
    let device = Device::with_output(RATE, 2);
    let src = device.add_source(constant_source(1.0, RATE as usize));

    let bus = device.create_submix(None).unwrap();
    let voice = device.play_sound(src, Some(bus), false).unwrap();

    device.render_frames(256);
    assert_eq!(device.playback_position(voice, TimeUnit::Frames), Some(256));

    device.set_submix_paused(bus, true).unwrap();
    let silent = device.render_frames(256);
    assert_eq!(peak(&silent), 0.0);
    assert_eq!(device.playback_position(voice, TimeUnit::Frames), Some(256));

    device.set_submix_paused(bus, false).unwrap();
    device.render_frames(256);
    assert_eq!(device.playback_position(voice, TimeUnit::Frames), Some(512));
}

#[test]
fn passthrough_chain_is_bit_identical() {
    let reference = {
        let device = Device::with_output(RATE, 2);
        let src = device.add_source(constant_source(0.3, RATE as usize));
        device.play_sound(src, None, false).unwrap();
        device.render_frames(128)
    };

    let with_chain = {
        let device = Device::with_output(RATE, 2);
        let src = device.add_source(constant_source(0.3, RATE as usize));
        let voice = device.play_sound(src, None, false).unwrap();
        device.add_voice_effect(voice, Box::new(Passthrough)).unwrap();
        device
            .add_submix_effect(device.master(), Box::new(Passthrough))
            .unwrap();
        device.render_frames(128)
    };

    assert_eq!(reference, with_chain);
}

#[test]
fn loop_once_finishes_after_exactly_double_length() {
    let device = Device::with_output(RATE, 2);
    let src = device.add_source(constant_source(1.0, 48000));
    let voice = device.play_sound(src, None, false).unwrap();
    device.set_loop_count(voice, 1).unwrap();

    // 96 blocks of 1000 frames consume both passes exactly.
    for _ in 0..96 {
        device.render_frames(1000);
    }
    assert_eq!(device.voice_state(voice), Some(VoiceState::Finished));
    assert!(!device.is_playing(voice));

    let tail = device.render_frames(1000);
    assert_eq!(tail.len(), 2000);
    assert_eq!(peak(&tail), 0.0);
}

#[test]
fn clamped_parameters_read_back_clamped() {
    let device = Device::with_output(RATE, 2);
    let src = device.add_source(constant_source(1.0, 64));
    let voice = device.play_sound(src, None, true).unwrap();

    device.set_volume(voice, -5.0).unwrap();
    device.set_pan(voice, 3.0).unwrap();
    device.with_engine(|engine| {
        let v = engine.graph().voice(voice).unwrap();
        assert_eq!(v.volume(), 0.0);
        assert_eq!(v.pan(), 1.0);
    });
}

#[test]
fn moving_a_voice_between_buses_moves_its_gain() {
    let device = Device::with_output(RATE, 2);
    let src = device.add_source(constant_source(1.0, RATE as usize));

    let quiet = device.create_submix(None).unwrap();
    let loud = device.create_submix(None).unwrap();
    device.set_submix_volume(quiet, 0.25).unwrap();
    device.set_submix_volume(loud, 1.0).unwrap();

    let voice = device.play_sound(src, Some(quiet), false).unwrap();
    assert!((peak(&device.render_frames(64)) - 0.25).abs() < 1e-6);

    device.assign_to_submix(voice, loud).unwrap();
    assert!((peak(&device.render_frames(64)) - 1.0).abs() < 1e-6);
}
