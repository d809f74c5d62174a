//! mixdown CLI — play a WAV through a submix tree or export a mix.
//!
//! Usage:
//!   mixdown path/to/file.wav
//!   mixdown path/to/file.wav --wav output.wav --seconds 5
//!   mixdown path/to/file.wav --volume 0.5 --pitch 1.2 --lowpass

use std::io::Write;

use mx_master::effects::OnePoleLowPass;
use mx_master::{Device, SampleFormat, TimeUnit, VoiceKey};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let path = args.get(1).unwrap_or_else(|| {
        eprintln!("Usage: mixdown <file.wav> [--wav out.wav] [--seconds N] [--volume V] [--pitch P] [--lowpass]");
        std::process::exit(1);
    });

    let flag_value = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let wav_path = flag_value("--wav");
    let seconds: u32 = flag_value("--seconds").and_then(|s| s.parse().ok()).unwrap_or(10);
    let volume: f32 = flag_value("--volume").and_then(|s| s.parse().ok()).unwrap_or(1.0);
    let pitch: f32 = flag_value("--pitch").and_then(|s| s.parse().ok()).unwrap_or(1.0);
    let lowpass = args.iter().any(|a| a == "--lowpass");

    let device = Device::new();
    let source = device.load_sound(path).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {}", path, e);
        std::process::exit(1);
    });

    let format = device.source_format(source).expect("source just loaded");
    println!("File:      {}", path);
    println!("Format:    {}", format_name(format.sample_format));
    println!("Channels:  {}", format.channels);
    println!("Frequency: {} Hz", format.frequency);
    println!();

    // One bus under the master so bus-level controls have somewhere to live.
    let bus = device.create_submix(None).expect("master exists");
    device.set_submix_volume(bus, volume).expect("bus is live");
    device.set_submix_pitch(bus, pitch).expect("bus is live");
    if lowpass {
        device
            .add_submix_effect(bus, Box::new(OnePoleLowPass::new(2000.0, 48000)))
            .expect("bus is live");
    }

    let voice = device.play_sound(source, Some(bus), false).unwrap_or_else(|e| {
        eprintln!("Failed to play: {}", e);
        std::process::exit(1);
    });

    match wav_path {
        Some(out) => export(&device, &out, seconds),
        None => play(device, voice),
    }
}

fn format_name(format: SampleFormat) -> &'static str {
    match format {
        SampleFormat::Pcm8 => "pcm8",
        SampleFormat::Pcm16 => "pcm16",
        SampleFormat::Pcm24 => "pcm24",
        SampleFormat::Pcm32 => "pcm32",
        SampleFormat::PcmFloat => "pcm float",
    }
}

fn play(mut device: Device, voice: VoiceKey) {
    device.start();
    println!("Playing...");

    while device.is_active() && device.is_playing(voice) {
        if let Some(ms) = device.playback_position(voice, TimeUnit::Milliseconds) {
            print!("\r{}.{:03}s", ms / 1000, ms % 1000);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    device.stop();
    println!("\rDone.      ");
}

fn export(device: &Device, out: &str, seconds: u32) {
    println!("Rendering {} seconds to {}...", seconds, out);
    let wav = device.render_to_wav(seconds);
    match std::fs::write(out, &wav) {
        Ok(()) => println!("Wrote {} bytes.", wav.len()),
        Err(e) => {
            eprintln!("Failed to write {}: {}", out, e);
            std::process::exit(1);
        }
    }
}
