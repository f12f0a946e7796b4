//! Play the synth from a MIDI keyboard.
//!
//! ```plaintext
//! cargo run --example midi_synth -- --port "Mobile Keys" fm --fmod 2 --amod 8
//! ```

use std::sync::mpsc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use happy_fm::{AdsrConfig, Config, Event, Flow, Synth, TuningMode, Waveform, SAMPLE_RATE};
use midir::MidiInput;

#[derive(Parser)]
struct Args {
    /// Substring of the MIDI input port name. The first port is used if
    /// omitted.
    #[arg(long)]
    port: Option<String>,
    /// `equal`, `just[:KEY]` or `pythagorean[:KEY]`.
    #[arg(long, default_value = "equal")]
    tuning: String,
    #[arg(long, default_value_t = 10.0)]
    attack: f32,
    #[arg(long, default_value_t = 100.0)]
    decay: f32,
    #[arg(long, default_value_t = 0.7)]
    sustain: f32,
    #[arg(long, default_value_t = 200.0)]
    release: f32,
    #[arg(long, default_value_t = 5)]
    compression: usize,
    /// Controller number that stops the synth when it drops to zero.
    #[arg(long)]
    stop_controller: Option<u8>,
    #[command(subcommand)]
    waveform: Option<WaveformArg>,
}

#[derive(Subcommand)]
enum WaveformArg {
    Sine,
    Saw,
    Square,
    Triangle,
    Fm {
        #[arg(long, default_value_t = 0.0)]
        fmod: f64,
        #[arg(long, default_value_t = 4.0)]
        amod: f64,
    },
    /// Extract a wavetable from a mono 48 kHz WAV file.
    Wavetable { path: std::path::PathBuf },
}

impl WaveformArg {
    fn into_waveform(self) -> Result<Waveform> {
        Ok(match self {
            WaveformArg::Sine => Waveform::Sine,
            WaveformArg::Saw => Waveform::Saw,
            WaveformArg::Square => Waveform::Square,
            WaveformArg::Triangle => Waveform::Triangle,
            WaveformArg::Fm { fmod, amod } => Waveform::Fm { fmod, amod },
            WaveformArg::Wavetable { path } => Waveform::Wavetable(std::fs::read(path)?),
        })
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = Config {
        waveform: args
            .waveform
            .unwrap_or(WaveformArg::Sine)
            .into_waveform()?,
        tuning: args.tuning.parse::<TuningMode>()?,
        adsr: AdsrConfig {
            attack_ms: args.attack,
            decay_ms: args.decay,
            sustain: args.sustain,
            release_ms: args.release,
        },
        compression_threshold: args.compression,
        stop_controller: args.stop_controller,
        // B5 and C5 together
        stop_chord: Some((83, 84)),
        ..Default::default()
    };
    let release_tail = Duration::from_secs_f32(args.release * 1.05 / 1000.0 + 0.1);
    let (mut sender, mut renderer) = Synth::new(cfg)?.split();

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))?;
    let stream_config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };
    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| renderer.fill_f32(data),
        |e| log::error!("audio stream error: {e}"),
        None,
    )?;
    stream.play()?;

    let midi_in = MidiInput::new("happy-fm")?;
    let ports = midi_in.ports();
    let port = ports
        .iter()
        .find(|p| match &args.port {
            Some(name) => midi_in
                .port_name(p)
                .map(|n| n.contains(name.as_str()))
                .unwrap_or(false),
            None => true,
        })
        .ok_or_else(|| anyhow!("No matching MIDI input port"))?
        .clone();
    println!("Listening on {}", midi_in.port_name(&port)?);

    let (stop_tx, stop_rx) = mpsc::channel();
    let _conn = midi_in
        .connect(
            &port,
            "happy-fm-input",
            move |_stamp, message, _| {
                let Some(event) = Event::from_midi_logged(message) else {
                    return;
                };
                match sender.send(event) {
                    Ok(Flow::Stop) => {
                        stop_tx.send(()).ok();
                    }
                    Ok(Flow::Continue) => {}
                    Err(e) => log::warn!("{e}"),
                }
            },
            (),
        )
        .map_err(|e| anyhow!("Failed to connect to MIDI port: {}", e))?;

    stop_rx.recv()?;
    println!("Stopping");
    std::thread::sleep(release_tail);
    drop(stream);
    Ok(())
}
