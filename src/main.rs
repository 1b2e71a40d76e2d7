//! fzrth: play, render or evaluate pattern language source.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use fzrth::audio::AudioEngine;
use fzrth::config::EngineConfig;
use fzrth::engine::{Engine, Inbound, Outbound, SampleBuffer};

#[derive(Parser)]
#[command(name = "fzrth")]
#[command(about = "Stack-based live coding pattern language", long_about = None)]
struct Cli {
    /// Engine config file (default: ~/.fzrth/engine.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a source file, reloading it whenever it changes
    Play {
        file: PathBuf,

        /// Directory holding `<name>.wav` for requested samples
        #[arg(short, long)]
        samples: Option<PathBuf>,

        /// How often to check the file for changes, in milliseconds
        #[arg(long, default_value = "100")]
        poll_ms: u64,

        /// Output volume, 0.0 to 1.0
        #[arg(short, long, default_value = "1.0")]
        volume: f32,
    },

    /// Render a source file to a mono WAV
    Render {
        file: PathBuf,

        /// Length in seconds
        #[arg(short = 'n', long, default_value = "10.0")]
        seconds: f64,

        /// Output WAV path
        #[arg(short, long, default_value = "out.wav")]
        out: PathBuf,

        /// Sample rate in Hz
        #[arg(short = 'r', long, default_value = "44100")]
        sample_rate: u32,

        /// Directory holding `<name>.wav` for requested samples
        #[arg(short, long)]
        samples: Option<PathBuf>,
    },

    /// Evaluate code without playing it and print the result
    Eval { code: String },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };

    match cli.command {
        Commands::Play {
            file,
            samples,
            poll_ms,
            volume,
        } => play(config, &file, samples.as_deref(), poll_ms, volume),
        Commands::Render {
            file,
            seconds,
            out,
            sample_rate,
            samples,
        } => render(config, &file, seconds, &out, sample_rate, samples.as_deref()),
        Commands::Eval { code } => {
            println!("{}", Engine::new(config).evaluate(&code));
            Ok(())
        }
    }
}

fn play(
    config: EngineConfig,
    file: &Path,
    samples: Option<&Path>,
    poll_ms: u64,
    volume: f32,
) -> Result<(), Box<dyn Error>> {
    let mut audio = AudioEngine::new(config)?;
    audio.set_volume(volume)?;
    info!(
        sample_rate = audio.sample_rate(),
        channels = audio.channels(),
        file = %file.display(),
        "playing"
    );

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;

    let mut modified: Option<SystemTime> = None;
    while running.load(Ordering::SeqCst) {
        let stamp = std::fs::metadata(file).and_then(|m| m.modified()).ok();
        if stamp.is_some() && stamp != modified {
            modified = stamp;
            match std::fs::read_to_string(file) {
                Ok(source) => {
                    info!("reloading {}", file.display());
                    audio.send(Inbound::Source(source))?;
                }
                Err(e) => warn!("cannot read {}: {e}", file.display()),
            }
        }

        for message in audio.poll() {
            match message {
                Outbound::Request(names) => {
                    for (name, buffer) in load_samples(samples, &names) {
                        audio.send(Inbound::Sample { name, buffer })?;
                    }
                }
                Outbound::Highlight(ranges) => debug!(?ranges, "highlight"),
                Outbound::Result(text) => println!("{text}"),
            }
        }

        thread::sleep(Duration::from_millis(poll_ms));
    }

    audio.stop()?;
    info!("stopped");
    Ok(())
}

fn render(
    config: EngineConfig,
    file: &Path,
    seconds: f64,
    out: &Path,
    sample_rate: u32,
    samples: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let source = std::fs::read_to_string(file)?;
    let block_size = config.block_size.max(1);
    let mut engine = Engine::new(config);
    engine.handle(Inbound::Source(source));

    for message in engine.drain_outbound() {
        if let Outbound::Request(names) = message {
            for (name, buffer) in load_samples(samples, &names) {
                engine.register_sample(name, buffer);
            }
        }
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(out, spec)?;

    let total = (seconds.max(0.0) * sample_rate as f64) as u64;
    let mut block = vec![0.0f32; block_size];
    let mut frame = 0u64;
    while frame < total {
        let len = block_size.min((total - frame) as usize);
        engine.render(&mut block[..len], frame, sample_rate);
        for &sample in &block[..len] {
            writer.write_sample(sample)?;
        }
        engine.drain_outbound();
        frame += len as u64;
    }
    writer.finalize()?;

    info!(frames = total, out = %out.display(), "rendered");
    Ok(())
}

/// Load `<dir>/<name>.wav` for each requested name that exists.
fn load_samples(dir: Option<&Path>, names: &[String]) -> Vec<(String, SampleBuffer)> {
    let Some(dir) = dir else {
        warn!(?names, "samples requested but no sample directory given");
        return Vec::new();
    };
    names
        .iter()
        .filter_map(|name| {
            let path = dir.join(format!("{name}.wav"));
            match SampleBuffer::open(&path) {
                Ok(buffer) => {
                    info!(name = %name, "loaded sample");
                    Some((name.clone(), buffer))
                }
                Err(e) => {
                    warn!("cannot load {}: {e}", path.display());
                    None
                }
            }
        })
        .collect()
}
