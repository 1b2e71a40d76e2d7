//! Render engine: compiles inbound source, schedules steps against the beat
//! clock and mixes every Sound into a mono block.
//!
//! The engine is single-threaded and owns all playback state. A host feeds it
//! [`Inbound`] messages, calls [`Engine::render`] once per block with the
//! absolute frame counter, and collects [`Outbound`] messages afterwards.

pub mod clock;
pub mod message;
pub mod sample;
pub mod sound;
pub mod waveform;

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dsl::{CompileError, Compiler};
use crate::pattern::Env;

pub use clock::BeatClock;
pub use message::{Inbound, Outbound};
pub use sample::{SampleBank, SampleBuffer, SampleError};
pub use sound::{RenderContext, Sound, Voice};
pub use waveform::Waveform;

pub struct Engine {
    config: EngineConfig,
    sounds: Vec<Sound>,
    samples: SampleBank,
    clock: BeatClock,
    rng: ChaCha8Rng,
    outbox: Vec<Outbound>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            clock: BeatClock::new(config.default_bpm),
            rng: ChaCha8Rng::seed_from_u64(config.noise_seed),
            sounds: Vec::new(),
            samples: SampleBank::new(),
            outbox: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sounds(&self) -> &[Sound] {
        &self.sounds
    }

    pub fn samples(&self) -> &SampleBank {
        &self.samples
    }

    /// The committed tempo.
    pub fn tempo(&self) -> f64 {
        self.clock.tempo()
    }

    pub fn clock(&self) -> &BeatClock {
        &self.clock
    }

    pub fn handle(&mut self, message: Inbound) {
        match message {
            Inbound::Source(source) => {
                if let Err(e) = self.load(&source) {
                    warn!("compile failed, keeping previous program: {e}");
                }
            }
            Inbound::Eval(code) => {
                let reply = self.evaluate(&code);
                self.outbox.push(Outbound::Result(reply));
            }
            Inbound::Sample { name, buffer } => self.register_sample(name, buffer),
        }
    }

    /// Compile `source` and replace the live program with it.
    ///
    /// On error nothing changes: the previous Sounds and tempo keep playing.
    pub fn load(&mut self, source: &str) -> Result<(), CompileError> {
        let program = Compiler::compile(source, self.clock.tempo())?;

        let mut sounds: Vec<Sound> = program
            .commands
            .into_iter()
            .map(|cmd| Sound::new(cmd.pattern, cmd.waveform))
            .collect();
        if self.config.carry_voices {
            carry_voices(&mut self.sounds, &mut sounds);
        }
        self.sounds = sounds;
        self.clock.set_tempo(program.bpm);

        info!(
            sounds = self.sounds.len(),
            bpm = program.bpm,
            "program loaded"
        );

        let missing: Vec<String> = program
            .requests
            .into_iter()
            .filter(|name| !self.samples.contains(name))
            .collect();
        if !missing.is_empty() {
            debug!(?missing, "requesting samples");
            self.outbox.push(Outbound::Request(missing));
        }
        Ok(())
    }

    /// Compile without committing and format the result. Errors are
    /// reported as text.
    pub fn evaluate(&self, code: &str) -> String {
        match Compiler::evaluate(code, self.clock.tempo()) {
            Ok(text) => text,
            Err(e) => e.to_string(),
        }
    }

    pub fn register_sample(&mut self, name: String, buffer: SampleBuffer) {
        debug!(
            name = %name,
            frames = buffer.len(),
            sample_rate = buffer.sample_rate(),
            "sample registered"
        );
        self.samples.insert(name, buffer);
    }

    /// Render one mono block starting at absolute frame `frame`.
    pub fn render(&mut self, output: &mut [f32], frame: u64, sample_rate: u32) {
        self.clock.retime(frame, sample_rate);
        let timing = self.config.chord_timing();
        let max_steps = self.config.max_steps_per_sample;
        let mut ranges = BTreeSet::new();

        let mut ctx = RenderContext {
            config: &self.config,
            samples: &self.samples,
            rng: &mut self.rng,
            sample_rate,
        };

        for (i, out) in output.iter_mut().enumerate() {
            let absolute = frame + i as u64;
            let beat = self.clock.beat_at(absolute, sample_rate);
            let env = Env::at_frame(absolute, sample_rate, beat);

            let mut signal = 0.0;
            for sound in &mut self.sounds {
                sound.advance(&env, &timing, max_steps);
                if i == 0 {
                    if let Some(step) = sound.current() {
                        ranges.extend(step.ranges.iter().copied());
                    }
                }
                signal += sound.render(&env, &mut ctx);
            }
            *out = (signal * ctx.config.headroom) as f32;
        }

        if !ranges.is_empty() {
            let ranges: Vec<_> = ranges.into_iter().collect();
            debug!(count = ranges.len(), "highlight");
            self.outbox.push(Outbound::Highlight(ranges));
        }
    }

    /// Drop every live Sound. Tempo and samples are kept.
    pub fn silence(&mut self) {
        self.sounds.clear();
    }

    /// Take every message produced since the last call.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Move voices from replaced Sounds to new Sounds with the same signature.
/// Each old Sound hands its voices to at most one new Sound.
fn carry_voices(old: &mut [Sound], new: &mut [Sound]) {
    let mut claimed = vec![false; old.len()];
    for sound in new.iter_mut() {
        let found =
            (0..old.len()).find(|&i| !claimed[i] && old[i].signature() == sound.signature());
        if let Some(i) = found {
            claimed[i] = true;
            sound.adopt_voices(old[i].take_voices());
        }
    }
}
