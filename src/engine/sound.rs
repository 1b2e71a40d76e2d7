//! Sounds and their voices.
//!
//! A [`Sound`] is one committed render command: a lowered pattern tree, the
//! waveform it plays with, and the playback state that advances as the beat
//! clock moves. Each leaf of the current step drives one [`Voice`].

use rand_chacha::ChaCha8Rng;

use crate::config::EngineConfig;
use crate::dsl::SourceRange;
use crate::pattern::{resolve, ChordTiming, Env, PatternNode, PatternTree, Step, StepIter, Value};

use super::sample::SampleBank;
use super::waveform::{oscillator, Waveform};

/// Per-leaf playback state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Voice {
    /// Oscillator phase in cycles, kept in [0, 1).
    pub phase: f64,
    /// Smoothed frequency in Hz.
    pub freq: f64,
    /// Smoothed amplitude.
    pub amp: f64,
    /// Sample playback position in seconds.
    pub position: f64,
}

/// Shared state a Sound reads while rendering one output sample.
pub struct RenderContext<'a> {
    pub config: &'a EngineConfig,
    pub samples: &'a SampleBank,
    pub rng: &'a mut ChaCha8Rng,
    pub sample_rate: u32,
}

#[derive(Debug)]
pub struct Sound {
    tree: PatternTree,
    waveform: Waveform,
    signature: String,
    steps: StepIter,
    current: Option<Step>,
    /// Beat at which the current step ends; unset until first rendered.
    end_beat: Option<f64>,
    voices: Vec<Voice>,
}

impl Sound {
    pub fn new(pattern: PatternNode, waveform: Waveform) -> Self {
        let mut signature = String::new();
        pattern.write_signature(&mut signature);
        signature.push(':');
        signature.push_str(waveform.word());

        Self {
            tree: PatternTree::lower(pattern),
            waveform,
            signature,
            steps: StepIter::new(),
            current: None,
            end_beat: None,
            voices: Vec::new(),
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Structural identity: tree shape, literal values, static gains and the
    /// waveform. Source positions and cycle cursors do not take part.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn current(&self) -> Option<&Step> {
        self.current.as_ref()
    }

    pub fn end_beat(&self) -> Option<f64> {
        self.end_beat
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn take_voices(&mut self) -> Vec<Voice> {
        std::mem::take(&mut self.voices)
    }

    pub fn adopt_voices(&mut self, voices: Vec<Voice>) {
        self.voices = voices;
    }

    /// Pull steps until the current one covers `env.beat`.
    ///
    /// A Sound that has not played yet anchors to the start of the current
    /// beat. At most `max_steps` steps are pulled per call.
    pub fn advance(&mut self, env: &Env, timing: &ChordTiming, max_steps: usize) {
        let beat = env.beat;
        let end = self.end_beat.get_or_insert(beat.floor());

        let mut pulled = 0;
        while beat >= *end && pulled < max_steps {
            let mut step = self.steps.next(&mut self.tree, env, timing);
            if !(step.duration.is_finite() && step.duration > 0.0) {
                step.duration = timing.min_step;
            }
            *end += step.duration;

            self.voices.resize_with(step.leaves.len(), Voice::default);
            if self.waveform == Waveform::Sample {
                for voice in &mut self.voices {
                    voice.position = 0.0;
                }
            }
            self.current = Some(step);
            pulled += 1;
        }
    }

    /// This Sound's contribution to one output sample.
    pub fn render(&mut self, env: &Env, ctx: &mut RenderContext<'_>) -> f64 {
        let Some(step) = &self.current else {
            return 0.0;
        };
        let sample_rate = ctx.sample_rate as f64;
        let mut signal = 0.0;

        for (i, (&leaf, voice)) in step.leaves.iter().zip(self.voices.iter_mut()).enumerate() {
            let Some(node) = self.tree.leaf(leaf) else {
                continue;
            };
            let gain = step.gains.get(i).copied().unwrap_or(1.0);
            let value = resolve(node, env);

            match self.waveform {
                Waveform::Raw => {
                    let v = value.as_number() * gain;
                    if v.is_finite() {
                        signal += v;
                    }
                }
                Waveform::Sample => {
                    let buffer = value.as_text().and_then(|name| ctx.samples.get(name));
                    if let Some(buffer) = buffer {
                        if gain.is_finite() {
                            signal += buffer.at(voice.position) as f64 * gain;
                        }
                        voice.position += 1.0 / sample_rate;
                    }
                }
                waveform => {
                    let target_freq = match value {
                        Value::Number(n) if n.is_finite() => n,
                        _ => 0.0,
                    };
                    let target_amp = if target_freq > 0.0 && gain.is_finite() {
                        gain
                    } else {
                        0.0
                    };
                    voice.freq += (target_freq - voice.freq) * ctx.config.frequency_smoothing;
                    voice.amp += (target_amp - voice.amp) * ctx.config.amplitude_smoothing;

                    if voice.amp > ctx.config.amplitude_gate {
                        voice.phase = (voice.phase + voice.freq / sample_rate).rem_euclid(1.0);
                        signal += oscillator(waveform, voice.phase, ctx.rng) * voice.amp;
                    }
                }
            }
        }
        signal
    }

    /// Append the ranges of the current step.
    pub fn collect_ranges(&self, out: &mut Vec<SourceRange>) {
        if let Some(step) = &self.current {
            out.extend_from_slice(&step.ranges);
        }
    }
}
