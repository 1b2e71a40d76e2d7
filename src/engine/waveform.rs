//! Waveform kinds and shape functions.

use std::f64::consts::TAU;

use rand::Rng;

/// How a Sound turns resolved leaf values into signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
    Noise,
    /// Resolved values are added to the mix directly.
    Raw,
    /// Resolved text names a sample buffer to play back.
    Sample,
}

impl Waveform {
    pub const ALL: [Waveform; 7] = [
        Waveform::Sine,
        Waveform::Saw,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Noise,
        Waveform::Raw,
        Waveform::Sample,
    ];

    /// The command word that renders with this waveform.
    pub fn word(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Saw => "saw",
            Waveform::Square => "sqr",
            Waveform::Triangle => "tri",
            Waveform::Noise => "noise",
            Waveform::Raw => "raw",
            Waveform::Sample => "play",
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.word() == word)
    }
}

/// One sample of `waveform` at `phase` (in cycles, any range).
///
/// Noise ignores the phase and draws from `rng`. Raw returns its input. Sample
/// has no shape and reads as silence here.
pub fn oscillator<R: Rng>(waveform: Waveform, phase: f64, rng: &mut R) -> f64 {
    let p = phase.rem_euclid(1.0);
    match waveform {
        Waveform::Sine => (phase * TAU).sin(),
        Waveform::Saw => p * 2.0 - 1.0,
        Waveform::Square => {
            if p < 0.5 {
                0.5
            } else {
                -0.5
            }
        }
        Waveform::Triangle => (p * 4.0 - 2.0).abs() - 1.0,
        Waveform::Noise => rng.gen_range(-1.0..=1.0),
        Waveform::Raw => phase,
        Waveform::Sample => 0.0,
    }
}
