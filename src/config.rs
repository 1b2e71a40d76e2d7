//! Engine configuration, stored as YAML at `~/.fzrth/engine.yaml`.
//!
//! Every field has a default, so a partial file (or none at all) is valid.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pattern::ChordTiming;

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Yaml(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

/// Tuning for the render engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tempo before any program sets one.
    pub default_bpm: f64,
    /// Per-sample approach rate of oscillator frequency toward its target.
    pub frequency_smoothing: f64,
    /// Per-sample approach rate of oscillator amplitude toward its target.
    pub amplitude_smoothing: f64,
    /// Oscillators below this smoothed amplitude are skipped.
    pub amplitude_gate: f64,
    /// Final mix attenuation.
    pub headroom: f64,
    pub chord_min_step: f64,
    pub chord_stall: f64,
    pub chord_epsilon: f64,
    /// Upper bound on steps pulled for one Sound in one sample.
    pub max_steps_per_sample: usize,
    /// Hand voices of a replaced Sound to a new Sound with the same signature.
    pub carry_voices: bool,
    pub noise_seed: u64,
    /// Frames per render call in offline rendering.
    pub block_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let timing = ChordTiming::default();
        Self {
            default_bpm: 120.0,
            frequency_smoothing: 0.05,
            amplitude_smoothing: 0.05,
            amplitude_gate: 0.001,
            headroom: 0.2,
            chord_min_step: timing.min_step,
            chord_stall: timing.stall,
            chord_epsilon: timing.epsilon,
            max_steps_per_sample: 256,
            carry_voices: false,
            noise_seed: 42,
            block_size: 128,
        }
    }
}

impl EngineConfig {
    pub fn chord_timing(&self) -> ChordTiming {
        ChordTiming {
            min_step: self.chord_min_step,
            stall: self.chord_stall,
            epsilon: self.chord_epsilon,
        }
    }

    /// Load from the default path, falling back to defaults if it is absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".fzrth");
    path.push("engine.yaml");
    path
}
