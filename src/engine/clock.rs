//! Tempo-continuous beat clock.
//!
//! Beat position is a linear function of the frame counter between tempo
//! changes. When the tempo changes, the clock re-anchors at the current frame
//! so the beat value carries on from where the old rate left it.

/// Frame-to-beat mapping shared by every Sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatClock {
    anchor_frame: u64,
    anchor_beat: f64,
    /// Tempo requested by the latest program.
    tempo: f64,
    /// Tempo the current anchor runs at.
    running_tempo: f64,
}

impl BeatClock {
    pub fn new(tempo: f64) -> Self {
        Self {
            anchor_frame: 0,
            anchor_beat: 0.0,
            tempo,
            running_tempo: tempo,
        }
    }

    /// Request a new tempo. It takes effect at the next [`retime`](Self::retime).
    pub fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo;
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Apply a pending tempo change at `frame`, keeping the beat continuous.
    pub fn retime(&mut self, frame: u64, sample_rate: u32) {
        if self.tempo == self.running_tempo {
            return;
        }
        self.anchor_beat = self.beat_at(frame, sample_rate);
        self.anchor_frame = frame;
        self.running_tempo = self.tempo;
    }

    pub fn beats_per_frame(&self, sample_rate: u32) -> f64 {
        self.running_tempo / (60.0 * sample_rate as f64)
    }

    /// Beat position at `frame` under the running tempo.
    pub fn beat_at(&self, frame: u64, sample_rate: u32) -> f64 {
        let elapsed = frame as f64 - self.anchor_frame as f64;
        self.anchor_beat + elapsed * self.beats_per_frame(sample_rate)
    }
}
