//! Commands sent from the control thread to the audio thread via ring buffer.

use crate::engine::Inbound;

#[derive(Debug)]
pub enum AudioCommand {
    /// Forward a message to the engine.
    Message(Inbound),

    /// Set output volume (0.0 to 1.0).
    SetVolume(f32),

    /// Drop every live Sound.
    Stop,
}
