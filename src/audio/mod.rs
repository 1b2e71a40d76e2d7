//! Audio host: cpal output stream with the engine running in its callback.
//!
//! The control thread talks to the audio thread through two lock-free ring
//! buffers: [`AudioCommand`]s go in, engine [`Outbound`] messages come back.

pub mod callback;
pub mod command;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapRb,
};
use tracing::{error, info};

pub use command::AudioCommand;

use callback::AudioCallback;

use crate::config::EngineConfig;
use crate::engine::{Engine, Inbound, Outbound};

/// Ring buffer capacity (number of commands).
const RING_BUFFER_CAPACITY: usize = 1024;

/// Outbound capacity; highlights arrive once per block, so leave room for a
/// slow reader.
const OUTBOUND_CAPACITY: usize = 4096;

#[derive(Debug)]
pub enum AudioError {
    /// No audio output device found.
    NoOutputDevice,
    /// Failed to query device configuration.
    DeviceConfig(String),
    /// Failed to build the audio stream.
    StreamBuild(String),
    /// Failed to start the audio stream.
    StreamPlay(String),
    /// Ring buffer is full: audio thread is not draining fast enough.
    BufferFull,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoOutputDevice => write!(f, "no audio output device found"),
            AudioError::DeviceConfig(e) => write!(f, "device config error: {e}"),
            AudioError::StreamBuild(e) => write!(f, "stream build error: {e}"),
            AudioError::StreamPlay(e) => write!(f, "stream play error: {e}"),
            AudioError::BufferFull => write!(f, "audio command ring buffer is full"),
        }
    }
}

impl std::error::Error for AudioError {}

/// Owns the cpal stream and the control-side ends of both queues.
pub struct AudioEngine {
    /// Playback stops when the stream is dropped.
    _stream: cpal::Stream,
    producer: ringbuf::HeapProd<AudioCommand>,
    outbound: ringbuf::HeapCons<Outbound>,
    sample_rate: u32,
    channels: u16,
}

impl AudioEngine {
    /// Start an engine on the default output device at its default config.
    pub fn new(config: EngineConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let device_config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let sample_rate = device_config.sample_rate().0;
        let channels = device_config.channels();

        Self::build_with_device(&device, config, sample_rate, channels)
    }

    fn build_with_device(
        device: &cpal::Device,
        config: EngineConfig,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioError> {
        let (producer, consumer) = HeapRb::<AudioCommand>::new(RING_BUFFER_CAPACITY).split();
        let (outbound_producer, outbound) = HeapRb::<Outbound>::new(OUTBOUND_CAPACITY).split();

        let engine = Engine::new(config);
        let mut audio_callback =
            AudioCallback::new(consumer, outbound_producer, engine, channels, sample_rate);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            error!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        info!(sample_rate, channels, "audio stream started");

        Ok(Self {
            _stream: stream,
            producer,
            outbound,
            sample_rate,
            channels,
        })
    }

    /// Forward a message to the engine on the audio thread.
    pub fn send(&mut self, message: Inbound) -> Result<(), AudioError> {
        self.push(AudioCommand::Message(message))
    }

    /// Set output volume (clamped to 0.0..=1.0 on the audio thread).
    pub fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.push(AudioCommand::SetVolume(volume))
    }

    /// Silence every live Sound.
    pub fn stop(&mut self) -> Result<(), AudioError> {
        self.push(AudioCommand::Stop)
    }

    fn push(&mut self, command: AudioCommand) -> Result<(), AudioError> {
        self.producer
            .try_push(command)
            .map_err(|_| AudioError::BufferFull)
    }

    /// Take every outbound message the engine has produced.
    pub fn poll(&mut self) -> Vec<Outbound> {
        let mut messages = Vec::new();
        while let Some(message) = self.outbound.try_pop() {
            messages.push(message);
        }
        messages
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires audio device: run manually with `cargo test -- --ignored`
    fn test_audio_engine_creation() {
        let engine = AudioEngine::new(EngineConfig::default());
        assert!(
            engine.is_ok(),
            "AudioEngine::new() failed: {:?}",
            engine.err()
        );
        let engine = engine.unwrap();
        assert!(engine.sample_rate() > 0);
        assert!(engine.channels() > 0);
    }

    #[test]
    #[ignore] // Requires audio device
    fn test_send_and_poll() {
        let mut engine = AudioEngine::new(EngineConfig::default()).expect("no audio device");
        engine
            .send(Inbound::Eval("[ 1 2 ] 1 +".into()))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(200));
        let replies = engine.poll();
        assert!(replies.contains(&Outbound::Result("[ 2 3 ]".into())));
    }

    #[test]
    #[ignore] // Requires audio device
    fn test_set_volume_and_stop() {
        let mut engine = AudioEngine::new(EngineConfig::default()).expect("no audio device");
        assert!(engine.set_volume(0.5).is_ok());
        assert!(engine.stop().is_ok());
    }

    #[test]
    fn test_audio_error_display() {
        assert_eq!(
            AudioError::NoOutputDevice.to_string(),
            "no audio output device found"
        );
        assert_eq!(
            AudioError::BufferFull.to_string(),
            "audio command ring buffer is full"
        );
        assert_eq!(
            AudioError::DeviceConfig("test".to_string()).to_string(),
            "device config error: test"
        );
    }
}
