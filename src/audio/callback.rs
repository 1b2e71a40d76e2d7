//! Audio callback: runs on the cpal audio thread.
//!
//! Drains commands from the inbound ring buffer, renders the engine in fixed
//! blocks, copies the mono signal to every output channel and forwards the
//! engine's outbound messages.

use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapCons, HeapProd};

use crate::engine::{Engine, Outbound};

use super::command::AudioCommand;

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct AudioCallback {
    consumer: HeapCons<AudioCommand>,
    outbound: HeapProd<Outbound>,
    engine: Engine,
    scratch: Vec<f32>,
    frame: u64,
    block_size: usize,
    volume: f32,
    channels: u16,
    sample_rate: u32,
}

impl AudioCallback {
    pub fn new(
        consumer: HeapCons<AudioCommand>,
        outbound: HeapProd<Outbound>,
        engine: Engine,
        channels: u16,
        sample_rate: u32,
    ) -> Self {
        let block_size = engine.config().block_size.max(1);
        Self {
            consumer,
            outbound,
            engine,
            scratch: Vec::with_capacity(block_size * 8),
            frame: 0,
            block_size,
            volume: 1.0,
            channels: channels.max(1),
            sample_rate,
        }
    }

    /// Called by cpal for each buffer. Fills interleaved `output`.
    pub fn process(&mut self, output: &mut [f32]) {
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                AudioCommand::Message(message) => self.engine.handle(message),
                AudioCommand::SetVolume(v) => self.volume = v.clamp(0.0, 1.0),
                AudioCommand::Stop => self.engine.silence(),
            }
        }

        let channels = self.channels as usize;
        let frames = output.len() / channels;
        self.scratch.clear();
        self.scratch.resize(frames, 0.0);

        for block in self.scratch.chunks_mut(self.block_size) {
            self.engine.render(block, self.frame, self.sample_rate);
            self.frame += block.len() as u64;
        }

        for (out, &sample) in output.chunks_mut(channels).zip(&self.scratch) {
            out.fill(sample * self.volume);
        }

        // The host may fall behind; highlights are disposable.
        for message in self.engine.drain_outbound() {
            let _ = self.outbound.try_push(message);
        }
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Inbound;
    use ringbuf::{traits::Split, HeapRb};

    struct Harness {
        commands: HeapProd<AudioCommand>,
        outbound: HeapCons<Outbound>,
        callback: AudioCallback,
    }

    fn setup(channels: u16) -> Harness {
        let (commands, consumer) = HeapRb::<AudioCommand>::new(16).split();
        let (producer, outbound) = HeapRb::<Outbound>::new(64).split();
        let callback = AudioCallback::new(consumer, producer, Engine::default(), channels, 48_000);
        Harness {
            commands,
            outbound,
            callback,
        }
    }

    #[test]
    fn test_callback_silence_on_empty() {
        let mut h = setup(2);
        let mut output = vec![999.0f32; 64];
        h.callback.process(&mut output);
        assert!(output.iter().all(|&s| s == 0.0));
        assert_eq!(h.callback.frame(), 32);
    }

    #[test]
    fn test_callback_duplicates_mono_across_channels() {
        let mut h = setup(2);
        h.commands
            .try_push(AudioCommand::Message(Inbound::Source("440 sine".into())))
            .unwrap();

        let mut output = vec![0.0f32; 1024];
        h.callback.process(&mut output);

        assert!(output.iter().any(|&s| s != 0.0));
        for frame in output.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_callback_applies_volume() {
        let mut loud = setup(1);
        let mut quiet = setup(1);
        for h in [&mut loud, &mut quiet] {
            h.commands
                .try_push(AudioCommand::Message(Inbound::Source("1 raw".into())))
                .unwrap();
        }
        quiet.commands.try_push(AudioCommand::SetVolume(0.5)).unwrap();

        let mut a = vec![0.0f32; 16];
        let mut b = vec![0.0f32; 16];
        loud.callback.process(&mut a);
        quiet.callback.process(&mut b);
        assert!((a[0] - 0.2).abs() < 1e-6);
        assert!((b[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_callback_clamps_volume() {
        let mut h = setup(1);
        h.commands
            .try_push(AudioCommand::Message(Inbound::Source("1 raw".into())))
            .unwrap();
        h.commands.try_push(AudioCommand::SetVolume(4.0)).unwrap();

        let mut output = vec![0.0f32; 8];
        h.callback.process(&mut output);
        assert!((output[0] - 0.2).abs() < 1e-6);

        h.commands.try_push(AudioCommand::SetVolume(-1.0)).unwrap();
        h.callback.process(&mut output);
        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_callback_stop_silences() {
        let mut h = setup(1);
        h.commands
            .try_push(AudioCommand::Message(Inbound::Source("1 raw".into())))
            .unwrap();
        h.commands.try_push(AudioCommand::Stop).unwrap();

        let mut output = vec![999.0f32; 32];
        h.callback.process(&mut output);
        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_callback_forwards_outbound() {
        let mut h = setup(1);
        h.commands
            .try_push(AudioCommand::Message(Inbound::Eval("2 3 *".into())))
            .unwrap();
        h.commands
            .try_push(AudioCommand::Message(Inbound::Source("220 sine".into())))
            .unwrap();

        let mut output = vec![0.0f32; 256];
        h.callback.process(&mut output);

        assert_eq!(h.outbound.try_pop(), Some(Outbound::Result("6".into())));
        // One highlight per 128-frame block.
        assert!(matches!(h.outbound.try_pop(), Some(Outbound::Highlight(_))));
        assert!(matches!(h.outbound.try_pop(), Some(Outbound::Highlight(_))));
        assert!(h.outbound.try_pop().is_none());
    }

    #[test]
    fn test_callback_frame_counter_persists() {
        let mut h = setup(2);
        let mut output = vec![0.0f32; 300];
        h.callback.process(&mut output);
        h.callback.process(&mut output);
        assert_eq!(h.callback.frame(), 300);
    }
}
