//! Sample file tests: WAV files on disk feed the engine's sample bank.

use fzrth::config::EngineConfig;
use fzrth::engine::{Engine, Inbound, Outbound, SampleBuffer};
use std::path::Path;

const SAMPLE_RATE: u32 = 44_100;

fn write_wav(path: &Path, channels: u16, frames: &[i16]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in frames {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn requested_wav_plays_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("hit.wav"), 1, &[i16::MAX; 4410]);

    let mut engine = Engine::new(EngineConfig::default());
    engine.handle(Inbound::Source("hit play".into()));
    let names = match engine.drain_outbound().as_slice() {
        [Outbound::Request(names)] => names.clone(),
        other => panic!("expected one request, got {other:?}"),
    };
    assert_eq!(names, vec!["hit".to_string()]);

    for name in names {
        let buffer = SampleBuffer::open(dir.path().join(format!("{name}.wav"))).unwrap();
        engine.handle(Inbound::Sample { name, buffer });
    }

    let mut block = [0.0f32; 64];
    engine.render(&mut block, 0, SAMPLE_RATE);
    assert!(block.iter().all(|&s| (s - 0.2).abs() < 1e-3));

    // 0.1 s of audio, then silence for the rest of the step.
    let mut rest = vec![1.0f32; 4_410];
    for (i, chunk) in rest.chunks_mut(64).enumerate() {
        engine.render(chunk, 64 + (i * 64) as u64, SAMPLE_RATE);
    }
    assert!(rest[..4_000].iter().all(|&s| s != 0.0));
    assert!(rest[4_370..].iter().all(|&s| s == 0.0));
}

#[test]
fn stereo_wav_is_mixed_to_mono() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pad.wav");
    write_wav(&path, 2, &[16_384, 0, 16_384, 0]);

    let buffer = SampleBuffer::open(&path).unwrap();
    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.sample_rate(), SAMPLE_RATE);
    assert!((buffer.samples()[0] - 0.25).abs() < 1e-3);
}

#[test]
fn missing_wav_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(SampleBuffer::open(dir.path().join("nope.wav")).is_err());
}
