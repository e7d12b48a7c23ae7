// Integration tests for the capture/encode pipeline
//
// These tests verify that stopping a recording always yields either the
// canonical WAV artifact (RIFF/WAVE, PCM16, mono, 16kHz) or the original
// compressed blob verbatim - never a malformed hybrid.

use std::io::Cursor;

use anyhow::Result;
use lingua_practice::audio::{
    looks_like_canonical_wav, transcode_to_canonical_wav, ChannelSource, RecordedAudio, Recorder,
    RecorderConfig, CANONICAL_SAMPLE_RATE,
};

/// Build an in-memory WAV blob with the given format
fn make_wav(sample_rate: u32, channels: u16, seconds: f64) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (sample_rate as f64 * seconds) as usize;
        for i in 0..frames {
            // 440Hz tone so the samples are non-trivial
            let t = i as f64 / sample_rate as f64;
            let sample = ((t * 440.0 * 2.0 * std::f64::consts::PI).sin() * 8000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[test]
fn test_transcode_stereo_44k_to_canonical() -> Result<()> {
    let blob = make_wav(44_100, 2, 1.0);

    let wav = transcode_to_canonical_wav(&blob, CANONICAL_SAMPLE_RATE)?;

    assert!(looks_like_canonical_wav(&wav));

    let reader = hound::WavReader::new(Cursor::new(&wav))?;
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, CANONICAL_SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    // Duration should be preserved within a few milliseconds
    let duration = reader.len() as f64 / CANONICAL_SAMPLE_RATE as f64;
    assert!(
        (duration - 1.0).abs() < 0.01,
        "expected ~1.0s, got {:.3}s",
        duration
    );

    Ok(())
}

#[test]
fn test_transcode_already_canonical_input() -> Result<()> {
    let blob = make_wav(16_000, 1, 0.5);

    let wav = transcode_to_canonical_wav(&blob, CANONICAL_SAMPLE_RATE)?;

    assert!(looks_like_canonical_wav(&wav));

    let reader = hound::WavReader::new(Cursor::new(&wav))?;
    assert_eq!(reader.spec().sample_rate, CANONICAL_SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);

    Ok(())
}

#[test]
fn test_transcode_garbage_fails_cleanly() {
    let garbage: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
    assert!(transcode_to_canonical_wav(&garbage, CANONICAL_SAMPLE_RATE).is_err());
}

#[tokio::test]
async fn test_recorder_produces_canonical_wav() -> Result<()> {
    let blob = make_wav(48_000, 2, 0.5);

    let source = ChannelSource::new(64);
    let feeder = source.feeder();

    let recorder = Recorder::start(Box::new(source), RecorderConfig::default()).await?;

    // Feed the blob in small chunks, as the capture interval would
    for piece in blob.chunks(4096) {
        feeder.push(piece.to_vec()).await?;
    }

    let artifact = recorder.stop().await?;

    match artifact {
        RecordedAudio::Wav(bytes) => {
            assert!(looks_like_canonical_wav(&bytes));
            let reader = hound::WavReader::new(Cursor::new(&bytes))?;
            assert_eq!(reader.spec().channels, 1);
            assert_eq!(reader.spec().sample_rate, CANONICAL_SAMPLE_RATE);
        }
        RecordedAudio::Compressed(_) => panic!("valid WAV input should transcode"),
    }

    Ok(())
}

#[tokio::test]
async fn test_recorder_falls_back_to_original_blob() -> Result<()> {
    // Bytes symphonia cannot probe: the fallback must be the verbatim
    // concatenation of the pushed chunks
    let chunks: Vec<Vec<u8>> = vec![vec![1, 2, 3, 4], vec![5, 6], vec![7, 8, 9]];
    let expected: Vec<u8> = chunks.iter().flatten().copied().collect();

    let source = ChannelSource::new(8);
    let feeder = source.feeder();

    let recorder = Recorder::start(Box::new(source), RecorderConfig::default()).await?;

    for chunk in &chunks {
        feeder.push(chunk.clone()).await?;
    }

    let artifact = recorder.stop().await?;

    match artifact {
        RecordedAudio::Compressed(bytes) => {
            assert_eq!(bytes, expected, "fallback must be byte-identical");
            assert!(!looks_like_canonical_wav(&bytes));
        }
        RecordedAudio::Wav(_) => panic!("garbage input should not decode"),
    }

    Ok(())
}

#[tokio::test]
async fn test_recorder_empty_capture() -> Result<()> {
    let source = ChannelSource::new(8);

    let recorder = Recorder::start(Box::new(source), RecorderConfig::default()).await?;
    let artifact = recorder.stop().await?;

    match artifact {
        RecordedAudio::Compressed(bytes) => assert!(bytes.is_empty()),
        RecordedAudio::Wav(_) => panic!("empty capture cannot decode"),
    }

    Ok(())
}
