use std::time::Duration;

use anyhow::Result;

use crate::audio::wav;
use crate::providers::SynthesizedSpeech;

/// Audio playback for the session's single active playback handle.
///
/// `play` resolves when playback completes; the controller races it against
/// a cancellation token so a new capture can preempt it.
#[async_trait::async_trait]
pub trait Playback: Send + Sync {
    async fn play(&self, speech: &SynthesizedSpeech) -> Result<()>;
}

/// Playback that waits out the audio's duration.
///
/// The service has no speaker of its own; the client plays the returned
/// bytes. Holding the Speaking phase for the estimated duration keeps the
/// session state honest while that happens.
pub struct TimedPlayback;

// Rough byte rate for compressed audio where the duration is unknown
const COMPRESSED_BYTES_PER_SECOND: usize = 16_000;

const MAX_PLAYBACK: Duration = Duration::from_secs(120);

impl TimedPlayback {
    pub fn estimate_duration(speech: &SynthesizedSpeech) -> Duration {
        let seconds = if wav::looks_like_canonical_wav(&speech.audio) {
            let data_bytes = speech.audio.len().saturating_sub(wav::WAV_HEADER_BYTES);
            data_bytes as f64 / 2.0 / wav::CANONICAL_SAMPLE_RATE as f64
        } else {
            speech.audio.len() as f64 / COMPRESSED_BYTES_PER_SECOND as f64
        };

        Duration::from_secs_f64(seconds).min(MAX_PLAYBACK)
    }
}

#[async_trait::async_trait]
impl Playback for TimedPlayback {
    async fn play(&self, speech: &SynthesizedSpeech) -> Result<()> {
        tokio::time::sleep(Self::estimate_duration(speech)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::encode_pcm16_wav;

    #[test]
    fn test_estimate_from_canonical_wav() {
        // One second of 16kHz mono PCM16
        let wav = encode_pcm16_wav(&vec![0.0f32; 16_000], 16_000).unwrap();
        let speech = SynthesizedSpeech {
            audio: wav,
            media_type: "audio/wav".to_string(),
            voice: "en".to_string(),
        };

        let estimate = TimedPlayback::estimate_duration(&speech);
        assert!((estimate.as_secs_f64() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_estimate_compressed_is_bounded() {
        let speech = SynthesizedSpeech {
            audio: vec![0u8; 100 * 1024 * 1024],
            media_type: "audio/mpeg".to_string(),
            voice: "alloy".to_string(),
        };

        assert_eq!(TimedPlayback::estimate_duration(&speech), MAX_PLAYBACK);
    }
}
