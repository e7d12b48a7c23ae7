use std::io::Cursor;

use super::decode::{decode_blob, DecodeError};

/// Sample rate of the canonical WAV artifact (transcription providers
/// expect 16kHz)
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;

/// Size of the fixed RIFF/fmt/data header produced for PCM16 WAV
pub const WAV_HEADER_BYTES: usize = 44;

/// Transcode a compressed capture blob into the canonical WAV layout:
/// mono, `target_rate`, 16-bit PCM, fixed 44-byte header.
///
/// This is the single entry point used when a recording stops. Any decode
/// failure propagates so the caller can fall back to the original blob.
pub fn transcode_to_canonical_wav(blob: &[u8], target_rate: u32) -> Result<Vec<u8>, DecodeError> {
    let decoded = decode_blob(blob)?;
    let mono = downmix_to_mono(&decoded.samples, decoded.channels);
    let resampled = resample_linear(&mono, decoded.sample_rate, target_rate);
    encode_pcm16_wav(&resampled, target_rate)
}

/// Collapse interleaved multi-channel samples into mono by averaging
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resample of mono samples
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor().max(1.0) as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;

        let a = samples[idx.min(samples.len() - 1)];
        let b = samples.get(idx + 1).copied().unwrap_or(a);
        out.push((a as f64 + (b as f64 - a as f64) * frac) as f32);
    }

    out
}

/// Encode mono f32 samples as 16-bit PCM WAV in memory
pub fn encode_pcm16_wav(mono: &[f32], sample_rate: u32) -> Result<Vec<u8>, DecodeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| DecodeError::Encode(e.to_string()))?;

        for &sample in mono {
            let clamped = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(clamped)
                .map_err(|e| DecodeError::Encode(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| DecodeError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Check the canonical header invariant: RIFF/WAVE markers, a "fmt " chunk
/// declaring integer PCM at 16 bits.
pub fn looks_like_canonical_wav(bytes: &[u8]) -> bool {
    if bytes.len() < WAV_HEADER_BYTES {
        return false;
    }

    let format_tag = u16::from_le_bytes([bytes[20], bytes[21]]);
    let bits_per_sample = u16::from_le_bytes([bytes[34], bytes[35]]);

    &bytes[0..4] == b"RIFF"
        && &bytes[8..12] == b"WAVE"
        && &bytes[12..16] == b"fmt "
        && format_tag == 1
        && bits_per_sample == 16
}
