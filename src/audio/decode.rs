use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::warn;

/// Errors raised while converting a compressed capture blob to samples
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized audio container: {0}")]
    Probe(#[source] SymphoniaError),

    #[error("no decodable audio track")]
    NoTrack,

    #[error("decoder error: {0}")]
    Decode(#[source] SymphoniaError),

    #[error("decoded stream was empty")]
    Empty,

    #[error("wav encode failed: {0}")]
    Encode(String),
}

/// Interleaved floating-point samples with explicit format.
///
/// Transient: exists only between decoding the compressed blob and encoding
/// the canonical WAV artifact.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved f32 samples (channel-major within each frame)
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Decode a compressed audio blob into floating-point samples.
///
/// The container format is probed; any format symphonia understands is
/// accepted regardless of its original encoding, sample rate, or channel
/// count.
pub fn decode_blob(data: &[u8]) -> Result<DecodedAudio, DecodeError> {
    let cursor = Cursor::new(data.to_vec());
    let stream = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(DecodeError::Probe)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(DecodeError::Decode)?;

    let mut samples = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Decode(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();

                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
                });
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Skip corrupt packets; keep whatever decodes around them
                warn!("skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(DecodeError::Decode(e)),
        }
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(DecodeError::Empty);
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}
