pub mod capture;
pub mod decode;
pub mod wav;

pub use capture::{
    AudioChunk, AudioSource, CaptureError, ChannelSource, ChunkFeeder, FileSource, RecordedAudio,
    Recorder, RecorderConfig,
};
pub use decode::{decode_blob, DecodeError, DecodedAudio};
pub use wav::{looks_like_canonical_wav, transcode_to_canonical_wav, CANONICAL_SAMPLE_RATE};
