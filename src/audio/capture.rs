use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::wav;

/// Errors raised by audio capture
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The platform refused access to the audio source. Recoverable:
    /// callers surface this to the user instead of tearing the session down.
    #[error("audio source permission denied")]
    PermissionDenied,

    #[error("audio source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("audio source is already open")]
    AlreadyOpen,

    #[error("no capture in progress")]
    NotRunning,
}

/// One compressed buffer emitted by an audio source during a recording.
///
/// Chunks are owned exclusively by the active recording and are concatenated
/// then discarded when the recording stops.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Position of this chunk within the recording (0-indexed)
    pub sequence: u32,
    /// Compressed audio bytes as emitted by the capture device
    pub data: Vec<u8>,
}

/// Configuration for a recorder
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Sample rate of the canonical WAV artifact (transcription providers
    /// expect 16kHz)
    pub target_sample_rate: u32,
    /// Upper bound on accumulated chunk bytes; chunks past this are dropped
    pub max_recording_bytes: usize,
    /// Capacity of the chunk channel between source and collector
    pub chunk_channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: wav::CANONICAL_SAMPLE_RATE,
            max_recording_bytes: 50 * 1024 * 1024, // 50MB
            chunk_channel_capacity: 64,
        }
    }
}

/// An exclusive audio source producing compressed chunks
///
/// Implementations:
/// - `ChannelSource`: chunks are pushed in by the HTTP ingest path
/// - `FileSource`: reads a compressed file (for testing/batch processing)
#[async_trait::async_trait]
pub trait AudioSource: Send + Sync {
    /// Open the source and start emitting chunks.
    ///
    /// Returns a channel receiver that will receive chunks in sequence
    /// order. Opening an already-open source fails with `AlreadyOpen`.
    async fn open(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError>;

    /// Close the source. The chunk channel ends once buffered chunks drain.
    async fn close(&mut self) -> Result<(), CaptureError>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Audio source fed externally, one chunk at a time.
///
/// The `ChunkFeeder` handle stays valid across open/close cycles; pushing
/// while the source is closed fails with `NotRunning`.
pub struct ChannelSource {
    capacity: usize,
    tx: Arc<Mutex<Option<mpsc::Sender<AudioChunk>>>>,
    sequence: Arc<AtomicU32>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tx: Arc::new(Mutex::new(None)),
            sequence: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Handle for pushing chunks into this source
    pub fn feeder(&self) -> ChunkFeeder {
        ChunkFeeder {
            tx: Arc::clone(&self.tx),
            sequence: Arc::clone(&self.sequence),
        }
    }
}

#[async_trait::async_trait]
impl AudioSource for ChannelSource {
    async fn open(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        let mut tx = self.tx.lock().await;
        if tx.is_some() {
            return Err(CaptureError::AlreadyOpen);
        }

        let (sender, receiver) = mpsc::channel(self.capacity);
        *tx = Some(sender);
        self.sequence.store(0, Ordering::SeqCst);

        Ok(receiver)
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        // Dropping the sender ends the chunk channel once it drains
        self.tx.lock().await.take();
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Pushes chunks into a `ChannelSource`, assigning sequence numbers
#[derive(Clone)]
pub struct ChunkFeeder {
    tx: Arc<Mutex<Option<mpsc::Sender<AudioChunk>>>>,
    sequence: Arc<AtomicU32>,
}

impl ChunkFeeder {
    pub async fn push(&self, data: Vec<u8>) -> Result<(), CaptureError> {
        let tx = self.tx.lock().await;
        let sender = tx.as_ref().ok_or(CaptureError::NotRunning)?;

        let chunk = AudioChunk {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            data,
        };

        sender
            .send(chunk)
            .await
            .map_err(|_| CaptureError::NotRunning)
    }
}

/// Audio source that reads a compressed file in fixed-size chunks
pub struct FileSource {
    path: PathBuf,
    chunk_bytes: usize,
    reader_task: Option<JoinHandle<()>>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, chunk_bytes: usize) -> Self {
        Self {
            path: path.into(),
            chunk_bytes,
            reader_task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioSource for FileSource {
    async fn open(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        if self.reader_task.is_some() {
            return Err(CaptureError::AlreadyOpen);
        }

        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| map_source_error(&self.path, e))?;

        let (tx, rx) = mpsc::channel(16);
        let chunk_bytes = self.chunk_bytes.max(1);

        self.reader_task = Some(tokio::spawn(async move {
            for (i, piece) in data.chunks(chunk_bytes).enumerate() {
                let chunk = AudioChunk {
                    sequence: i as u32,
                    data: piece.to_vec(),
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        }));

        Ok(rx)
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        if let Some(task) = self.reader_task.take() {
            if let Err(e) = task.await {
                error!("file source reader panicked: {}", e);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Map a source acquisition failure. A denied permission is surfaced as its
/// own recoverable variant; everything else is an unavailable source.
fn map_source_error(path: &std::path::Path, e: std::io::Error) -> CaptureError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        CaptureError::PermissionDenied
    } else {
        CaptureError::SourceUnavailable(format!("{}: {}", path.display(), e))
    }
}

/// The artifact produced by stopping a recording.
///
/// `Wav` always carries the canonical layout (fixed 44-byte header, PCM16
/// mono at the target rate). `Compressed` is the verbatim concatenation of
/// the captured chunks, returned when the blob could not be decoded;
/// callers must accept either.
#[derive(Debug, Clone)]
pub enum RecordedAudio {
    Wav(Vec<u8>),
    Compressed(Vec<u8>),
}

impl RecordedAudio {
    pub fn bytes(&self) -> &[u8] {
        match self {
            RecordedAudio::Wav(b) | RecordedAudio::Compressed(b) => b,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            RecordedAudio::Wav(_) => "audio/wav",
            RecordedAudio::Compressed(_) => "application/octet-stream",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            RecordedAudio::Wav(_) => "capture.wav",
            RecordedAudio::Compressed(_) => "capture.bin",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

/// Accumulates chunks from an exclusive audio source and finalizes them
/// into a canonical WAV artifact on stop.
pub struct Recorder {
    source: Box<dyn AudioSource>,
    chunks: Arc<Mutex<Vec<AudioChunk>>>,
    collector: Option<JoinHandle<()>>,
    config: RecorderConfig,
}

impl Recorder {
    /// Open the source and begin accumulating chunks
    pub async fn start(
        mut source: Box<dyn AudioSource>,
        config: RecorderConfig,
    ) -> Result<Self, CaptureError> {
        let mut rx = source.open().await?;

        info!("recording started ({} source)", source.name());

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        let max_bytes = config.max_recording_bytes;

        let collector = tokio::spawn(async move {
            let mut total = 0usize;
            while let Some(chunk) = rx.recv().await {
                total += chunk.data.len();
                if total > max_bytes {
                    warn!(
                        "recording exceeded {} bytes, dropping further chunks",
                        max_bytes
                    );
                    break;
                }
                sink.lock().await.push(chunk);
            }
        });

        Ok(Self {
            source,
            chunks,
            collector: Some(collector),
            config,
        })
    }

    /// Finalize the recording.
    ///
    /// Closes the source, drains the collector, concatenates the chunks and
    /// transcodes them into the canonical WAV layout. If the blob cannot be
    /// decoded the original compressed bytes are returned unchanged.
    pub async fn stop(mut self) -> Result<RecordedAudio, CaptureError> {
        self.source.close().await?;

        if let Some(task) = self.collector.take() {
            if let Err(e) = task.await {
                error!("chunk collector panicked: {}", e);
            }
        }

        let mut chunks = std::mem::take(&mut *self.chunks.lock().await);
        chunks.sort_by_key(|c| c.sequence);

        let blob: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();

        info!("recording stopped: {} compressed bytes", blob.len());

        match wav::transcode_to_canonical_wav(&blob, self.config.target_sample_rate) {
            Ok(encoded) => Ok(RecordedAudio::Wav(encoded)),
            Err(e) => {
                warn!(
                    "transcode failed ({}), returning compressed capture unchanged",
                    e
                );
                Ok(RecordedAudio::Compressed(blob))
            }
        }
    }

    /// Tear down without producing an artifact
    pub async fn abort(mut self) {
        if let Err(e) = self.source.close().await {
            warn!("failed to close audio source on abort: {}", e);
        }
        if let Some(task) = self.collector.take() {
            task.abort();
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // stop()/abort() take the handle; this only fires on early teardown
        if let Some(task) = self.collector.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_denied_source_access_is_recoverable() {
        let err = map_source_error(
            Path::new("/dev/mic0"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, CaptureError::PermissionDenied));
    }

    #[test]
    fn test_other_source_failures_name_the_path() {
        let err = map_source_error(
            Path::new("/tmp/capture.webm"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        match err {
            CaptureError::SourceUnavailable(msg) => assert!(msg.contains("/tmp/capture.webm")),
            other => panic!("expected SourceUnavailable, got {:?}", other),
        }
    }
}
