use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Capture settings the session negotiates with the server.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz (s16le mono PCM).
    pub sample_rate: u32,
    /// How often a chunk is delivered.
    pub chunk_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            chunk_interval: Duration::from_millis(100),
        }
    }
}

/// Audio capture boundary.
///
/// Implementations deliver fixed-rate PCM chunks on the channel at the
/// configured interval. The session controller does not resample or buffer
/// on its own. `stop` must be idempotent and safe on a never-started or
/// already-stopped capture.
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing, pushing each chunk into `chunks`.
    async fn start(&mut self, config: CaptureConfig, chunks: mpsc::Sender<Vec<u8>>) -> Result<()>;

    /// Stop capturing.
    async fn stop(&mut self);

    /// Capture backend name for logging.
    fn name(&self) -> &str;
}

/// Stand-in capture that emits zeroed PCM chunks at the configured rate.
/// Used by the demo binary and tests; real microphone capture lives behind
/// the same trait in the host application.
#[derive(Default)]
pub struct SilenceCapture {
    task: Option<JoinHandle<()>>,
}

impl SilenceCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AudioCapture for SilenceCapture {
    async fn start(&mut self, config: CaptureConfig, chunks: mpsc::Sender<Vec<u8>>) -> Result<()> {
        self.stop().await;

        // s16le mono: two bytes per sample.
        let samples_per_chunk =
            (config.sample_rate as u128 * config.chunk_interval.as_millis() / 1000) as usize;
        let chunk_bytes = samples_per_chunk * 2;
        let interval = config.chunk_interval;

        info!(
            "Starting silence capture ({} Hz, {} byte chunks)",
            config.sample_rate, chunk_bytes
        );

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if chunks.send(vec![0u8; chunk_bytes]).await.is_err() {
                    break;
                }
            }
        }));

        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn name(&self) -> &str {
        "silence"
    }
}
