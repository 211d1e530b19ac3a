//! Audio feedback recorder.
//!
//! Drives a microphone capture through `idle -> recording -> {paused <-> recording} -> idle`.
//! The capture backend is abstracted behind [`CaptureDevice`] so the same
//! state machine runs against a real input device or a test double.
//!
//! The elapsed-time ticker is a Tokio task; recorders must be started from
//! inside a Tokio runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_secs(1);
const DEFAULT_MIME_TYPE: &str = "audio/webm";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: RecorderState,
    },
}

/// An acquired capture stream. Releasing it turns the input device off.
pub trait CaptureHandle: Send {
    fn release(&mut self);
}

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    type Handle: CaptureHandle;

    /// Ask for access to the input device.
    async fn acquire(&self) -> Result<Self::Handle, RecorderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
}

/// A finished recording. Immutable once produced.
#[derive(Debug, Clone)]
pub struct AudioClip {
    mime_type: String,
    data: Arc<[u8]>,
    duration_ms: u64,
}

impl AudioClip {
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

pub struct AudioRecorder<D: CaptureDevice> {
    device: D,
    mime_type: String,
    state: RecorderState,
    handle: Option<D::Handle>,
    chunks: Vec<Vec<u8>>,
    elapsed_ms: Arc<AtomicU64>,
    ticker: Option<JoinHandle<()>>,
}

impl<D: CaptureDevice> AudioRecorder<D> {
    pub fn new(device: D) -> Self {
        Self::with_mime_type(device, DEFAULT_MIME_TYPE)
    }

    pub fn with_mime_type(device: D, mime_type: &str) -> Self {
        Self {
            device,
            mime_type: mime_type.to_string(),
            state: RecorderState::Idle,
            handle: None,
            chunks: Vec::new(),
            elapsed_ms: Arc::new(AtomicU64::new(0)),
            ticker: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.load(Ordering::SeqCst)
    }

    /// Elapsed recording time as `MM:SS`.
    pub fn elapsed_label(&self) -> String {
        format_elapsed(self.elapsed_ms())
    }

    /// Acquire the device and begin recording. On failure the recorder stays idle.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        if self.state != RecorderState::Idle {
            return Err(RecorderError::InvalidState {
                action: "start",
                state: self.state,
            });
        }

        let handle = self.device.acquire().await.map_err(|e| {
            tracing::warn!("Audio capture could not start: {}", e);
            e
        })?;

        self.handle = Some(handle);
        self.chunks.clear();
        self.elapsed_ms.store(0, Ordering::SeqCst);
        self.state = RecorderState::Recording;
        self.start_ticker();

        tracing::debug!("Audio recording started");
        Ok(())
    }

    /// Halt the elapsed counter. Captured chunks are kept.
    pub fn pause(&mut self) -> Result<(), RecorderError> {
        if self.state != RecorderState::Recording {
            return Err(RecorderError::InvalidState {
                action: "pause",
                state: self.state,
            });
        }

        self.stop_ticker();
        self.state = RecorderState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), RecorderError> {
        if self.state != RecorderState::Paused {
            return Err(RecorderError::InvalidState {
                action: "resume",
                state: self.state,
            });
        }

        self.state = RecorderState::Recording;
        self.start_ticker();
        Ok(())
    }

    /// Append data delivered by the capture stream.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) -> Result<(), RecorderError> {
        if self.state != RecorderState::Recording {
            return Err(RecorderError::InvalidState {
                action: "capture",
                state: self.state,
            });
        }

        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
        Ok(())
    }

    /// Finish the recording and release the device.
    ///
    /// Safe to call in any state and more than once. Returns the clip when
    /// any data was captured since the last `start`.
    pub fn stop(&mut self) -> Option<AudioClip> {
        self.stop_ticker();
        self.release_handle();
        self.state = RecorderState::Idle;

        if self.chunks.is_empty() {
            return None;
        }

        let data: Vec<u8> = std::mem::take(&mut self.chunks).concat();
        let clip = AudioClip {
            mime_type: self.mime_type.clone(),
            data: Arc::from(data),
            duration_ms: self.elapsed_ms(),
        };

        tracing::debug!(
            "Audio recording finished: {} bytes, {}",
            clip.len(),
            format_elapsed(clip.duration_ms)
        );
        Some(clip)
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();

        let elapsed = self.elapsed_ms.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + TICK, TICK);
            loop {
                interval.tick().await;
                elapsed.fetch_add(TICK.as_millis() as u64, Ordering::SeqCst);
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn release_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
    }
}

impl<D: CaptureDevice> Drop for AudioRecorder<D> {
    fn drop(&mut self) {
        self.stop_ticker();
        self.release_handle();
    }
}

/// Format milliseconds as `MM:SS`. Minutes keep counting past 59.
pub fn format_elapsed(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
