// Device-facing half of the sound core: the `AudioBackend` contract that pulls
// samples on the device thread, and the `PlaybackEngine` mixer that fills them.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub mod mixer;
pub use mixer::{NORM_PITCH, NORM_SEP, MAX_VOLUME, PlaybackEngine, VoiceParams, render_fn_for_engine};

// The mock backend renders only when a test pumps it.
#[cfg(feature = "mock-audio")]
pub mod mock_backend;

#[cfg(not(feature = "mock-audio"))]
pub mod cpal_backend;

/// A specialized error type for audio backend failures.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no output device available")]
    DeviceNotFound,
    #[error("unsupported device format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to create output stream")]
    StreamCreationFailed,
    #[error("playback error: {0}")]
    PlaybackError(String),
    #[error("{0}")]
    Other(String),
}

/// The render callback function.
///
/// Called on the real-time audio thread with an interleaved buffer, the device
/// sample rate and the frame count. It must be `Send + Sync` to be shared
/// across threads.
pub type RenderFn = Arc<dyn Fn(&mut [f32], u32, usize) + Send + Sync + 'static>;

/// Diagnostics events emitted by the backend (non-RT callbacks expected).
#[derive(Debug, Clone)]
pub enum DiagnosticEvent {
    XRun { count: u32 },
    DeviceRemoved,
    BufferSizeChanged { frames: usize },
    Other(String),
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::XRun { count } => write!(f, "XRun(count={})", count),
            DiagnosticEvent::DeviceRemoved => write!(f, "DeviceRemoved"),
            DiagnosticEvent::BufferSizeChanged { frames } => write!(f, "BufferSizeChanged(frames={})", frames),
            DiagnosticEvent::Other(s) => write!(f, "Other({})", s),
        }
    }
}

/// Non-RT diagnostics callback type.
pub type DiagnosticsCb = Arc<dyn Fn(DiagnosticEvent) + Send + Sync + 'static>;

/// Represents the effective configuration of an audio device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub channels: u16,
    pub device_name: Option<String>,
}

pub trait DeviceInfoProvider {
    fn get_device_name(&self) -> Option<&str>;
}

/// The core trait defining the audio backend's contract.
pub trait AudioBackend {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError>;
    fn stop(&mut self) -> Result<(), BackendError>;
    fn sample_rate(&self) -> u32;
    fn buffer_size(&self) -> usize;
    fn channels(&self) -> u16;
    /// Returns frames since stream start. 0 if not running.
    fn frames_since_start(&self) -> u64;
    /// Register or clear non-RT diagnostics callback.
    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>);

    fn as_device_info_provider(&self) -> Option<&dyn DeviceInfoProvider>;
}

fn log_backend(kind: &str, backend: &dyn AudioBackend) {
    let device_name = backend
        .as_device_info_provider()
        .and_then(|d| d.get_device_name().map(str::to_string))
        .unwrap_or_else(|| "<unknown>".to_string());
    tracing::info!(
        backend = kind,
        sample_rate = backend.sample_rate(),
        buffer_size = backend.buffer_size(),
        channels = backend.channels(),
        device = %device_name,
        "audio backend created"
    );
}

#[cfg(not(feature = "mock-audio"))]
pub fn create_audio_backend() -> Result<Box<dyn AudioBackend>, BackendError> {
    let backend = cpal_backend::CpalAudioBackend::new()?;
    log_backend("cpal", &backend);
    Ok(Box::new(backend))
}

#[cfg(feature = "mock-audio")]
pub fn create_audio_backend() -> Result<Box<dyn AudioBackend>, BackendError> {
    let backend = mock_backend::MockAudioBackend::new();
    log_backend("mock", &backend);
    Ok(Box::new(backend))
}
