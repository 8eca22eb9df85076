use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::DeviceInfoProvider;
use crate::{AudioBackend, BackendError, DeviceInfo, DiagnosticEvent, DiagnosticsCb, RenderFn};

/// Deviceless backend: the render callback runs only when a caller pumps it.
pub struct MockAudioBackend {
    info: DeviceInfo,
    render: Mutex<Option<RenderFn>>,
    frames: AtomicU64,
    diagnostics: Option<DiagnosticsCb>,
}

impl MockAudioBackend {
    pub fn new() -> Self {
        Self::with_format(48_000, 2, 256)
    }

    pub fn with_format(sample_rate: u32, channels: u16, buffer_size: usize) -> Self {
        Self {
            info: DeviceInfo { sample_rate, buffer_size, channels, device_name: Some("mock-device".to_string()) },
            render: Mutex::new(None),
            frames: AtomicU64::new(0),
            diagnostics: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.render.lock().is_some()
    }

    /// Run the render callback for `frames` frames and return the interleaved
    /// output. Silence if the backend is stopped or the callback panics.
    pub fn pump(&self, frames: usize) -> Vec<f32> {
        let mut buf = vec![0.0f32; frames * self.info.channels as usize];
        let render = self.render.lock().clone();
        if let Some(render) = render {
            let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                render(&mut buf, self.info.sample_rate, frames);
            }));
            if res.is_err() {
                buf.iter_mut().for_each(|s| *s = 0.0);
            }
            self.frames.fetch_add(frames as u64, Ordering::Relaxed);
        }
        buf
    }

    pub fn emit_diagnostic(&self, event: DiagnosticEvent) {
        if let Some(cb) = &self.diagnostics {
            cb(event);
        }
    }
}

impl Default for MockAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MockAudioBackend {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError> {
        *self.render.lock() = Some(render);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        *self.render.lock() = None;
        Ok(())
    }

    fn sample_rate(&self) -> u32 { self.info.sample_rate }
    fn buffer_size(&self) -> usize { self.info.buffer_size }
    fn channels(&self) -> u16 { self.info.channels }
    fn frames_since_start(&self) -> u64 { self.frames.load(Ordering::Relaxed) }
    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>) { self.diagnostics = cb; }

    fn as_device_info_provider(&self) -> Option<&dyn DeviceInfoProvider> {
        Some(self)
    }
}

impl DeviceInfoProvider for MockAudioBackend {
    fn get_device_name(&self) -> Option<&str> {
        self.info.device_name.as_deref()
    }
}
