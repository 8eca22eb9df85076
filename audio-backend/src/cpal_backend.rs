use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use arc_swap::ArcSwapOption;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::{AudioBackend, BackendError, DeviceInfo, DeviceInfoProvider, DiagnosticEvent, DiagnosticsCb, RenderFn};

/// Worker-thread-backed CPAL backend.
///
/// The worker owns the device and the `cpal::Stream` (which is not `Send` on
/// every host); this handle talks to it over a control channel. The render
/// function is published through an `ArcSwapOption` so the device callback
/// reads it without locking.
pub struct CpalAudioBackend {
    inner: Arc<CpalBackendInner>,
    ctrl_tx: Sender<CtrlMsg>,
    worker: Option<JoinHandle<()>>,
}

struct Renderer {
    render: RenderFn,
}

struct CpalBackendInner {
    info: DeviceInfo,
    render: ArcSwapOption<Renderer>,
    frames: AtomicU64,
}

enum CtrlMsg {
    Start,
    Stop,
    SetDiagnostics(Option<DiagnosticsCb>),
    Shutdown,
}

impl CpalAudioBackend {
    pub fn new() -> Result<Self, BackendError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(BackendError::DeviceNotFound)?;

        let mut supported_configs = device
            .supported_output_configs()
            .map_err(|e| BackendError::Other(e.to_string()))?
            .collect::<Vec<_>>();

        // Prefer f32 interleaved stereo; otherwise take whatever the device lists last.
        let chosen = supported_configs
            .iter()
            .rev()
            .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
            .cloned()
            .or_else(|| supported_configs.pop())
            .ok_or_else(|| BackendError::UnsupportedFormat("no supported configs".into()))?;

        let config = chosen.with_max_sample_rate().config();
        let buffer_size = match config.buffer_size {
            cpal::BufferSize::Fixed(n) => n as usize,
            cpal::BufferSize::Default => 0,
        };

        let info = DeviceInfo {
            sample_rate: config.sample_rate.0,
            buffer_size,
            channels: config.channels,
            device_name: device.name().ok(),
        };

        let inner = Arc::new(CpalBackendInner { info, render: ArcSwapOption::empty(), frames: AtomicU64::new(0) });

        let (ctrl_tx, ctrl_rx) = unbounded::<CtrlMsg>();
        let inner_worker = inner.clone();
        let worker = thread::Builder::new()
            .name("audio-device".into())
            .spawn(move || worker_loop(device, config, ctrl_rx, inner_worker))
            .map_err(|e| BackendError::Other(e.to_string()))?;

        Ok(Self { inner, ctrl_tx, worker: Some(worker) })
    }

    fn send(&self, msg: CtrlMsg) -> Result<(), BackendError> {
        self.ctrl_tx.send(msg).map_err(|_| BackendError::Other("ctrl channel closed".into()))
    }
}

fn worker_loop(device: Device, config: StreamConfig, rx: Receiver<CtrlMsg>, inner: Arc<CpalBackendInner>) {
    let mut diagnostics: Option<DiagnosticsCb> = None;
    let mut stream: Option<cpal::Stream> = None;

    while let Ok(msg) = rx.recv() {
        match msg {
            CtrlMsg::Start => {
                if stream.is_some() {
                    continue;
                }
                let inner_cb = inner.clone();
                let channels = config.channels as usize;
                let sample_rate = config.sample_rate.0;

                let diagnostics_err = diagnostics.clone();
                let err_cb = move |err: cpal::StreamError| {
                    tracing::error!(error = %err, "output stream error");
                    if let Some(cb) = &diagnostics_err {
                        let cb = cb.clone();
                        thread::spawn(move || cb(DiagnosticEvent::XRun { count: 1 }));
                    }
                };

                let data_cb = move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels.max(1);
                    match inner_cb.render.load().as_ref() {
                        Some(r) => {
                            let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                (r.render)(data, sample_rate, frames);
                            }));
                            if res.is_err() {
                                data.fill(0.0);
                            }
                        }
                        None => data.fill(0.0),
                    }
                    inner_cb.frames.fetch_add(frames as u64, Ordering::Relaxed);
                };

                match device.build_output_stream(&config, data_cb, err_cb, None) {
                    Ok(s) => match s.play() {
                        Ok(()) => {
                            tracing::info!(sample_rate, channels, "output stream started");
                            stream = Some(s);
                        }
                        Err(e) => tracing::error!(error = %e, "failed to play stream"),
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "failed to build stream");
                        if let Some(cb) = &diagnostics {
                            let cb = cb.clone();
                            let msg = format!("stream build failed: {}", e);
                            thread::spawn(move || cb(DiagnosticEvent::Other(msg)));
                        }
                    }
                }
            }
            CtrlMsg::Stop => {
                if stream.take().is_some() {
                    tracing::info!("output stream stopped");
                }
            }
            CtrlMsg::SetDiagnostics(cb) => diagnostics = cb,
            CtrlMsg::Shutdown => break,
        }
    }
}

impl Drop for CpalAudioBackend {
    fn drop(&mut self) {
        let _ = self.ctrl_tx.send(CtrlMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl AudioBackend for CpalAudioBackend {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError> {
        self.inner.render.store(Some(Arc::new(Renderer { render })));
        self.send(CtrlMsg::Start)
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.send(CtrlMsg::Stop)?;
        self.inner.render.store(None);
        Ok(())
    }

    fn sample_rate(&self) -> u32 { self.inner.info.sample_rate }
    fn buffer_size(&self) -> usize { self.inner.info.buffer_size }
    fn channels(&self) -> u16 { self.inner.info.channels }
    fn frames_since_start(&self) -> u64 { self.inner.frames.load(Ordering::Relaxed) }
    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>) {
        let _ = self.send(CtrlMsg::SetDiagnostics(cb));
    }

    fn as_device_info_provider(&self) -> Option<&dyn DeviceInfoProvider> {
        Some(self)
    }
}

impl DeviceInfoProvider for CpalAudioBackend {
    fn get_device_name(&self) -> Option<&str> {
        self.inner.info.device_name.as_deref()
    }
}
