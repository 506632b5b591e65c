//! Microphone capture through cpal
//!
//! The cpal stream is not `Send` on every host, so it lives on a dedicated
//! capture thread for its whole life. The thread reports whether the device
//! opened, then parks until the [`MicrophoneCapture`] handle is dropped.
//! Audio callbacks mix every block down to mono and push it into the
//! producer half of a lock-free ring buffer. The handle owns the consumer
//! half and drains it into a [`SampleHistory`] whenever the sampler asks for a
//! frame.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analyser::{SampleHistory, SpectrumAnalyser, FFT_SIZE, FREQUENCY_BIN_COUNT};
use crate::error::{MeterError, Result};
use crate::sampler::SpectrumSource;

/// Samples queued between the audio callback and the sampler. At 48 kHz this
/// holds about 340 ms, well beyond one frame interval.
const CAPTURE_QUEUE_LEN: usize = FFT_SIZE * 8;

/// An open input device feeding the spectrum analyser
pub struct MicrophoneCapture {
    device_name: String,
    queue: HeapCons<f32>,
    history: SampleHistory,
    scratch: Vec<f32>,
    stream_failed: Arc<AtomicBool>,
    analyser: SpectrumAnalyser,
    time_domain: Vec<f32>,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneCapture {
    /// Open the named input device, or the system default when `None`
    ///
    /// Returns once the stream is playing, or with the reason it could not start.
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let (producer, queue) = HeapRb::<f32>::new(CAPTURE_QUEUE_LEN).split();
        let stream_failed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("sws-capture".to_string())
            .spawn({
                let requested = device_name.map(str::to_string);
                let stream_failed = stream_failed.clone();
                move || capture_thread_main(requested, producer, stream_failed, ready_tx, stop_rx)
            })
            .map_err(|e| MeterError::Internal(format!("failed to spawn capture thread: {}", e)))?;

        let opened = ready_rx.recv().unwrap_or_else(|_| {
            Err(MeterError::Internal(
                "capture thread exited before reporting".to_string(),
            ))
        });

        match opened {
            Ok(name) => Ok(Self {
                device_name: name,
                queue,
                history: SampleHistory::new(),
                scratch: vec![0.0; FFT_SIZE],
                stream_failed,
                analyser: SpectrumAnalyser::new(),
                time_domain: Vec::with_capacity(FFT_SIZE),
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            }),
            Err(e) => {
                let _ = thread.join();
                Err(e)
            }
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl SpectrumSource for MicrophoneCapture {
    fn bin_count(&self) -> usize {
        FREQUENCY_BIN_COUNT
    }

    fn read_frame(&mut self, bins: &mut [u8]) -> Result<()> {
        if self.stream_failed.load(Ordering::Acquire) {
            return Err(MeterError::Stream(format!(
                "input stream on '{}' stopped",
                self.device_name
            )));
        }

        self.history.drain_from(&mut self.queue, &mut self.scratch);
        self.history.copy_ordered(&mut self.time_domain);
        self.analyser.byte_frequency_data(&self.time_domain, bins);
        Ok(())
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        // Closing the channel wakes the capture thread, which drops the stream
        drop(self.stop_tx.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Capture thread panicked");
            }
        }
        debug!("Released input device '{}'", self.device_name);
    }
}

/// Names of all input devices on the default host
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| classify_open_error("enumerate input devices", &e))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Name of the system default input device, if any
pub fn default_input_device_name() -> Option<String> {
    cpal::default_host()
        .default_input_device()
        .and_then(|d| d.name().ok())
}

fn find_device_by_name(host: &cpal::Host, name: &str) -> Option<cpal::Device> {
    host.input_devices()
        .ok()?
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
}

fn capture_thread_main(
    requested: Option<String>,
    producer: HeapProd<f32>,
    stream_failed: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<Result<String>>,
    stop_rx: mpsc::Receiver<()>,
) {
    let stream = match start_stream(requested.as_deref(), producer, stream_failed) {
        Ok((stream, name)) => {
            let _ = ready_tx.send(Ok(name));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // Blocks until a stop message arrives or the handle drops its sender
    let _ = stop_rx.recv();
    drop(stream);
}

fn start_stream(
    requested: Option<&str>,
    mut producer: HeapProd<f32>,
    stream_failed: Arc<AtomicBool>,
) -> Result<(cpal::Stream, String)> {
    let host = cpal::default_host();
    debug!("Host: {:?}", host.id());

    let device = match requested {
        Some(name) => find_device_by_name(&host, name).ok_or_else(|| {
            MeterError::DeviceUnavailable(format!("input device '{}' not found", name))
        })?,
        None => host
            .default_input_device()
            .ok_or_else(|| MeterError::DeviceUnavailable("no input device available".to_string()))?,
    };
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let config = device
        .default_input_config()
        .map_err(|e| classify_open_error("query input config", &e))?;
    let channels = usize::from(config.channels().max(1));
    debug!(
        "Input '{}': {} Hz, {:?}, {} channels",
        name,
        config.sample_rate().0,
        config.sample_format(),
        channels
    );

    let err_fn = move |err: cpal::StreamError| {
        error!("Audio stream error: {}", err);
        stream_failed.store(true, Ordering::Release);
    };

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data, channels, |s| s)
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data, channels, |s| s as f32 / i16::MAX as f32)
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config.into(),
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data, channels, |s| {
                    (s as f32 / u16::MAX as f32) * 2.0 - 1.0
                })
            },
            err_fn,
            None,
        ),
        other => {
            return Err(MeterError::DeviceUnavailable(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| classify_open_error("build input stream", &e))?;

    stream
        .play()
        .map_err(|e| classify_open_error("start input stream", &e))?;

    info!("Capturing from '{}'", name);
    Ok((stream, name))
}

/// Queue one callback block as mono samples
///
/// Runs on the audio thread: no locks, no allocation. Samples that do not fit
/// are dropped; the sampler only ever looks at the newest ones.
fn push_mono<T: Copy>(
    producer: &mut HeapProd<f32>,
    data: &[T],
    channels: usize,
    to_f32: impl Fn(T) -> f32,
) {
    producer.push_iter(mono_frames(data, channels, to_f32));
}

/// Average interleaved frames down to one channel
fn mono_frames<'a, T: Copy>(
    data: &'a [T],
    channels: usize,
    to_f32: impl Fn(T) -> f32 + 'a,
) -> impl Iterator<Item = f32> + 'a {
    data.chunks(channels.max(1)).map(move |frame| {
        frame.iter().map(|&s| to_f32(s)).sum::<f32>() / frame.len() as f32
    })
}

/// Map a cpal failure to permission or availability
///
/// Hosts report a refused microphone as a backend-specific message, so the
/// text is the only signal available.
fn classify_open_error(action: &str, err: &dyn std::fmt::Display) -> MeterError {
    let message = format!("failed to {}: {}", action, err);
    let lower = message.to_lowercase();
    let refused = ["permission", "denied", "not permitted", "not authorized", "unauthorized"]
        .iter()
        .any(|needle| lower.contains(needle));

    if refused {
        warn!("Microphone access refused: {}", message);
        MeterError::PermissionDenied(message)
    } else {
        warn!("Input device unavailable: {}", message);
        MeterError::DeviceUnavailable(message)
    }
}
