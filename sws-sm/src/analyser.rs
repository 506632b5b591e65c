//! Spectrum analyser producing byte frequency frames
//!
//! Mirrors the behaviour of a browser analyser node with `fftSize = 2048`:
//! Blackman window over the most recent samples, magnitudes scaled by
//! `1 / fft_size`, per-bin exponential smoothing, then a linear map of
//! [`MIN_DECIBELS`, `MAX_DECIBELS`] onto `0..=255`.

use ringbuf::{traits::*, HeapCons, HeapRb};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Samples per analysis frame
pub const FFT_SIZE: usize = 2048;

/// Byte bins produced per frame
pub const FREQUENCY_BIN_COUNT: usize = FFT_SIZE / 2;

/// Weight of the previous frame in per-bin smoothing
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.8;

/// Magnitude mapped to byte 0
pub const MIN_DECIBELS: f32 = -100.0;

/// Magnitude mapped to byte 255
pub const MAX_DECIBELS: f32 = -30.0;

/// Turns blocks of time-domain samples into byte frequency frames
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(FFT_SIZE),
            window: blackman_window(FFT_SIZE),
            scratch: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            smoothed: vec![0.0; FREQUENCY_BIN_COUNT],
        }
    }

    /// Analyse the latest [`FFT_SIZE`] samples and write byte magnitudes into `out`
    ///
    /// `time_domain` shorter than [`FFT_SIZE`] is zero-padded at the front.
    /// At most [`FREQUENCY_BIN_COUNT`] bins are written.
    pub fn byte_frequency_data(&mut self, time_domain: &[f32], out: &mut [u8]) {
        let latest = &time_domain[time_domain.len().saturating_sub(FFT_SIZE)..];
        let pad = FFT_SIZE - latest.len();

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { latest[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / FFT_SIZE as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() * scale;
            *smoothed = SMOOTHING_TIME_CONSTANT * *smoothed
                + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;

            if let Some(byte) = out.get_mut(k) {
                *byte = to_byte(*smoothed, range);
            }
        }
    }

}

impl Default for SpectrumAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

fn to_byte(magnitude: f32, range: f32) -> u8 {
    let db = 20.0 * magnitude.log10();
    if !db.is_finite() {
        return 0;
    }
    let scaled = (255.0 / range) * (db - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

/// Blackman window with alpha = 0.16
fn blackman_window(size: usize) -> Vec<f32> {
    let a0 = 0.42;
    let a1 = 0.5;
    let a2 = 0.08;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// The newest [`FFT_SIZE`] mono samples, oldest first
///
/// Older samples are overwritten as new ones arrive.
pub struct SampleHistory {
    rb: HeapRb<f32>,
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::with_capacity(FFT_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rb: HeapRb::new(capacity.max(1)),
        }
    }

    pub fn push_slice(&mut self, samples: &[f32]) {
        self.rb.push_slice_overwrite(samples);
    }

    /// Move everything the capture callback queued into the history
    pub fn drain_from(&mut self, queue: &mut HeapCons<f32>, scratch: &mut [f32]) {
        loop {
            let n = queue.pop_slice(scratch);
            if n == 0 {
                break;
            }
            self.rb.push_slice_overwrite(&scratch[..n]);
        }
    }

    /// Copy the history, oldest sample first, into `out`
    pub fn copy_ordered(&self, out: &mut Vec<f32>) {
        let (head, tail) = self.rb.as_slices();
        out.clear();
        out.extend_from_slice(head);
        out.extend_from_slice(tail);
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new()
    }
}
