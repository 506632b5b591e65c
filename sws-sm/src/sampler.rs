//! Loudness sampler
//!
//! Reads spectrum frames from a [`SpectrumSource`] at a fixed cadence for a
//! fixed window and keeps the highest level seen. A [`SamplerSession`] owns
//! the source for the whole window; the source is dropped (and the device
//! released) as soon as the window ends or the session is cancelled.

use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use crate::error::{MeterError, Result};
use crate::level::{level_from_bins, SILENCE_FLOOR_DB};

/// Default sampling window
pub const DEFAULT_SAMPLE_DURATION: Duration = Duration::from_millis(5000);

/// Default interval between frames
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Something that yields spectrum frames on demand
///
/// Implemented by the microphone capture and by scripted sources in tests.
pub trait SpectrumSource: Send + 'static {
    /// Bins per frame
    fn bin_count(&self) -> usize;

    /// Overwrite `bins` with the current frame
    fn read_frame(&mut self, bins: &mut [u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub duration: Duration,
    pub frame_interval: Duration,
}

impl SamplerConfig {
    pub fn new(duration: Duration, frame_interval: Duration) -> Result<Self> {
        if duration.is_zero() {
            return Err(MeterError::InvalidInput(
                "sampling duration must be positive".to_string(),
            ));
        }
        if frame_interval.is_zero() {
            return Err(MeterError::InvalidInput(
                "frame interval must be positive".to_string(),
            ));
        }
        Ok(Self {
            duration,
            frame_interval,
        })
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_SAMPLE_DURATION,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

/// Result of a completed window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleReport {
    /// Highest frame level in dB
    pub peak_db: f64,
    /// Frames read during the window
    pub frames: u64,
    pub elapsed: Duration,
}

impl SampleReport {
    /// False when every frame was at the silence floor
    pub fn heard_sound(&self) -> bool {
        self.peak_db > SILENCE_FLOOR_DB
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    Completed(SampleReport),
    /// Torn down before the window elapsed; no peak is reported
    Cancelled { frames: u64 },
}

/// Running peak over a stream of frames
#[derive(Debug, Clone)]
pub struct LoudnessSampler {
    peak_db: f64,
    frames: u64,
}

impl LoudnessSampler {
    pub fn new() -> Self {
        Self {
            peak_db: SILENCE_FLOOR_DB,
            frames: 0,
        }
    }

    /// Account for one frame, returning its level
    pub fn observe(&mut self, bins: &[u8]) -> f64 {
        let level = level_from_bins(bins);
        if level > self.peak_db {
            self.peak_db = level;
        }
        self.frames += 1;
        level
    }

    pub fn peak_db(&self) -> f64 {
        self.peak_db
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Start sampling `source` on the current tokio runtime
    pub fn start<S: SpectrumSource>(self, source: S, config: SamplerConfig) -> SamplerSession {
        let cancel = CancellationToken::new();
        let (result_tx, result_rx) = oneshot::channel();
        let (level_tx, level_rx) = watch::channel(SILENCE_FLOOR_DB);

        tokio::spawn(run_window(self, source, config, cancel.clone(), level_tx, result_tx));

        SamplerSession {
            result: result_rx,
            levels: level_rx,
            cancel: cancel.clone(),
            _guard: cancel.drop_guard(),
        }
    }
}

impl Default for LoudnessSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running sampling window
///
/// Dropping the handle cancels the window.
pub struct SamplerSession {
    result: oneshot::Receiver<Result<SampleOutcome>>,
    levels: watch::Receiver<f64>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl SamplerSession {
    /// Live level of the most recent frame
    pub fn levels(&self) -> watch::Receiver<f64> {
        self.levels.clone()
    }

    /// Stop sampling early; the outcome becomes [`SampleOutcome::Cancelled`]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this window when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the window to finish
    pub async fn finished(mut self) -> Result<SampleOutcome> {
        match (&mut self.result).await {
            Ok(outcome) => outcome,
            Err(_) => Err(MeterError::Internal(
                "sampler task ended without reporting".to_string(),
            )),
        }
    }
}

async fn run_window<S: SpectrumSource>(
    sampler: LoudnessSampler,
    source: S,
    config: SamplerConfig,
    cancel: CancellationToken,
    levels: watch::Sender<f64>,
    result_tx: oneshot::Sender<Result<SampleOutcome>>,
) {
    let outcome = sample_until_done(sampler, source, config, &cancel, &levels).await;
    match &outcome {
        Ok(SampleOutcome::Completed(report)) => info!(
            "Sampling finished: peak {:.1} dB over {} frames",
            report.peak_db, report.frames
        ),
        Ok(SampleOutcome::Cancelled { frames }) => {
            info!("Sampling cancelled after {} frames", frames)
        }
        Err(e) => tracing::warn!("Sampling failed: {}", e),
    }
    // Receiver may already be gone when the session was dropped
    let _ = result_tx.send(outcome);
}

async fn sample_until_done<S: SpectrumSource>(
    mut sampler: LoudnessSampler,
    mut source: S,
    config: SamplerConfig,
    cancel: &CancellationToken,
    levels: &watch::Sender<f64>,
) -> Result<SampleOutcome> {
    let started = Instant::now();
    let deadline = tokio::time::sleep(config.duration);
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval(config.frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut bins = vec![0u8; source.bin_count()];

    debug!(
        "Sampling for {:?} at {:?} per frame",
        config.duration, config.frame_interval
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                drop(source);
                return Ok(SampleOutcome::Cancelled { frames: sampler.frames() });
            }
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                source.read_frame(&mut bins)?;
                let level = sampler.observe(&bins);
                levels.send_replace(level);
            }
        }
    }

    drop(source);
    Ok(SampleOutcome::Completed(SampleReport {
        peak_db: sampler.peak_db(),
        frames: sampler.frames(),
        elapsed: started.elapsed(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_sampler_is_at_floor() {
        let sampler = LoudnessSampler::new();
        assert_eq!(sampler.peak_db(), SILENCE_FLOOR_DB);
        assert_eq!(sampler.frames(), 0);
    }

    #[test]
    fn test_peak_is_running_maximum() {
        let mut sampler = LoudnessSampler::new();
        let levels: Vec<f64> = [[5u8; 8], [50u8; 8], [20u8; 8]]
            .iter()
            .map(|frame| sampler.observe(frame))
            .collect();

        let max = levels.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(sampler.peak_db(), max);
        assert_eq!(sampler.frames(), 3);
    }

    #[test]
    fn test_samplers_do_not_share_peak() {
        let mut loud = LoudnessSampler::new();
        loud.observe(&[200u8; 8]);
        let quiet = LoudnessSampler::new();
        assert_eq!(quiet.peak_db(), SILENCE_FLOOR_DB);
    }

    #[test]
    fn test_config_rejects_zero_durations() {
        assert!(SamplerConfig::new(Duration::ZERO, DEFAULT_FRAME_INTERVAL).is_err());
        assert!(SamplerConfig::new(DEFAULT_SAMPLE_DURATION, Duration::ZERO).is_err());
        assert!(SamplerConfig::new(DEFAULT_SAMPLE_DURATION, DEFAULT_FRAME_INTERVAL).is_ok());
    }

    #[test]
    fn test_report_heard_sound() {
        let silent = SampleReport {
            peak_db: SILENCE_FLOOR_DB,
            frames: 10,
            elapsed: Duration::from_secs(5),
        };
        assert!(!silent.heard_sound());
        assert!(SampleReport { peak_db: 10.1, ..silent }.heard_sound());
    }
}
