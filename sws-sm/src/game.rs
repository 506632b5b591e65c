//! One player's round: microphone check, countdown, sampling, submission
//!
//! ```text
//! Permissions --mic ok--> Ready --countdown--> Running --window ends--> Done
//!      ^                    ^                     |
//!      +---- mic lost ------+------ cancelled ----+
//! ```

use std::time::Duration;
use sws_common::config::MeterConfig;
use sws_common::{Identity, NewScore, ScoreRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::MicrophoneCapture;
use crate::client::LedgerClient;
use crate::countdown::{Countdown, CountdownEvent, DEFAULT_TICK};
use crate::error::{MeterError, Result};
use crate::sampler::{LoudnessSampler, SampleOutcome, SampleReport, SamplerConfig, SpectrumSource};

/// Shown whenever the microphone could not be opened
pub const MICROPHONE_GUIDANCE: &str =
    "You need to allow your microphone so we can see how loud you are!";

/// Terminal message of the pre-game countdown
pub const GO_MESSAGE: &str = "GO!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// Waiting for a usable microphone
    Permissions,
    Ready,
    Running,
    Done,
}

/// Opens a fresh capture source for each round
pub trait Microphone {
    type Source: SpectrumSource;

    fn acquire(&self) -> Result<Self::Source>;
}

/// The system's input device via cpal
pub struct SystemMicrophone {
    device: Option<String>,
}

impl SystemMicrophone {
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

impl Microphone for SystemMicrophone {
    type Source = MicrophoneCapture;

    fn acquire(&self) -> Result<MicrophoneCapture> {
        let capture = MicrophoneCapture::open(self.device.as_deref())?;
        debug!("Microphone '{}' acquired", capture.device_name());
        Ok(capture)
    }
}

/// Where finished rounds are recorded
#[allow(async_fn_in_trait)]
pub trait Scoreboard {
    async fn add_score(&self, submission: &NewScore) -> Result<ScoreRecord>;
    async fn high_scores(&self, limit: i64) -> Result<Vec<ScoreRecord>>;
}

impl Scoreboard for LedgerClient {
    async fn add_score(&self, submission: &NewScore) -> Result<ScoreRecord> {
        LedgerClient::add_score(self, submission).await
    }

    async fn high_scores(&self, limit: i64) -> Result<Vec<ScoreRecord>> {
        LedgerClient::high_scores(self, limit).await
    }
}

/// Progress callbacks for whatever is drawing the game
pub trait GameObserver {
    fn state_changed(&mut self, _state: GameState) {}
    /// Pre-game countdown display ("3", "2", "1", "GO!")
    fn countdown(&mut self, _display: &str) {}
    /// Seconds left in the sampling window
    fn time_remaining(&mut self, _display: &str) {}
    /// Level of the latest frame in dB
    fn level(&mut self, _db: f64) {}
}

/// Observer that ignores everything
pub struct SilentObserver;

impl GameObserver for SilentObserver {}

#[derive(Debug, Clone)]
pub struct GameSettings {
    pub countdown_from: u32,
    pub countdown_tick: Duration,
    pub sampler: SamplerConfig,
    /// Rows fetched after a score is recorded
    pub leaderboard_size: i64,
    /// Tries per round when the leaderboard is unreachable or failing
    pub submit_attempts: u32,
    pub retry_delay: Duration,
}

impl GameSettings {
    pub fn from_config(config: &MeterConfig) -> Result<Self> {
        let settings = Self {
            countdown_from: config.countdown_from,
            sampler: SamplerConfig::new(
                Duration::from_millis(config.sample_duration_ms),
                Duration::from_millis(config.frame_interval_ms),
            )?,
            ..Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings a round cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.countdown_from == 0 {
            return Err(MeterError::InvalidInput(
                "countdown must start at 1 or more".to_string(),
            ));
        }
        if self.countdown_tick.is_zero() {
            return Err(MeterError::InvalidInput(
                "countdown tick must be positive".to_string(),
            ));
        }
        if self.submit_attempts == 0 {
            return Err(MeterError::InvalidInput(
                "at least one submit attempt is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            countdown_tick: DEFAULT_TICK,
            sampler: SamplerConfig::default(),
            leaderboard_size: 10,
            submit_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundResult {
    /// The ledger accepted the round; `record` holds the stored best score
    ///
    /// `leaderboard` is `None` when the refresh after recording failed.
    Recorded {
        report: SampleReport,
        record: ScoreRecord,
        leaderboard: Option<Vec<ScoreRecord>>,
    },
    /// Nothing above the silence floor was heard, so nothing was submitted
    NoSound { report: SampleReport },
    /// Sound was measured but the leaderboard stayed unreachable
    Unsent { report: SampleReport, reason: String },
}

pub struct Game<M, B> {
    microphone: M,
    scoreboard: B,
    settings: GameSettings,
    state: GameState,
}

impl<M: Microphone, B: Scoreboard> Game<M, B> {
    pub fn new(microphone: M, scoreboard: B, settings: GameSettings) -> Self {
        Self {
            microphone,
            scoreboard,
            settings,
            state: GameState::Permissions,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    fn set_state(&mut self, state: GameState, observer: &mut impl GameObserver) {
        if self.state != state {
            self.state = state;
            observer.state_changed(state);
        }
    }

    /// Open and immediately release the microphone
    ///
    /// Moves to [`GameState::Ready`] on success; stays in
    /// [`GameState::Permissions`] otherwise.
    pub fn check_microphone(&mut self, observer: &mut impl GameObserver) -> Result<()> {
        match self.microphone.acquire() {
            Ok(source) => {
                drop(source);
                self.set_state(GameState::Ready, observer);
                Ok(())
            }
            Err(e) => {
                warn!("Microphone check failed: {}", e);
                self.set_state(GameState::Permissions, observer);
                Err(e)
            }
        }
    }

    /// Play one round for `identity`
    ///
    /// Triggering `cancel` stops the countdown or the sampling window and
    /// returns [`MeterError::Cancelled`] without submitting anything.
    pub async fn play_round(
        &mut self,
        identity: &Identity,
        cancel: &CancellationToken,
        observer: &mut impl GameObserver,
    ) -> Result<RoundResult> {
        identity.validate()?;
        self.settings.validate()?;

        if self.state == GameState::Permissions {
            self.check_microphone(observer)?;
        }
        self.set_state(GameState::Ready, observer);

        let countdown = Countdown::new(self.settings.countdown_from)
            .zero_message(GO_MESSAGE)
            .tick(self.settings.countdown_tick)?
            .spawn();
        tokio::select! {
            _ = countdown.run(|text| observer.countdown(text)) => {}
            _ = cancel.cancelled() => return Err(MeterError::Cancelled),
        }

        let source = match self.microphone.acquire() {
            Ok(source) => source,
            Err(e) => {
                self.set_state(GameState::Permissions, observer);
                return Err(e);
            }
        };
        self.set_state(GameState::Running, observer);

        let outcome = self.sample(source, cancel, observer).await;
        let report = match outcome {
            Ok(SampleOutcome::Completed(report)) => report,
            Ok(SampleOutcome::Cancelled { .. }) => {
                self.set_state(GameState::Ready, observer);
                return Err(MeterError::Cancelled);
            }
            Err(e) => {
                let next = if e.needs_microphone() || matches!(e, MeterError::Stream(_)) {
                    GameState::Permissions
                } else {
                    GameState::Ready
                };
                self.set_state(next, observer);
                return Err(e);
            }
        };
        self.set_state(GameState::Done, observer);

        if !report.heard_sound() {
            info!("No sound above the floor, nothing submitted");
            return Ok(RoundResult::NoSound { report });
        }

        let submission = NewScore::new(identity, report.peak_db);
        let record = match self.submit(&submission, cancel).await {
            Ok(record) => record,
            Err(e) if e.is_transport() => {
                warn!("Score of {:.1} dB not recorded: {}", report.peak_db, e);
                return Ok(RoundResult::Unsent {
                    report,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let leaderboard = match self
            .scoreboard
            .high_scores(self.settings.leaderboard_size)
            .await
        {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("Leaderboard refresh failed after recording: {}", e);
                None
            }
        };

        Ok(RoundResult::Recorded {
            report,
            record,
            leaderboard,
        })
    }

    /// Submit the same peak until it is accepted or attempts run out
    ///
    /// Only transport failures are retried; a rejected submission is returned
    /// as is.
    async fn submit(&self, submission: &NewScore, cancel: &CancellationToken) -> Result<ScoreRecord> {
        let mut attempt = 1;
        loop {
            match self.scoreboard.add_score(submission).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_transport() && attempt < self.settings.submit_attempts => {
                    debug!(
                        "Submit attempt {}/{} failed: {}",
                        attempt, self.settings.submit_attempts, e
                    );
                    attempt += 1;
                    tokio::select! {
                        _ = tokio::time::sleep(self.settings.retry_delay) => {}
                        _ = cancel.cancelled() => return Err(MeterError::Cancelled),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn sample(
        &self,
        source: M::Source,
        cancel: &CancellationToken,
        observer: &mut impl GameObserver,
    ) -> Result<SampleOutcome> {
        let session = LoudnessSampler::new().start(source, self.settings.sampler);
        let session_cancel = session.cancellation_token();
        let mut levels = session.levels();

        let window_secs = self.settings.sampler.duration.as_millis().div_ceil(1000);
        let mut remaining = Countdown::new(u32::try_from(window_secs).unwrap_or(u32::MAX))
            .tick(self.settings.countdown_tick)?
            .spawn();

        let finished = session.finished();
        tokio::pin!(finished);

        loop {
            tokio::select! {
                outcome = &mut finished => return outcome,
                _ = cancel.cancelled(), if !session_cancel.is_cancelled() => session_cancel.cancel(),
                Ok(()) = levels.changed() => observer.level(*levels.borrow_and_update()),
                Some(CountdownEvent::Display(text)) = remaining.next_event() => {
                    observer.time_remaining(&text)
                }
            }
        }
    }
}
