//! sws-sm (Sound Meter) - Sound Wave Science loudness game
//!
//! Counts down, listens to the classroom for a few seconds and records the
//! loudest moment with the leaderboard service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use sws_common::config::TomlConfig;
use sws_common::{Grade, Identity};
use sws_sm::client::LedgerClient;
use sws_sm::display::{leaderboard_lines, meter_line};
use sws_sm::game::{
    Game, GameObserver, GameSettings, GameState, RoundResult, SystemMicrophone,
    MICROPHONE_GUIDANCE,
};
use sws_sm::sampler::SamplerConfig;
use sws_sm::{capture, MeterError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit status when the microphone or the player entry is unusable
const EXIT_UNUSABLE: u8 = 2;

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "sws-sm", version, about = "Sound Wave Science sound meter")]
struct Cli {
    /// Leaderboard service base URL (overrides [meter] ledger_url)
    #[arg(long, env = "SWS_LEDGER_URL", global = true)]
    ledger_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play the loudness game
    Play {
        #[arg(long)]
        school: String,

        #[arg(long)]
        teacher: String,

        /// 1st, 2nd, 3rd, 4th or 5th
        #[arg(long)]
        grade: Grade,

        /// Input device name (see `sws-sm devices`)
        #[arg(long)]
        device: Option<String>,

        /// Sampling window in milliseconds
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Rounds to play back to back
        #[arg(long, default_value_t = 1)]
        rounds: u32,
    },

    /// Print the high score list
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// List audio input devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = TomlConfig::load().context("Failed to load config file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting Sound Wave Science Sound Meter (sws-sm) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let ledger_url = cli.ledger_url.unwrap_or_else(|| config.meter.ledger_url.clone());

    match cli.command {
        Command::Play {
            school,
            teacher,
            grade,
            device,
            duration_ms,
            rounds,
        } => {
            let mut meter = config.meter.clone();
            if let Some(ms) = duration_ms {
                meter.sample_duration_ms = ms;
            }
            let device = device.or(meter.device.clone());
            let identity = Identity::new(school, teacher, grade);
            play(&ledger_url, &meter, identity, device, rounds).await
        }
        Command::Leaderboard { limit } => {
            let client = LedgerClient::new(&ledger_url)?;
            let records = client
                .high_scores(limit)
                .await
                .with_context(|| format!("Failed to fetch high scores from {}", ledger_url))?;
            if records.is_empty() {
                println!("No scores yet");
            }
            for line in leaderboard_lines(&records) {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Devices => {
            let default = capture::default_input_device_name();
            for name in capture::list_input_devices()? {
                let marker = if Some(&name) == default.as_ref() { " (default)" } else { "" };
                println!("{}{}", name, marker);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn play(
    ledger_url: &str,
    meter: &sws_common::config::MeterConfig,
    identity: Identity,
    device: Option<String>,
    rounds: u32,
) -> Result<ExitCode> {
    if let Err(e) = identity.validate() {
        eprintln!("{}", e);
        return Ok(ExitCode::from(EXIT_UNUSABLE));
    }

    let settings = match GameSettings::from_config(meter) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(EXIT_UNUSABLE));
        }
    };
    let client = LedgerClient::new(ledger_url)?;
    let mut game = Game::new(SystemMicrophone::new(device), client, settings);
    let mut observer = TerminalObserver::new(game.settings().sampler);

    if let Err(e) = game.check_microphone(&mut observer) {
        return Ok(microphone_failure(&e));
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted");
                cancel.cancel();
            }
        }
    });

    let mut last_failed = false;
    for round in 1..=rounds.max(1) {
        if rounds > 1 {
            println!("Round {} of {}", round, rounds);
        }
        println!(
            "Get ready, {} {} grade from {}!",
            identity.teacher, identity.grade, identity.school
        );

        match game.play_round(&identity, &cancel, &mut observer).await {
            Ok(RoundResult::Recorded {
                report,
                record,
                leaderboard,
            }) => {
                last_failed = false;
                println!("You reached {:.1} dB!", report.peak_db);
                if record.score > report.peak_db {
                    println!("Your class's best is still {:.1} dB", record.score);
                }
                println!();
                match leaderboard {
                    Some(rows) => {
                        println!("High Scores");
                        for line in leaderboard_lines(&rows) {
                            println!("  {}", line);
                        }
                    }
                    None => println!("Your score is saved, but the leaderboard is unavailable right now"),
                }
            }
            Ok(RoundResult::NoSound { .. }) => {
                last_failed = false;
                println!("No sound detected, nothing was recorded. Try again!");
            }
            Ok(RoundResult::Unsent { report, reason }) => {
                last_failed = true;
                println!("You reached {:.1} dB!", report.peak_db);
                eprintln!("Could not reach the leaderboard to save it ({}). Try again!", reason);
            }
            Err(MeterError::Cancelled) => {
                println!("Stopped");
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
            Err(e) if e.needs_microphone() => return Ok(microphone_failure(&e)),
            Err(e) => {
                last_failed = true;
                error!("Round failed: {}", e);
                eprintln!("Something went wrong recording your score: {}. Try again!", e);
            }
        }
    }

    Ok(if last_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn microphone_failure(e: &MeterError) -> ExitCode {
    error!("{}", e);
    eprintln!("{}", MICROPHONE_GUIDANCE);
    eprintln!("({})", e);
    ExitCode::from(EXIT_UNUSABLE)
}

/// Prints game progress to stdout
struct TerminalObserver {
    /// Redraw the meter at most this often
    redraw_every: u64,
    frames: u64,
    remaining: String,
}

impl TerminalObserver {
    fn new(sampler: SamplerConfig) -> Self {
        // ~10 redraws per second regardless of the frame cadence
        let per_redraw = Duration::from_millis(100).as_millis() / sampler.frame_interval.as_millis().max(1);
        Self {
            redraw_every: u64::try_from(per_redraw).unwrap_or(1).max(1),
            frames: 0,
            remaining: String::new(),
        }
    }
}

impl GameObserver for TerminalObserver {
    fn state_changed(&mut self, state: GameState) {
        match state {
            GameState::Running => {
                self.frames = 0;
                println!("Make some noise!");
            }
            GameState::Done => println!(),
            GameState::Permissions | GameState::Ready => {}
        }
    }

    fn countdown(&mut self, display: &str) {
        println!("{}", display);
    }

    fn time_remaining(&mut self, display: &str) {
        self.remaining = display.to_string();
    }

    fn level(&mut self, db: f64) {
        self.frames += 1;
        if self.frames % self.redraw_every != 0 {
            return;
        }
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "\r{} {:>2}s", meter_line(db), self.remaining);
        let _ = stdout.flush();
    }
}
