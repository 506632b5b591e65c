//! Terminal rendering of leaderboard rows and the live meter

use sws_common::ScoreRecord;

use crate::level::{LevelBand, SILENCE_FLOOR_DB};

/// Width of the live meter bar in characters
pub const METER_WIDTH: usize = 40;

/// Level that fills the whole bar (rms 255)
const FULL_SCALE_DB: f64 = 48.2;

/// "#1 School of Rock Mr. Brown 1st Grade 12.1 dB"
pub fn leaderboard_row(rank: usize, record: &ScoreRecord) -> String {
    format!(
        "#{} {} {} {} Grade {:.1} dB",
        rank, record.school, record.teacher, record.grade, record.score
    )
}

pub fn leaderboard_lines(records: &[ScoreRecord]) -> Vec<String> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| leaderboard_row(i + 1, record))
        .collect()
}

/// One-line meter: bar proportional to the level plus its band
pub fn meter_line(db: f64) -> String {
    let fraction = ((db - SILENCE_FLOOR_DB) / (FULL_SCALE_DB - SILENCE_FLOOR_DB)).clamp(0.0, 1.0);
    let filled = (fraction * METER_WIDTH as f64).round() as usize;
    let band = match LevelBand::from_db(db) {
        LevelBand::Quiet => "quiet",
        LevelBand::Moderate => "moderate",
        LevelBand::Loud => "LOUD",
    };
    format!(
        "[{}{}] {:5.1} dB {}",
        "#".repeat(filled),
        " ".repeat(METER_WIDTH - filled),
        db,
        band
    )
}
