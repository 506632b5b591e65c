//! Loudness level of one spectrum frame
//!
//! A frame is the byte magnitude of every frequency bin at one instant. Its
//! level is the RMS of the bins expressed in decibels:
//! `20 * log10(sqrt(mean(bin^2)))`.

/// Level reported for silence. Every level is clamped to at least this value.
pub const SILENCE_FLOOR_DB: f64 = 0.0;

/// Upper edge of the [`LevelBand::Quiet`] band
pub const QUIET_BELOW_DB: f64 = 35.0;

/// Upper edge of the [`LevelBand::Moderate`] band
pub const MODERATE_BELOW_DB: f64 = 55.0;

/// Level of one frame in dB, never below [`SILENCE_FLOOR_DB`]
///
/// An empty frame or a frame of all-zero bins is silence.
pub fn level_from_bins(bins: &[u8]) -> f64 {
    if bins.is_empty() {
        return SILENCE_FLOOR_DB;
    }

    let sum_sq: f64 = bins.iter().map(|&b| f64::from(b) * f64::from(b)).sum();
    let rms = (sum_sq / bins.len() as f64).sqrt();
    if rms <= 0.0 {
        return SILENCE_FLOOR_DB;
    }

    let db = 20.0 * rms.log10();
    if db.is_finite() {
        db.max(SILENCE_FLOOR_DB)
    } else {
        SILENCE_FLOOR_DB
    }
}

/// Colour band used when drawing the live meter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelBand {
    Quiet,
    Moderate,
    Loud,
}

impl LevelBand {
    pub fn from_db(db: f64) -> Self {
        if db < QUIET_BELOW_DB {
            LevelBand::Quiet
        } else if db < MODERATE_BELOW_DB {
            LevelBand::Moderate
        } else {
            LevelBand::Loud
        }
    }
}
