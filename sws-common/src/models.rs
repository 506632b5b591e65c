//! Leaderboard domain models

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Minimum length of the school and teacher names on the entry form
pub const MIN_NAME_LEN: usize = 3;

/// School grade of the class taking part
///
/// Closed set; serialized as the same tokens the leaderboard displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
    #[serde(rename = "3rd")]
    Third,
    #[serde(rename = "4th")]
    Fourth,
    #[serde(rename = "5th")]
    Fifth,
}

impl Grade {
    pub const ALL: [Grade; 5] = [
        Grade::First,
        Grade::Second,
        Grade::Third,
        Grade::Fourth,
        Grade::Fifth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::First => "1st",
            Grade::Second => "2nd",
            Grade::Third => "3rd",
            Grade::Fourth => "4th",
            Grade::Fifth => "5th",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Grade::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("unknown grade '{}' (expected 1st..5th)", s)))
    }
}

/// The (school, teacher, grade) triple a score belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub school: String,
    pub teacher: String,
    pub grade: Grade,
}

impl Identity {
    pub fn new(school: impl Into<String>, teacher: impl Into<String>, grade: Grade) -> Self {
        Self {
            school: school.into().trim().to_string(),
            teacher: teacher.into().trim().to_string(),
            grade,
        }
    }

    /// Entry form validation: both names need at least [`MIN_NAME_LEN`] characters
    pub fn validate(&self) -> Result<()> {
        if self.school.trim().chars().count() < MIN_NAME_LEN {
            return Err(Error::InvalidInput(
                "school must be at least 3 characters".to_string(),
            ));
        }
        if self.teacher.trim().chars().count() < MIN_NAME_LEN {
            return Err(Error::InvalidInput(
                "teacher must be at least 3 characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// A score submission as received by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScore {
    pub school: String,
    pub teacher: String,
    pub grade: Grade,
    pub score: f64,
}

impl NewScore {
    pub fn new(identity: &Identity, score: f64) -> Self {
        Self {
            school: identity.school.clone(),
            teacher: identity.teacher.clone(),
            grade: identity.grade,
            score,
        }
    }

    /// Ledger-side constraints: names non-blank, score positive and finite
    ///
    /// Returns the submission with surrounding whitespace removed from the names,
    /// so " Mr. Brown" and "Mr. Brown" key the same row.
    pub fn validated(self) -> Result<Self> {
        let school = self.school.trim().to_string();
        let teacher = self.teacher.trim().to_string();

        if school.is_empty() {
            return Err(Error::InvalidInput("school must not be empty".to_string()));
        }
        if teacher.is_empty() {
            return Err(Error::InvalidInput("teacher must not be empty".to_string()));
        }
        if !self.score.is_finite() || self.score <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "score must be a positive number, got {}",
                self.score
            )));
        }

        Ok(Self {
            school,
            teacher,
            grade: self.grade,
            score: self.score,
        })
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.school.clone(), self.teacher.clone(), self.grade)
    }
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: Uuid,
    pub school: String,
    pub teacher: String,
    pub grade: Grade,
    pub score: f64,
}

impl ScoreRecord {
    pub fn identity(&self) -> Identity {
        Identity::new(self.school.clone(), self.teacher.clone(), self.grade)
    }
}

/// What a submission did to the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// First score for this identity
    Created,
    /// Submitted score beat the stored one
    Raised,
    /// Submitted score was equal or lower; row left as it was
    Unchanged,
}

impl SubmitOutcome {
    /// True when the leaderboard contents changed
    pub fn changed(&self) -> bool {
        !matches!(self, SubmitOutcome::Unchanged)
    }
}
