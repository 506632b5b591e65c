//! Error types for the sound meter

use thiserror::Error;

/// Result type for sound meter operations
pub type Result<T> = std::result::Result<T, MeterError>;

/// Errors raised while acquiring the microphone, sampling, or talking to the ledger
#[derive(Error, Debug)]
pub enum MeterError {
    /// The operating system refused access to the input device
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No input device, or the requested device could not be opened
    #[error("No usable input device: {0}")]
    DeviceUnavailable(String),

    /// The capture stream failed after it was started
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// Player entry or argument rejected before anything was started
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The leaderboard answered with an error status
    #[error("Leaderboard rejected the request ({status}): {message}")]
    Ledger { status: u16, message: String },

    /// The leaderboard could not be reached
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The round was stopped before the sampling window elapsed
    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeterError {
    /// True for errors the player fixes by granting or connecting a microphone
    pub fn needs_microphone(&self) -> bool {
        matches!(
            self,
            MeterError::PermissionDenied(_) | MeterError::DeviceUnavailable(_)
        )
    }

    /// True for leaderboard failures that are worth retrying
    pub fn is_transport(&self) -> bool {
        match self {
            MeterError::Http(_) => true,
            MeterError::Ledger { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<sws_common::Error> for MeterError {
    fn from(err: sws_common::Error) -> Self {
        match err {
            sws_common::Error::InvalidInput(msg) => MeterError::InvalidInput(msg),
            other => MeterError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_invalid_input_keeps_message() {
        let err: MeterError =
            sws_common::Error::InvalidInput("school must be at least 3 characters".into()).into();
        assert!(matches!(err, MeterError::InvalidInput(ref m) if m.contains("school")));
    }

    #[test]
    fn test_microphone_errors_are_grouped() {
        assert!(MeterError::PermissionDenied("denied".into()).needs_microphone());
        assert!(MeterError::DeviceUnavailable("none".into()).needs_microphone());
        assert!(!MeterError::Cancelled.needs_microphone());
    }

    #[test]
    fn test_only_server_side_ledger_errors_are_transport() {
        let server = MeterError::Ledger { status: 500, message: "x".into() };
        let client = MeterError::Ledger { status: 400, message: "x".into() };
        assert!(server.is_transport());
        assert!(!client.is_transport());
    }
}
