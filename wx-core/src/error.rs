use thiserror::Error;

use crate::model::{Section, Status};

/// Everything a driver can report while producing a [`crate::WeatherRecord`].
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Station ID not defined")]
    StationMissing,

    #[error("Invalid station '{station}': {reason}")]
    InvalidStation { station: String, reason: String },

    #[error("No API key provided")]
    MissingApiKey,

    #[error("Failed to retrieve {step}: {message}")]
    Transport { step: &'static str, message: String },

    #[error("Invalid {step} response: {reason}")]
    InvalidResponse { step: &'static str, reason: String },

    #[error("Incomplete {section} data: {reason}")]
    Parse { section: Section, reason: String },
}

impl DriverError {
    pub(crate) fn missing(section: Section, field: &str) -> Self {
        DriverError::Parse { section, reason: format!("missing field `{field}`") }
    }

    /// True for errors raised before any request was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DriverError::StationMissing
                | DriverError::InvalidStation { .. }
                | DriverError::MissingApiKey
        )
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// A refresh that had to stop early.
///
/// Carries the section statuses as they stood when the refresh gave up, so the
/// host can show which part failed while keeping its last good snapshot.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct RefreshError {
    pub status: Status,
    pub source: DriverError,
}
