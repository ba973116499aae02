use thiserror::Error;

use crate::ical::parse::ParseError;

/// RFC parsing, timezone and codec errors
#[derive(Error, Debug)]
pub enum RfcError {
    #[error("Unknown timezone: {id}{}", .hint.as_ref().map(|h| format!(" perhaps you meant {h}")).unwrap_or_default())]
    UnknownTimeZone { id: String, hint: Option<String> },

    #[error("Malformed value: {0}")]
    MalformedValue(String),

    #[error("Invalid date-time: {0}")]
    InvalidDateTime(String),

    #[error(transparent)]
    ParseError(#[from] ParseError),
}

impl RfcError {
    /// Unknown timezone without a correction hint.
    #[must_use]
    pub fn unknown_time_zone(id: impl Into<String>) -> Self {
        Self::UnknownTimeZone {
            id: id.into(),
            hint: None,
        }
    }
}

pub type RfcResult<T> = std::result::Result<T, RfcError>;
