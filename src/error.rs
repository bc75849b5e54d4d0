//! Error kinds surfaced by the resolver and the alarm scheduler.
//!
//! Every variant is recoverable by the caller; none of them should terminate the
//! process. The CLI layer wraps these in `anyhow` with context.

use crate::date_parser::DateParseError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlarmError {
    #[error("no location is selected")]
    NoLocationSelected,

    #[error("invalid sunrise request: {0}")]
    InvalidRequest(String),

    #[error("sunrise source unreachable: {0}")]
    Transport(String),

    #[error("sunrise source returned an empty response")]
    EmptyResponse,

    #[error("could not decode sunrise response: {0}")]
    Decode(String),

    #[error(transparent)]
    DateParse(#[from] DateParseError),

    #[error("could not compose sunrise date {date} {time} in {zone}")]
    CalendarCompose {
        date: chrono::NaiveDate,
        time: chrono::NaiveTime,
        zone: String,
    },

    #[error("notification hand-off failed: {0}")]
    Dispatch(String),

    #[error("another alarm operation is already in progress")]
    Busy,

    /// The result belonged to an attempt that was cancelled or replaced.
    #[error("alarm operation was superseded before it completed")]
    Superseded,
}

impl AlarmError {
    /// Whether the error came from talking to the sunrise source.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            AlarmError::InvalidRequest(_)
                | AlarmError::Transport(_)
                | AlarmError::EmptyResponse
                | AlarmError::Decode(_)
                | AlarmError::DateParse(_)
                | AlarmError::CalendarCompose { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_failure_classification() {
        assert!(AlarmError::EmptyResponse.is_resolution_failure());
        assert!(AlarmError::Transport("timeout".into()).is_resolution_failure());
        assert!(!AlarmError::Busy.is_resolution_failure());
        assert!(!AlarmError::Dispatch("denied".into()).is_resolution_failure());
    }

    #[test]
    fn test_date_parse_error_is_transparent() {
        let err: AlarmError = DateParseError {
            input: "yesterday".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "no date format matched \"yesterday\""
        );
    }
}
