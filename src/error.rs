use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domains::event::CalendarEvent;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid range: end {end} is not after start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("time already passed: {when}")]
    PastTime { when: DateTime<Utc> },
    #[error("scheduling conflict with event {}", event.id)]
    Conflict { event: Box<CalendarEvent> },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("ambiguous target: {} candidates", candidates.len())]
    AmbiguousTarget { candidates: Vec<CalendarEvent> },
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// Machine-readable classification of a failed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    PastTime,
    Conflict,
    NotFound,
    Ambiguous,
    ExternalService,
    Internal,
}

impl AssistantError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) | Self::InvalidRange { .. } => FailureKind::Validation,
            Self::PastTime { .. } => FailureKind::PastTime,
            Self::Conflict { .. } => FailureKind::Conflict,
            Self::NotFound(_) => FailureKind::NotFound,
            Self::AmbiguousTarget { .. } => FailureKind::Ambiguous,
            Self::ExternalService(_) => FailureKind::ExternalService,
            Self::Config(_) | Self::Serialization(_) | Self::Runtime(_) | Self::Database(_) => {
                FailureKind::Internal
            }
        }
    }
}

impl From<diesel::result::Error> for AssistantError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_display() {
        let err = AssistantError::Config("x".to_string());
        assert!(format!("{err}").contains("configuration error"));
        assert_eq!(err.kind(), FailureKind::Internal);

        let now = Utc::now();
        let range = AssistantError::InvalidRange {
            start: now,
            end: now,
        };
        assert_eq!(range.kind(), FailureKind::Validation);
        assert_eq!(
            AssistantError::ExternalService("down".to_string()).kind(),
            FailureKind::ExternalService
        );
        assert_eq!(
            AssistantError::AmbiguousTarget {
                candidates: Vec::new()
            }
            .kind(),
            FailureKind::Ambiguous
        );
    }

    #[test]
    fn diesel_errors_become_database_errors() {
        let err: AssistantError = diesel::result::Error::NotFound.into();
        assert!(matches!(err, AssistantError::Database(_)));
    }
}
