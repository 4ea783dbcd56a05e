//! Error types for adjudication and scoring

use thiserror::Error;

use crate::models::{ChallengeId, EventId};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced to callers of the core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid submission: {0}")]
    Validation(String),

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Event has not started yet")]
    EventNotStarted,

    #[error("Event has ended")]
    EventEnded,

    #[error("You are not a member of a team for this event")]
    NoTeamForUser,

    #[error("Challenge not found: {0}")]
    ChallengeNotFound(ChallengeId),

    #[error("Already solved by your team")]
    AlreadySolvedByTeam,

    #[error("Incorrect flag")]
    IncorrectFlag,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_error",
            CoreError::NotAuthenticated => "not_authenticated",
            CoreError::EventNotFound(_) => "event_not_found",
            CoreError::EventNotStarted => "event_not_started",
            CoreError::EventEnded => "event_ended",
            CoreError::NoTeamForUser => "no_team_for_user",
            CoreError::ChallengeNotFound(_) => "challenge_not_found",
            CoreError::AlreadySolvedByTeam => "already_solved_by_team",
            CoreError::IncorrectFlag => "incorrect_flag",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Storage(_) => "internal",
        }
    }

    /// Message safe to show to the submitting client
    pub fn public_message(&self) -> String {
        match self {
            CoreError::Storage(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_hide_internals() {
        let err = CoreError::from(anyhow::anyhow!("connection refused on 10.0.0.5:5432"));
        assert_eq!(err.kind(), "internal");
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_business_errors_keep_message() {
        assert_eq!(
            CoreError::AlreadySolvedByTeam.public_message(),
            "Already solved by your team"
        );
        assert_eq!(CoreError::IncorrectFlag.kind(), "incorrect_flag");
    }
}
