//! Error types for the resolution layer.

use revend_core::RevendError;

/// Errors that stop a turn before it is processed.
///
/// Failures during processing do not surface here; they become an error
/// outcome on the turn itself.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("query exceeds maximum length of {0} characters")]
    QueryTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RevendError> for ChatError {
    fn from(err: RevendError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyQuery.to_string(), "query cannot be empty");
        assert_eq!(
            ChatError::QueryTooLong(2000).to_string(),
            "query exceeds maximum length of 2000 characters"
        );
        assert_eq!(
            ChatError::SessionNotFound("abc".to_string()).to_string(),
            "session not found: abc"
        );
        assert_eq!(
            ChatError::Storage("disk full".to_string()).to_string(),
            "storage error: disk full"
        );
    }

    #[test]
    fn test_chat_error_from_revend_error() {
        let err: ChatError = RevendError::Storage("connection lost".to_string()).into();
        assert!(matches!(err, ChatError::Storage(_)));
        assert!(err.to_string().contains("connection lost"));
    }
}
