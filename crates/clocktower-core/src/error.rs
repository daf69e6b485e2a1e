//! Error types for clocktower-core

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by collaborators, work functions and maintenance tasks.
///
/// None of these cross the queue or sweeper boundary: they are logged where
/// the failed item or task is consumed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Interaction error: {0}")]
    Interaction(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = Error::Remote("missing access".to_string());
        assert_eq!(err.to_string(), "Remote error: missing access");
    }

    #[test]
    fn test_database_error_display() {
        let err = Error::Database("connection reset".to_string());
        assert_eq!(err.to_string(), "Database error: connection reset");
    }

    #[test]
    fn test_interaction_error_display() {
        let err = Error::Interaction("unknown interaction".to_string());
        assert_eq!(err.to_string(), "Interaction error: unknown interaction");
    }

    #[test]
    fn test_from_anyhow_error() {
        let err: Error = anyhow::anyhow!("game logic failed").into();
        assert_eq!(err.to_string(), "Other error: game logic failed");
    }
}
