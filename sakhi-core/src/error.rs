//! Error types for Sakhi operations

use uuid::Uuid;
use thiserror::Error;

/// Persistence layer errors.
///
/// These are the only errors the conversation pipeline propagates to its
/// caller; everything else degrades to a fallback value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {kind} with id {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("Insert failed for {kind}: {reason}")]
    InsertFailed { kind: &'static str, reason: String },

    #[error("Conversation {id} already ended")]
    ConversationEnded { id: Uuid },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage backend unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Generation/embedding provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("Call to {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Vector operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },
}

/// Master error type for all Sakhi errors.
#[derive(Debug, Clone, Error)]
pub enum SakhiError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),
}

/// Result type alias for Sakhi operations.
pub type SakhiResult<T> = Result<T, SakhiError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            kind: "conversation",
            id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Record not found"));
        assert!(msg.contains("conversation"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_llm_error_display_timeout() {
        let err = LlmError::Timeout {
            provider: "groq".to_string(),
            timeout_ms: 15000,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("timed out"));
        assert!(msg.contains("groq"));
        assert!(msg.contains("15000"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "confidence_threshold".to_string(),
            value: "1.5".to_string(),
            reason: "must be between 0.0 and 1.0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("confidence_threshold"));
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn test_vector_error_display_dimension_mismatch() {
        let err = VectorError::DimensionMismatch {
            expected: 384,
            got: 768,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Dimension mismatch"));
        assert!(msg.contains("384"));
        assert!(msg.contains("768"));
    }

    #[test]
    fn test_sakhi_error_from_variants() {
        let storage = SakhiError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, SakhiError::Storage(_)));

        let llm = SakhiError::from(LlmError::ProviderNotConfigured);
        assert!(matches!(llm, SakhiError::Llm(_)));

        let config = SakhiError::from(ConfigError::MissingRequired {
            field: "api_key".to_string(),
        });
        assert!(matches!(config, SakhiError::Config(_)));

        let vector = SakhiError::from(VectorError::InvalidVector {
            reason: "empty".to_string(),
        });
        assert!(matches!(vector, SakhiError::Vector(_)));
    }
}
