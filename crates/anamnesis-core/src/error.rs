use thiserror::Error;

/// Top-level error taxonomy shared across the workspace.
#[derive(Error, Debug)]
pub enum AnamnesisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: missing fields {missing:?}")]
    Validation { missing: Vec<String> },

    #[error("type coercion error: field {field} has invalid value {value:?}, expected one of {valid_values:?}")]
    TypeCoercion {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("circuit breaker open (state={state}, failures={failures})")]
    CircuitBreaker {
        state: String,
        failures: u32,
        success_rate: f64,
        stats: crate::circuit_breaker::CircuitBreakerStats,
    },

    #[error("rollback unsupported for migration {version}: {name}")]
    RollbackUnsupported { version: i64, name: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, AnamnesisError>;

impl AnamnesisError {
    /// A short machine-readable error code, used in `ServiceOutcome` envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            AnamnesisError::Io(_) => "IO_ERROR",
            AnamnesisError::Serialization(_) => "SERIALIZATION_ERROR",
            AnamnesisError::Validation { .. } => "VALIDATION_ERROR",
            AnamnesisError::TypeCoercion { .. } => "TYPE_COERCION_ERROR",
            AnamnesisError::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            AnamnesisError::InvalidQuery(_) => "INVALID_QUERY",
            AnamnesisError::Parse { .. } => "PARSE_ERROR",
            AnamnesisError::Storage(_) => "STORAGE_ERROR",
            AnamnesisError::CircuitBreaker { .. } => "CIRCUIT_BREAKER_OPEN",
            AnamnesisError::RollbackUnsupported { .. } => "ROLLBACK_UNSUPPORTED",
            AnamnesisError::NotFound(_) => "NOT_FOUND",
            AnamnesisError::InvalidOperation(_) => "INVALID_OPERATION",
            AnamnesisError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// A message suitable for surfacing to an end user (never a stack trace).
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
