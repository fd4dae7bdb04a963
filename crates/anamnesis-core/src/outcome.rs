// ABOUTME: Uniform success/failure envelope returned by every service-layer operation.
// ABOUTME: Grounded on original_source mcp_server/server.py's ResponseWrapper/_with_error_handling.

use serde::{Deserialize, Serialize};

use crate::error::AnamnesisError;
use crate::error_classifier::classify_error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub circuit_state: Option<String>,
    pub retryable: bool,
}

/// The envelope every service-layer operation returns instead of a bare `Result`,
/// so the MCP tool-server and CLI boundary can surface errors uniformly without
/// re-deriving retryability/circuit state at each call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceOutcome<T> {
    Success { data: T },
    Failure { error: ErrorInfo },
}

impl<T> ServiceOutcome<T> {
    pub fn success(data: T) -> Self {
        ServiceOutcome::Success { data }
    }

    pub fn failure(err: &AnamnesisError, operation: &str) -> Self {
        let classification = classify_error(err);
        let circuit_state = match err {
            AnamnesisError::CircuitBreaker { state, .. } => Some(state.clone()),
            _ => None,
        };
        ServiceOutcome::Failure {
            error: ErrorInfo {
                code: err.code().to_string(),
                message: format!("{operation} failed: {}", err.user_message()),
                circuit_state,
                retryable: classification.is_retryable,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ServiceOutcome::Success { .. })
    }

    pub fn into_result(self) -> Result<T, ErrorInfo> {
        match self {
            ServiceOutcome::Success { data } => Ok(data),
            ServiceOutcome::Failure { error } => Err(error),
        }
    }
}

/// Run a fallible operation and fold its result into a `ServiceOutcome`, tagging
/// failures with the operation name the way `_with_error_handling` decorates every
/// MCP tool entry point.
pub fn wrap_outcome<T>(operation: &str, result: Result<T, AnamnesisError>) -> ServiceOutcome<T> {
    match result {
        Ok(v) => ServiceOutcome::success(v),
        Err(e) => {
            tracing::error!(operation, error = %e, "operation failed");
            ServiceOutcome::failure(&e, operation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_outcome_serializes_with_status_tag() {
        let outcome = ServiceOutcome::success(42);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], 42);
    }

    #[test]
    fn circuit_breaker_failure_carries_circuit_state() {
        let err = AnamnesisError::CircuitBreaker {
            state: "OPEN".into(),
            failures: 5,
            success_rate: 0.0,
            stats: Default::default(),
        };
        let outcome: ServiceOutcome<()> = wrap_outcome("search_concepts", Err(err));
        match outcome {
            ServiceOutcome::Failure { error } => {
                assert_eq!(error.circuit_state.as_deref(), Some("OPEN"));
                assert!(error.retryable);
                assert!(error.message.contains("search_concepts"));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn validation_failure_is_not_retryable() {
        let err = AnamnesisError::Validation {
            missing: vec!["name".into()],
        };
        let outcome: ServiceOutcome<()> = wrap_outcome("save_concept", Err(err));
        match outcome {
            ServiceOutcome::Failure { error } => assert!(!error.retryable),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn into_result_round_trips() {
        let outcome: ServiceOutcome<i32> = ServiceOutcome::success(7);
        assert_eq!(outcome.into_result(), Ok(7));
    }
}
