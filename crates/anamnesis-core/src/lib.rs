// ABOUTME: Shared utilities used across the Anamnesis workspace: errors, config,
// ABOUTME: logging, caching, and resilience primitives.

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod error_classifier;
pub mod ids;
pub mod logging;
pub mod outcome;
pub mod retrier;
pub mod shutdown;

pub use cache::{Cache, CacheBuilder, CacheStats};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use config::{AnamnesisConfig, LogLevel};
pub use error::{AnamnesisError, Result};
pub use error_classifier::{classify_error, ErrorCategory, ErrorClassification, ErrorClassifier, ErrorPattern, RetryStrategy, Severity};
pub use ids::generate_id;
pub use logging::{
    current_correlation_id, current_request_context, generate_request_id, init_logging,
    run_with_request_context, with_correlation_id, RequestContext,
};
pub use outcome::{wrap_outcome, ErrorInfo, ServiceOutcome};
pub use retrier::{retry, retry_async, RetryConfig};
pub use shutdown::{ShutdownOutcome, ShutdownRegistry, ShutdownReport};
