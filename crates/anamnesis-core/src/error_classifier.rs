// ABOUTME: Classifies errors into category/retry-strategy/severity for consistent handling.
// ABOUTME: Schema grounded on original_source tests/phase2_resilience/test_error_classifier.py
// ABOUTME: (ErrorClassification/ErrorCategory/RetryStrategy/ErrorPattern/add_pattern surface);
// ABOUTME: matching order: custom patterns registered via `add_pattern`, then defaults.

use parking_lot::Mutex;
use regex::Regex;

use crate::error::AnamnesisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Permanent,
    CircuitBreaker,
    ClientError,
    SystemError,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    Immediate,
    ExponentialBackoff,
    LinearBackoff,
    Delayed,
    NoRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub is_retryable: bool,
    pub retry_strategy: RetryStrategy,
    pub max_retries: u32,
    pub should_trip_breaker: bool,
    pub fallback_action: Option<String>,
    pub user_notification_required: bool,
    pub severity: Severity,
    pub details: Option<String>,
}

/// A registered matching rule. `code` matches `AnamnesisError::code()` — the
/// discriminant-as-string that stands in for "exception type" in a taxonomy
/// that otherwise has no runtime class hierarchy to inspect — and doubles as
/// the "error code" match, since that's the only stable code this taxonomy
/// carries. `message_pattern` is checked against `err.to_string()`. A rule
/// matches when every field it sets matches; at least one field must be set.
pub struct ErrorPattern {
    pub code: Option<&'static str>,
    pub message_pattern: Option<Regex>,
    pub classification: ErrorClassification,
}

impl ErrorPattern {
    fn matches(&self, err: &AnamnesisError) -> bool {
        let mut matched_any = false;
        if let Some(code) = self.code {
            if err.code() != code {
                return false;
            }
            matched_any = true;
        }
        if let Some(pattern) = &self.message_pattern {
            if !pattern.is_match(&err.to_string()) {
                return false;
            }
            matched_any = true;
        }
        matched_any
    }
}

/// Holds caller-registered patterns checked ahead of the built-in defaults.
#[derive(Default)]
pub struct ErrorClassifier {
    custom_patterns: Mutex<Vec<ErrorPattern>>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pattern(&self, pattern: ErrorPattern) {
        self.custom_patterns.lock().push(pattern);
    }

    pub fn classify(&self, err: &AnamnesisError) -> ErrorClassification {
        for pattern in self.custom_patterns.lock().iter() {
            if pattern.matches(err) {
                return pattern.classification.clone();
            }
        }
        classify_error(err)
    }
}

/// Classify an `AnamnesisError` using only the built-in default rules, in
/// fixed registration order (most specific first).
pub fn classify_error(err: &AnamnesisError) -> ErrorClassification {
    match err {
        AnamnesisError::CircuitBreaker { .. } => ErrorClassification {
            category: ErrorCategory::CircuitBreaker,
            is_retryable: true,
            retry_strategy: RetryStrategy::Delayed,
            max_retries: 1,
            should_trip_breaker: false,
            fallback_action: Some("use_cached_or_degraded_response".to_string()),
            user_notification_required: true,
            severity: Severity::High,
            details: None,
        },
        AnamnesisError::Io(_) => ErrorClassification {
            category: ErrorCategory::Transient,
            is_retryable: true,
            retry_strategy: RetryStrategy::ExponentialBackoff,
            max_retries: 3,
            should_trip_breaker: true,
            fallback_action: None,
            user_notification_required: false,
            severity: Severity::Medium,
            details: None,
        },
        AnamnesisError::Storage(_) | AnamnesisError::RollbackUnsupported { .. } => ErrorClassification {
            category: ErrorCategory::Transient,
            is_retryable: true,
            retry_strategy: RetryStrategy::ExponentialBackoff,
            max_retries: 3,
            should_trip_breaker: true,
            fallback_action: None,
            user_notification_required: false,
            severity: Severity::High,
            details: None,
        },
        AnamnesisError::NotFound(_) => ErrorClassification {
            category: ErrorCategory::ClientError,
            is_retryable: false,
            retry_strategy: RetryStrategy::NoRetry,
            max_retries: 0,
            should_trip_breaker: false,
            fallback_action: None,
            user_notification_required: true,
            severity: Severity::Low,
            details: None,
        },
        AnamnesisError::Validation { .. } | AnamnesisError::TypeCoercion { .. } => ErrorClassification {
            category: ErrorCategory::ClientError,
            is_retryable: false,
            retry_strategy: RetryStrategy::NoRetry,
            max_retries: 0,
            should_trip_breaker: false,
            fallback_action: None,
            user_notification_required: true,
            severity: Severity::Medium,
            details: None,
        },
        AnamnesisError::Configuration(_) => ErrorClassification {
            category: ErrorCategory::Permanent,
            is_retryable: false,
            retry_strategy: RetryStrategy::NoRetry,
            max_retries: 0,
            should_trip_breaker: false,
            fallback_action: None,
            user_notification_required: true,
            severity: Severity::Critical,
            details: None,
        },
        AnamnesisError::UnsupportedLanguage(_) | AnamnesisError::InvalidQuery(_) | AnamnesisError::Parse { .. } | AnamnesisError::InvalidOperation(_) => {
            ErrorClassification {
                category: ErrorCategory::ClientError,
                is_retryable: false,
                retry_strategy: RetryStrategy::NoRetry,
                max_retries: 0,
                should_trip_breaker: false,
                fallback_action: None,
                user_notification_required: true,
                severity: Severity::Low,
                details: None,
            }
        }
        AnamnesisError::Serialization(_) => ErrorClassification {
            category: ErrorCategory::SystemError,
            is_retryable: false,
            retry_strategy: RetryStrategy::NoRetry,
            max_retries: 0,
            should_trip_breaker: false,
            fallback_action: None,
            user_notification_required: false,
            severity: Severity::Medium,
            details: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_breaker_error_is_retryable_and_high_severity() {
        let err = AnamnesisError::CircuitBreaker { state: "OPEN".into(), failures: 5, success_rate: 0.0, stats: Default::default() };
        let c = classify_error(&err);
        assert_eq!(c.category, ErrorCategory::CircuitBreaker);
        assert!(c.is_retryable);
        assert_eq!(c.retry_strategy, RetryStrategy::Delayed);
        assert_eq!(c.severity, Severity::High);
    }

    #[test]
    fn not_found_is_not_retryable_and_low_severity() {
        let err = AnamnesisError::NotFound("concept_abc".into());
        let c = classify_error(&err);
        assert!(!c.is_retryable);
        assert_eq!(c.retry_strategy, RetryStrategy::NoRetry);
        assert_eq!(c.severity, Severity::Low);
    }

    #[test]
    fn configuration_error_is_fatal_and_critical() {
        let err = AnamnesisError::Configuration("bad batch_size".into());
        let c = classify_error(&err);
        assert!(!c.is_retryable);
        assert_eq!(c.severity, Severity::Critical);
    }

    #[test]
    fn validation_errors_are_never_retried() {
        let err = AnamnesisError::Validation { missing: vec!["name".into()] };
        assert!(!classify_error(&err).is_retryable);
    }

    #[test]
    fn severity_ordering_places_critical_above_low() {
        assert!(Severity::Critical > Severity::Low);
    }

    #[test]
    fn custom_pattern_is_checked_before_defaults() {
        let classifier = ErrorClassifier::new();
        classifier.add_pattern(ErrorPattern {
            code: Some("NOT_FOUND"),
            message_pattern: None,
            classification: ErrorClassification {
                category: ErrorCategory::Unknown,
                is_retryable: true,
                retry_strategy: RetryStrategy::Immediate,
                max_retries: 1,
                should_trip_breaker: false,
                fallback_action: None,
                user_notification_required: false,
                severity: Severity::Low,
                details: Some("overridden by a custom pattern".to_string()),
            },
        });

        let err = AnamnesisError::NotFound("concept_abc".into());
        let c = classifier.classify(&err);
        assert!(c.is_retryable);
        assert_eq!(c.retry_strategy, RetryStrategy::Immediate);
    }

    #[test]
    fn message_pattern_matches_against_the_rendered_error_text() {
        let classifier = ErrorClassifier::new();
        classifier.add_pattern(ErrorPattern {
            code: None,
            message_pattern: Some(Regex::new("timed? ?out").unwrap()),
            classification: ErrorClassification {
                category: ErrorCategory::Transient,
                is_retryable: true,
                retry_strategy: RetryStrategy::LinearBackoff,
                max_retries: 2,
                should_trip_breaker: false,
                fallback_action: None,
                user_notification_required: false,
                severity: Severity::Medium,
                details: None,
            },
        });

        let err = AnamnesisError::Storage("connection timed out".into());
        let c = classifier.classify(&err);
        assert_eq!(c.retry_strategy, RetryStrategy::LinearBackoff);
    }
}
