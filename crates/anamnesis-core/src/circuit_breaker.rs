// ABOUTME: CLOSED/OPEN/HALF_OPEN circuit breaker guarding flaky downstream calls.
// ABOUTME: Grounded on original_source mcp_server/server.py's CircuitBreakerError handling.

use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

use crate::error::AnamnesisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CircuitBreakerStats {
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub transitions: u64,
}

impl CircuitBreakerStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successes as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before tripping from CLOSED to OPEN.
    pub failure_threshold: u32,
    /// How long the breaker stays OPEN before allowing a single HALF_OPEN probe.
    pub recovery_timeout_ms: u64,
    /// End-to-end budget for the primary operation; exceeding it counts as a failure.
    pub request_timeout_ms: u64,
    /// Window over which statistics are considered current (reporting only; the
    /// breaker's trip decision itself uses consecutive failures, not a rolling count).
    pub monitoring_window_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            request_timeout_ms: 30_000,
            monitoring_window_ms: 300_000,
        }
    }
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    stats: CircuitBreakerStats,
}

/// A per-dependency circuit breaker. `call`/`call_async` wrap the guarded operation;
/// callers never need to check state manually.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner { state: CircuitState::Closed, consecutive_failures: 0, opened_at: None, stats: CircuitBreakerStats::default() }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.refresh_state();
        self.inner.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        self.inner.lock().stats
    }

    /// Transition OPEN -> HALF_OPEN once `recovery_timeout_ms` has elapsed. Called on
    /// every state read so an idle breaker doesn't need a background timer.
    fn refresh_state(&self) {
        let mut guard = self.inner.lock();
        if guard.state == CircuitState::Open {
            if let Some(opened_at) = guard.opened_at {
                if opened_at.elapsed() >= Duration::from_millis(self.config.recovery_timeout_ms) {
                    guard.state = CircuitState::HalfOpen;
                    guard.stats.transitions += 1;
                }
            }
        }
    }

    fn breaker_error(&self, guard: &Inner) -> AnamnesisError {
        AnamnesisError::CircuitBreaker {
            state: guard.state.to_string(),
            failures: guard.consecutive_failures,
            success_rate: guard.stats.success_rate(),
            stats: guard.stats,
        }
    }

    fn before_call(&self) -> Result<(), AnamnesisError> {
        self.refresh_state();
        let guard = self.inner.lock();
        if guard.state == CircuitState::Open {
            return Err(self.breaker_error(&guard));
        }
        Ok(())
    }

    fn on_success(&self) {
        let mut guard = self.inner.lock();
        guard.stats.total_requests += 1;
        guard.stats.successes += 1;
        match guard.state {
            CircuitState::HalfOpen => {
                guard.state = CircuitState::Closed;
                guard.consecutive_failures = 0;
                guard.opened_at = None;
                guard.stats.transitions += 1;
            }
            CircuitState::Closed => {
                guard.consecutive_failures = 0;
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut guard = self.inner.lock();
        guard.stats.total_requests += 1;
        guard.stats.failures += 1;
        match guard.state {
            CircuitState::HalfOpen => {
                guard.state = CircuitState::Open;
                guard.opened_at = Some(Instant::now());
                guard.stats.transitions += 1;
            }
            CircuitState::Closed => {
                guard.consecutive_failures += 1;
                if guard.consecutive_failures >= self.config.failure_threshold {
                    guard.state = CircuitState::Open;
                    guard.opened_at = Some(Instant::now());
                    guard.stats.transitions += 1;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Run a synchronous fallible operation through the breaker. `fallback`, if
    /// given, is invoked both when the breaker rejects the call while OPEN and
    /// when the primary operation itself fails — it never sees the original error,
    /// only that a fallback is needed, matching the value-shaped fallback contract.
    pub fn call<T, E, F>(&self, f: F, fallback: Option<&dyn Fn() -> T>) -> Result<T, AnamnesisError>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Err(open_err) = self.before_call() {
            return fallback.map(|fb| Ok(fb())).unwrap_or(Err(open_err));
        }
        match f() {
            Ok(v) => {
                self.on_success();
                Ok(v)
            }
            Err(_) => {
                self.on_failure();
                let guard = self.inner.lock();
                let err = self.breaker_error(&guard);
                drop(guard);
                fallback.map(|fb| Ok(fb())).unwrap_or(Err(err))
            }
        }
    }

    /// Run an async fallible operation through the breaker, enforcing
    /// `request_timeout_ms` end-to-end; a timeout counts as a failure.
    pub async fn call_async<T, E, F, Fut>(&self, f: F, fallback: Option<&(dyn Fn() -> T + Sync)>) -> Result<T, AnamnesisError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if let Err(open_err) = self.before_call() {
            return fallback.map(|fb| Ok(fb())).unwrap_or(Err(open_err));
        }
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        match tokio::time::timeout(timeout, f()).await {
            Ok(Ok(v)) => {
                self.on_success();
                Ok(v)
            }
            Ok(Err(_)) | Err(_) => {
                self.on_failure();
                let guard = self.inner.lock();
                let err = self.breaker_error(&guard);
                drop(guard);
                fallback.map(|fb| Ok(fb())).unwrap_or(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", CircuitBreakerConfig { failure_threshold: 2, recovery_timeout_ms: 10, ..CircuitBreakerConfig::default() })
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let cb = breaker();
        for _ in 0..2 {
            let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom"), None);
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn open_breaker_rejects_calls_without_invoking_closure() {
        let cb = breaker();
        for _ in 0..2 {
            let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom"), None);
        }
        let mut invoked = false;
        let result = cb.call::<(), _, _>(
            || {
                invoked = true;
                Ok::<(), &str>(())
            },
            None,
        );
        assert!(result.is_err());
        assert!(!invoked);
    }

    #[test]
    fn half_open_probe_single_success_closes_breaker() {
        let cb = breaker();
        for _ in 0..2 {
            let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom"), None);
        }
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let result = cb.call::<(), &str, _>(|| Ok(()), None);
        assert!(result.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens_breaker() {
        let cb = breaker();
        for _ in 0..2 {
            let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom"), None);
        }
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom again"), None);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn successful_calls_reset_failure_count_while_closed() {
        let cb = breaker();
        let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom"), None);
        let _ = cb.call::<(), &str, _>(|| Ok(()), None);
        let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom"), None);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn open_breaker_invokes_fallback_instead_of_erroring() {
        let cb = breaker();
        for _ in 0..2 {
            let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom"), None);
        }
        let fallback = || "degraded".to_string();
        let result = cb.call::<String, &str, _>(|| Ok("primary".to_string()), Some(&fallback));
        assert_eq!(result.unwrap(), "degraded");
    }

    #[test]
    fn primary_failure_invokes_fallback() {
        let cb = breaker();
        let fallback = || "degraded".to_string();
        let result = cb.call::<String, &str, _>(|| Err("boom"), Some(&fallback));
        assert_eq!(result.unwrap(), "degraded");
    }

    #[test]
    fn stats_track_totals_and_transitions() {
        let cb = breaker();
        let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom"), None);
        let _ = cb.call::<(), _, _>(|| Err::<(), _>("boom"), None);
        let stats = cb.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.transitions, 1);
    }

    #[tokio::test]
    async fn async_call_times_out_and_counts_as_failure() {
        let cb = CircuitBreaker::new("test-async", CircuitBreakerConfig { failure_threshold: 1, request_timeout_ms: 10, ..CircuitBreakerConfig::default() });
        let result = cb
            .call_async::<(), &str, _, _>(
                || async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(())
                },
                None,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
