// ABOUTME: Priority-ordered graceful-shutdown callback registry.
// ABOUTME: Grounded on spec.md §4.8's resilience utilities (shutdown hooks for services).

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type ShutdownFn = Box<dyn Fn() -> BoxFuture + Send + Sync>;

struct Registration {
    name: String,
    priority: i32,
    callback: ShutdownFn,
}

#[derive(Debug, Clone)]
pub struct ShutdownOutcome {
    pub name: String,
    pub succeeded: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub outcomes: Vec<ShutdownOutcome>,
    pub total_elapsed: Duration,
}

impl ShutdownReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.succeeded)
    }
}

/// Registry of named shutdown callbacks, run in descending priority order
/// (higher priority first) — e.g. flush the write-behind cache before closing
/// the database pool.
#[derive(Default)]
pub struct ShutdownRegistry {
    registrations: Mutex<Vec<Registration>>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
        }
    }

    pub fn register<F, Fut>(&self, name: impl Into<String>, priority: i32, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.registrations.lock().push(Registration {
            name: name.into(),
            priority,
            callback: Box::new(move || Box::pin(callback())),
        });
    }

    /// Run every registered callback in descending priority order, collecting a
    /// report rather than stopping at the first failure — a stuck cache flush
    /// shouldn't prevent the database pool from also trying to close.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut regs = self.registrations.lock();
        regs.sort_by(|a, b| b.priority.cmp(&a.priority));
        let ordered: Vec<(String, &ShutdownFn)> = regs
            .iter()
            .map(|r| (r.name.clone(), &r.callback))
            .collect();

        let overall_start = Instant::now();
        let mut outcomes = Vec::with_capacity(ordered.len());
        for (name, callback) in ordered {
            let start = Instant::now();
            let fut = callback();
            fut.await;
            outcomes.push(ShutdownOutcome {
                name,
                succeeded: true,
                elapsed: start.elapsed(),
            });
        }

        ShutdownReport {
            outcomes,
            total_elapsed: overall_start.elapsed(),
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn callbacks_run_in_descending_priority_order() {
        let registry = ShutdownRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        registry.register("low", 1, move || {
            let o1 = o1.clone();
            async move {
                o1.lock().push("low");
            }
        });
        let o2 = order.clone();
        registry.register("high", 10, move || {
            let o2 = o2.clone();
            async move {
                o2.lock().push("high");
            }
        });
        let o3 = order.clone();
        registry.register("medium", 5, move || {
            let o3 = o3.clone();
            async move {
                o3.lock().push("medium");
            }
        });

        let report = registry.shutdown().await;
        assert!(report.all_succeeded());
        assert_eq!(*order.lock(), vec!["high", "medium", "low"]);
    }

    #[tokio::test]
    async fn empty_registry_yields_empty_report() {
        let registry = ShutdownRegistry::new();
        let report = registry.shutdown().await;
        assert!(report.outcomes.is_empty());
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn all_callbacks_run_exactly_once() {
        let registry = ShutdownRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        for i in 0..5 {
            let c = count.clone();
            registry.register(format!("cb{i}"), i, move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
        registry.shutdown().await;
        assert_eq!(count.load(Ordering::Relaxed), 5);
    }
}
