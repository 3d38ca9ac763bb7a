//! Bounded-concurrency worker pool
//!
//! Items are started in submission order, never more than `concurrency`
//! at once. A failing or panicking task is logged with its label and
//! counted; it never stops the pool or any other task. [`WorkerPool::run`]
//! returns only after every submitted task has finished, which is the
//! drain point for the caller.

use crate::errors::{AppError, AppResult, TaskError};
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Outcome counts for one drained pool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Highest number of tasks observed running at once
    pub max_in_flight: usize,
}

pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    /// `concurrency` of 1 processes items strictly one after another
    pub fn new(concurrency: usize) -> AppResult<Self> {
        if concurrency == 0 {
            return Err(AppError::Config(
                "worker pool concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self { concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `task` once per item and wait for all of them to finish
    pub async fn run<T, F, Fut>(&self, items: Vec<T>, task: F) -> PoolReport
    where
        T: Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let task = Arc::new(task);

        let mut report = PoolReport {
            submitted: items.len(),
            ..PoolReport::default()
        };
        info!(
            "Starting {} tasks with concurrency {}",
            report.submitted, self.concurrency
        );

        let mut handles = Vec::with_capacity(items.len());
        for item in items {
            // Waiting here keeps start order FIFO and bounds in-flight tasks
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Worker pool semaphore closed: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            let label = item.to_string();
            let task = Arc::clone(&task);
            let in_flight = Arc::clone(&in_flight);
            let max_in_flight = Arc::clone(&max_in_flight);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let _running = InFlight::enter(&in_flight, &max_in_flight);
                task(item).await
            });
            handles.push((label, handle));
        }

        for (label, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {
                    report.succeeded += 1;
                    debug!("{} finished", label);
                }
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!("Task failed: {}", e);
                }
                Err(e) => {
                    report.failed += 1;
                    let message = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        e.to_string()
                    };
                    let failure = TaskError::Panicked {
                        package: label,
                        message,
                    };
                    error!("Task join error: {}", failure);
                }
            }
        }

        report.max_in_flight = max_in_flight.load(Ordering::SeqCst);
        info!(
            "Pool drained: {} succeeded, {} failed of {}",
            report.succeeded, report.failed, report.submitted
        );
        report
    }
}

/// Counts a running task; released on drop so panics are accounted for too
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(in_flight: &'a AtomicUsize, max_in_flight: &AtomicUsize) -> Self {
        let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_in_flight.fetch_max(running, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
