//! Heavy-task scheduler (`spec.md` §4.1, §5 "Resource-Aware Scheduling").
//!
//! Bounds concurrent heavy analyses (embeddings batches, LLM calls) to the
//! capability-derived budget and enforces a hard wall-clock timeout per
//! task, surfacing both as typed `SchedulerError`s rather than letting a
//! stuck call hang the whole pipeline.

use manuscript_types::{Result, SchedulerError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

pub struct HeavyTaskScheduler {
    semaphore: Arc<Semaphore>,
    task_timeout: Duration,
}

impl HeavyTaskScheduler {
    pub fn new(concurrency_limit: usize, task_timeout: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
            task_timeout,
        }
    }

    pub fn with_concurrency(mut self, concurrency_limit: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(concurrency_limit.max(1)));
        self
    }

    /// Run `task` once a permit is available, bounded by the configured
    /// timeout. A closed semaphore (scheduler shut down mid-run) and an
    /// elapsed timeout both map to `SchedulerError` rather than panicking.
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| SchedulerError::Rejected(e.to_string()))?;

        let outcome = timeout(self.task_timeout, task).await;
        drop(permit);

        match outcome {
            Ok(result) => result,
            Err(_) => Err(SchedulerError::Timeout(format!(
                "heavy task exceeded {:?}",
                self.task_timeout
            ))
            .into()),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_types::ManuscriptError;

    #[tokio::test]
    async fn runs_a_quick_task_successfully() {
        let scheduler = HeavyTaskScheduler::new(2, Duration::from_secs(1));
        let result = scheduler.run(async { Ok::<_, ManuscriptError>(42) }).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn times_out_a_slow_task() {
        let scheduler = HeavyTaskScheduler::new(1, Duration::from_millis(10));
        let result = scheduler
            .run(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, ManuscriptError>(())
            })
            .await;
        assert!(matches!(result, Err(ManuscriptError::Scheduler(SchedulerError::Timeout(_)))));
    }

    #[tokio::test]
    async fn releases_permit_after_completion() {
        let scheduler = HeavyTaskScheduler::new(1, Duration::from_secs(1));
        assert_eq!(scheduler.available_permits(), 1);
        scheduler.run(async { Ok::<_, ManuscriptError>(()) }).await.unwrap();
        assert_eq!(scheduler.available_permits(), 1);
    }
}
