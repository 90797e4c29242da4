//! Bounded task pool: at most `max_workers` tasks make progress at once and
//! results are drained by the single owner as they complete.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

pub struct TaskPool<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<T>,
    max_workers: usize,
}

impl<T: Send + 'static> TaskPool<T> {
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            tasks: JoinSet::new(),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Queue `task`. It starts immediately but waits for a worker permit
    /// before running its body.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            // The semaphore is never closed, so a permit always arrives.
            let _permit = permits.acquire_owned().await.ok();
            task.await
        });
    }

    /// Next finished task, in completion order. `None` once drained.
    pub async fn join_next(&mut self) -> Option<Result<T, JoinError>> {
        self.tasks.join_next().await
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
