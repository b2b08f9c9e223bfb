use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded-parallelism dispatcher for post-processing tasks.
///
/// The coordinating loop never waits on a permit: each spawned task acquires
/// its own, and the permit is released when the task ends, however it ends.
/// Every task carries a label that comes back from `join` with its output, or
/// with `None` when the task panicked. `join` is the completion barrier.
pub struct ConcurrencyPool<L, T> {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<(L, Option<T>)>,
    sequential: bool,
    completed: Vec<(L, Option<T>)>,
}

/// Run `task` on its own tokio task so a panic surfaces as `None`.
async fn run_isolated<T, F>(task: F) -> Option<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    match tokio::spawn(task).await {
        Ok(output) => Some(output),
        Err(err) => {
            tracing::error!("Post-processing task panicked: {}", err);
            None
        }
    }
}

impl<L: Send + 'static, T: Send + 'static> ConcurrencyPool<L, T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
            tasks: JoinSet::new(),
            sequential: false,
            completed: Vec::new(),
        }
    }

    /// Await every dispatched task before returning from `dispatch`.
    pub fn sequential(capacity: usize) -> Self {
        Self {
            sequential: true,
            ..Self::new(capacity)
        }
    }

    pub async fn dispatch<F>(&mut self, label: L, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        if self.sequential {
            let output = run_isolated(task).await;
            self.completed.push((label, output));
            return;
        }

        let semaphore = self.semaphore.clone();
        self.tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                tracing::warn!("Post-processing task never got a permit");
                return (label, None);
            };
            (label, run_isolated(task).await)
        });
    }

    /// Wait for every dispatched task and return labels and outputs in completion order.
    pub async fn join(mut self) -> Vec<(L, Option<T>)> {
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(labelled) => self.completed.push(labelled),
                Err(err) => tracing::error!("Post-processing task was lost: {}", err),
            }
        }
        self.semaphore.close();
        self.completed
    }
}
