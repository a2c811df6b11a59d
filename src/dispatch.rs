//! Task Dispatcher
//!
//! Every (scope, asset type) pair becomes a task on the tokio runtime. A
//! semaphore bounds how many run at once, and results are handed back in
//! completion order.

use crate::error::CountError;
use crate::provider::{AssetSource, Scope};
use crate::retry::{count_with_retry, RetryPolicy};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_CONCURRENCY: usize = 10;

/// One unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTask {
    pub scope: Scope,
    pub asset_type: String,
    /// Position of `asset_type` in the asset-type file
    pub type_index: usize,
}

/// Outcome of a finished task
#[derive(Debug, Clone)]
pub struct AssetCountResult {
    pub task: AssetTask,
    pub outcome: Result<usize, CountError>,
}

#[derive(Debug)]
pub enum TaskEvent {
    Counted(AssetCountResult),
    /// The task panicked; nothing was counted
    Failed { task: AssetTask, reason: String },
}

/// Cartesian product of scopes and asset types, scope-major
pub fn plan(scopes: &[Scope], asset_types: &[String]) -> Vec<AssetTask> {
    scopes
        .iter()
        .flat_map(|scope| {
            asset_types
                .iter()
                .enumerate()
                .map(move |(type_index, asset_type)| AssetTask {
                    scope: scope.clone(),
                    asset_type: asset_type.clone(),
                    type_index,
                })
        })
        .collect()
}

/// Bounded worker pool for counting tasks
#[derive(Debug, Clone)]
pub struct Dispatcher {
    concurrency: usize,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            concurrency: concurrency.max(1),
            retry,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run all tasks and feed each event to `on_event` as it completes.
    ///
    /// An error from `on_event` stops the run; tasks still in flight are
    /// aborted when the pool is dropped.
    pub async fn run<F>(
        &self,
        source: Arc<dyn AssetSource>,
        tasks: Vec<AssetTask>,
        mut on_event: F,
    ) -> anyhow::Result<()>
    where
        F: FnMut(TaskEvent) -> anyhow::Result<()>,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        tracing::info!(
            "Dispatching {} tasks with {} workers",
            tasks.len(),
            self.concurrency
        );

        for task in tasks {
            let source = Arc::clone(&source);
            let semaphore = Arc::clone(&semaphore);
            let policy = self.retry.clone();

            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return TaskEvent::Failed {
                            task,
                            reason: "worker pool closed".to_string(),
                        }
                    }
                };

                let attempt = AssertUnwindSafe(count_with_retry(
                    source.as_ref(),
                    &task.scope,
                    &task.asset_type,
                    &policy,
                ))
                .catch_unwind()
                .await;

                match attempt {
                    Ok(outcome) => TaskEvent::Counted(AssetCountResult { task, outcome }),
                    Err(panic) => TaskEvent::Failed {
                        task,
                        reason: panic_message(panic.as_ref()),
                    },
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            let event = match joined {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!("Counting task did not complete: {}", e);
                    continue;
                }
            };

            if let TaskEvent::Failed { task, reason } = &event {
                tracing::error!(
                    "Error processing {}/{}: {}",
                    task.scope,
                    task.asset_type,
                    reason
                );
            }

            on_event(event)?;
        }

        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
