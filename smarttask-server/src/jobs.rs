//! The background jobs run by the server's [`Scheduler`](crate::scheduler::Scheduler).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use smarttask_proto::task::{NewTask, Task, TaskFilter};

use crate::scheduler::{Job, JobError};
use crate::store::TaskStore;

/// How far ahead the due-soon scan looks.
pub const DUE_SOON_WINDOW: Duration = Duration::hours(24);

/// Reports open tasks due within the next [`DUE_SOON_WINDOW`].
///
/// Observational only: it logs what it finds and changes nothing.
pub struct DueSoonScan {
    store: Arc<TaskStore>,
}

impl DueSoonScan {
    /// Creates the scan over `store`.
    #[must_use]
    pub const fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    /// Open tasks due after `now` and no later than `now + 24h`.
    pub async fn due_soon(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.store
            .list(&TaskFilter::default())
            .await
            .into_iter()
            .filter(|t| t.is_due_within(now, DUE_SOON_WINDOW))
            .collect()
    }
}

impl Job for DueSoonScan {
    fn name(&self) -> &'static str {
        "due-soon-scan"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<usize, JobError> {
        tracing::info!("checking for due tasks");
        let due = self.due_soon(now).await;
        for task in &due {
            tracing::debug!(task_id = %task.id, due_date = ?task.due_date, "task due soon");
        }
        if !due.is_empty() {
            tracing::info!(count = due.len(), "found tasks due soon");
        }
        Ok(due.len())
    }
}

/// Creates the next instance of every completed recurring task.
///
/// The completed source task is left untouched, so it still qualifies on the
/// next run: each run creates one more instance per completed recurring task
/// in the collection, whether or not one was created before.
pub struct RecurrenceJob {
    store: Arc<TaskStore>,
}

impl RecurrenceJob {
    /// Creates the job over `store`.
    #[must_use]
    pub const fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    /// Regenerates every completed recurring task as of `now`.
    ///
    /// Returns the new tasks. A source whose successor cannot be created
    /// is logged and skipped; the remaining sources are still processed.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Regeneration`] if any successor could not be
    /// created.
    pub async fn regenerate(&self, now: DateTime<Utc>) -> Result<Vec<Task>, JobError> {
        let sources: Vec<Task> = self
            .store
            .list(&TaskFilter {
                completed: Some(true),
                ..TaskFilter::default()
            })
            .await
            .into_iter()
            .filter(|t| t.recurrence.is_recurring())
            .collect();

        let mut created = Vec::with_capacity(sources.len());
        let mut failed = 0;
        for source in &sources {
            let Some(due_date) = source.recurrence.next_due(now) else {
                tracing::warn!(task_id = %source.id, "no next due date for recurring task");
                failed += 1;
                continue;
            };
            let next = NewTask {
                title: source.title.clone(),
                description: source.description.clone(),
                due_date: Some(due_date),
                priority: source.priority,
                recurrence: source.recurrence,
            };
            match self.store.create(next).await {
                Ok(task) => {
                    tracing::debug!(source_id = %source.id, task_id = %task.id, "recurring task created");
                    created.push(task);
                }
                Err(e) => {
                    tracing::warn!(source_id = %source.id, error = %e, "could not regenerate recurring task");
                    failed += 1;
                }
            }
        }

        tracing::info!(count = created.len(), "created recurring tasks");
        if failed > 0 {
            return Err(JobError::Regeneration {
                attempted: sources.len(),
                failed,
            });
        }
        Ok(created)
    }
}

impl Job for RecurrenceJob {
    fn name(&self) -> &'static str {
        "recurrence"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<usize, JobError> {
        tracing::info!("processing recurring tasks");
        self.regenerate(now).await.map(|created| created.len())
    }
}
