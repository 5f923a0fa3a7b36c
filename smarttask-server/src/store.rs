//! In-memory task store backed by a whole-collection persistence target.
//!
//! The [`TaskStore`] owns the task collection for the lifetime of the
//! process. It is seeded once from its [`TaskPersistence`] backend (or with
//! sample tasks when nothing is stored) and rewrites the backend after every
//! mutation. A failed write is logged and swallowed: the in-memory change
//! stands and the caller still sees success.

use chrono::{DateTime, Duration, Utc};
use smarttask_proto::task::{
    NewTask, Priority, Recurrence, Task, TaskFilter, TaskId, TaskPatch, TaskStats,
};
use smarttask_proto::validate;
use tokio::sync::RwLock;

use crate::persistence::TaskPersistence;

/// Errors returned by store operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    /// The input broke one or more field rules.
    #[error("invalid task: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// No task has the given id.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

/// Thread-safe owner of the task collection.
///
/// Reads share a [`RwLock`] read guard. Each mutation holds the write guard
/// across both the in-memory change and the persistence write, so writes are
/// fully serialized.
pub struct TaskStore {
    /// Tasks in insertion order, newest first.
    tasks: RwLock<Vec<Task>>,
    backend: Box<dyn TaskPersistence>,
}

impl TaskStore {
    /// Opens the store, loading the collection from `backend`.
    ///
    /// When the backend holds nothing, the store starts with
    /// [`sample_tasks`] and writes them back. Data that cannot be read is
    /// first moved aside with [`TaskPersistence::set_aside`].
    pub fn open(backend: impl TaskPersistence + 'static) -> Self {
        let tasks = match backend.load() {
            Ok(Some(tasks)) => {
                tracing::info!(count = tasks.len(), "loaded tasks");
                tasks
            }
            Ok(None) => {
                tracing::info!("no stored tasks, seeding sample tasks");
                seed(&backend)
            }
            Err(e) => {
                tracing::error!(error = %e, "could not load stored tasks, seeding sample tasks");
                match backend.set_aside() {
                    Ok(backup) => {
                        if let Some(path) = backup {
                            tracing::warn!(backup = %path.display(), "unreadable task data moved aside");
                        }
                        seed(&backend)
                    }
                    Err(e) => {
                        // Leave the unreadable data in place until the next mutation.
                        tracing::error!(error = %e, "could not move unreadable task data aside");
                        sample_tasks(Utc::now())
                    }
                }
            }
        };

        Self {
            tasks: RwLock::new(tasks),
            backend: Box::new(backend),
        }
    }

    /// Returns the tasks passing `filter`, newest `created_at` first.
    ///
    /// The sort is stable: tasks created at the same instant keep their
    /// relative insertion order.
    pub async fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut matched: Vec<Task> = tasks
            .iter()
            .filter(|t| t.matches(filter))
            .cloned()
            .collect();
        drop(tasks);
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }

    /// Looks up a single task.
    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        let tasks = self.tasks.read().await;
        tasks.iter().find(|t| &t.id == id).cloned()
    }

    /// Number of tasks in the collection.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether the collection is empty.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Creates a task and persists the collection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Validation`] if the title is blank or too long.
    pub async fn create(&self, input: NewTask) -> Result<Task, TaskError> {
        if let Some(err) = validate::title_error(&input.title) {
            return Err(TaskError::Validation(vec![err.to_string()]));
        }

        let task = Task::from_new(input, Utc::now());
        let mut tasks = self.tasks.write().await;
        tasks.insert(0, task.clone());
        self.persist(&tasks);
        drop(tasks);

        tracing::debug!(task_id = %task.id, "task created");
        Ok(task)
    }

    /// Merges `patch` into a task and persists the collection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Validation`] if the patch carries an invalid
    /// title, or [`TaskError::NotFound`] if no task has this id.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, TaskError> {
        if let Some(err) = patch.title.as_deref().and_then(validate::title_error) {
            return Err(TaskError::Validation(vec![err.to_string()]));
        }
        let updated = self.modify(id, |_| patch).await?;
        tracing::debug!(task_id = %id, "task updated");
        Ok(updated)
    }

    /// Flips the completion flag of a task.
    ///
    /// Completing stamps `completed_at`; reopening clears it. The read and
    /// the write happen under one write guard.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if no task has this id.
    pub async fn toggle(&self, id: &TaskId) -> Result<Task, TaskError> {
        let toggled = self
            .modify(id, |current| TaskPatch {
                completed: Some(!current.completed),
                ..TaskPatch::default()
            })
            .await?;
        tracing::debug!(task_id = %id, completed = toggled.completed, "task toggled");
        Ok(toggled)
    }

    /// Builds a patch from the current task and applies it, persisting the
    /// collection while the write guard is held.
    async fn modify(
        &self,
        id: &TaskId,
        build: impl FnOnce(&Task) -> TaskPatch,
    ) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.iter_mut().find(|t| &t.id == id) else {
            return Err(TaskError::NotFound(id.clone()));
        };
        let patch = build(task);
        task.apply(patch, Utc::now());
        let updated = task.clone();
        self.persist(&tasks);
        drop(tasks);
        Ok(updated)
    }

    /// Removes a task permanently and persists the collection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if no task has this id.
    pub async fn delete(&self, id: &TaskId) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.write().await;
        let Some(index) = tasks.iter().position(|t| &t.id == id) else {
            return Err(TaskError::NotFound(id.clone()));
        };
        let removed = tasks.remove(index);
        self.persist(&tasks);
        drop(tasks);

        tracing::debug!(task_id = %id, "task deleted");
        Ok(removed)
    }

    /// Aggregate counts as of now.
    pub async fn stats(&self) -> TaskStats {
        self.stats_at(Utc::now()).await
    }

    /// Aggregate counts as of `now`.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> TaskStats {
        let tasks = self.tasks.read().await;
        TaskStats::compute(&tasks, now)
    }

    /// Writes the whole collection, logging instead of failing.
    fn persist(&self, tasks: &[Task]) {
        if let Err(e) = self.backend.save(tasks) {
            tracing::error!(
                error = %e,
                count = tasks.len(),
                "failed to persist tasks, change kept in memory only"
            );
        }
    }
}

/// The two tasks a fresh installation starts with.
#[must_use]
pub fn sample_tasks(now: DateTime<Utc>) -> Vec<Task> {
    let proposal = NewTask {
        title: "Complete project proposal".to_string(),
        description: "Finish the project proposal document".to_string(),
        due_date: Some(now + Duration::days(2)),
        priority: Priority::High,
        recurrence: Recurrence::None,
    };
    let meeting = NewTask {
        title: "Team meeting preparation".to_string(),
        description: "Prepare agenda for weekly meeting".to_string(),
        due_date: Some(now + Duration::days(1)),
        priority: Priority::Medium,
        recurrence: Recurrence::Weekly,
    };
    vec![Task::from_new(proposal, now), Task::from_new(meeting, now)]
}

fn seed(backend: &dyn TaskPersistence) -> Vec<Task> {
    let tasks = sample_tasks(Utc::now());
    if let Err(e) = backend.save(&tasks) {
        tracing::error!(error = %e, "failed to write sample tasks");
    }
    tasks
}
