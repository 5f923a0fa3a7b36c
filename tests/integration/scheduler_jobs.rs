// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for the background jobs running under the scheduler.
//!
//! Time is paused, so a day of schedule passes instantly and the job runs
//! happen at exact offsets from the start.
//!
//! These tests validate:
//! - No job runs before its first full period has elapsed
//! - The daily recurrence job creates one pending copy per completed
//!   recurring task on every run
//! - Regenerated tasks reach the persistence backend
//! - Shutdown stops further runs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use smarttask_proto::task::{NewTask, Recurrence, Task, TaskFilter};
use smarttask_server::jobs::{DueSoonScan, RecurrenceJob};
use smarttask_server::persistence::MemoryPersistence;
use smarttask_server::scheduler::{Job, Scheduler};
use smarttask_server::store::TaskStore;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn completed_weekly(title: &str) -> Task {
    let mut task = Task::from_new(
        NewTask {
            recurrence: Recurrence::Weekly,
            ..NewTask::titled(title)
        },
        Utc::now() - chrono::Duration::days(7),
    );
    task.completed = true;
    task.completed_at = Some(Utc::now());
    task
}

fn open_store(tasks: Vec<Task>) -> (Arc<TaskStore>, Arc<MemoryPersistence>) {
    let backend = Arc::new(MemoryPersistence::with_tasks(tasks));
    let store = Arc::new(TaskStore::open(Arc::clone(&backend)));
    (store, backend)
}

async fn pending(store: &TaskStore) -> Vec<Task> {
    store
        .list(&TaskFilter {
            completed: Some(false),
            ..TaskFilter::default()
        })
        .await
}

#[tokio::test(start_paused = true)]
async fn recurrence_job_runs_daily_and_duplicates() {
    let source = completed_weekly("Water plants");
    let (store, backend) = open_store(vec![source.clone()]);

    let mut scheduler = Scheduler::new();
    scheduler.spawn(RecurrenceJob::new(Arc::clone(&store)), DAY);

    tokio::time::sleep(DAY - HOUR).await;
    assert_eq!(store.len().await, 1, "nothing runs before the first period");

    tokio::time::sleep(2 * HOUR).await;
    let after_first = pending(&store).await;
    assert_eq!(after_first.len(), 1);
    assert_eq!(after_first[0].title, "Water plants");
    assert_eq!(after_first[0].recurrence, Recurrence::Weekly);
    assert!(after_first[0].due_date.is_some());

    tokio::time::sleep(DAY).await;
    assert_eq!(pending(&store).await.len(), 2);
    assert_eq!(store.get(&source.id).await, Some(source));
    assert_eq!(backend.snapshot().map(|t| t.len()), Some(3));

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_regeneration() {
    let (store, _) = open_store(vec![completed_weekly("Backups")]);

    let mut scheduler = Scheduler::new();
    scheduler.spawn(RecurrenceJob::new(Arc::clone(&store)), DAY);
    scheduler.spawn(DueSoonScan::new(Arc::clone(&store)), HOUR);
    assert_eq!(scheduler.len(), 2);

    tokio::time::sleep(DAY + HOUR).await;
    assert_eq!(store.len().await, 2);

    scheduler.shutdown().await;
    tokio::time::sleep(3 * DAY).await;
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn due_soon_scan_counts_tasks_in_window() {
    let now = Utc::now();
    let due = |title: &str, hours: i64| {
        let mut task = Task::from_new(NewTask::titled(title), now);
        task.due_date = Some(now + chrono::Duration::hours(hours));
        task
    };
    let (store, _) = open_store(vec![due("tomorrow morning", 20), due("next week", 24 * 7)]);

    let scan = DueSoonScan::new(store);
    assert_eq!(scan.run(now).await, Ok(1));
}
