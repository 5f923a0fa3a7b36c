// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::missing_docs_in_private_items
)]

//! End-to-end tests for the task REST API.
//!
//! Each test starts a real server on `127.0.0.1:0` and drives it over HTTP
//! with `reqwest`. File-backed tests keep the task collection in a
//! `tempfile` directory and reopen it to check what was persisted.
//!
//! These tests validate:
//! - The full create / read / update / toggle / delete lifecycle
//! - Validation errors are itemized and nothing is stored
//! - List filters, search and newest-first ordering
//! - Stats, suggestions and 404 handling
//! - A restart sees exactly what was written before it
//! - Date-only due dates are accepted and unreadable files are kept aside

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::{Value, json};
use smarttask_proto::api::{ApiResponse, Suggestions};
use smarttask_proto::task::{Priority, Recurrence, Task, TaskStats};
use smarttask_proto::validate;
use smarttask_server::api;
use smarttask_server::persistence::{JsonFile, MemoryPersistence, TaskPersistence};
use smarttask_server::store::TaskStore;

// =============================================================================
// Helpers
// =============================================================================

struct TestServer {
    base: String,
    client: reqwest::Client,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(backend: impl TaskPersistence + 'static) -> Self {
        let store = Arc::new(TaskStore::open(backend));
        let (addr, handle): (SocketAddr, _) = api::start_server("127.0.0.1:0", store)
            .await
            .expect("failed to start server");
        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _handle: handle,
        }
    }

    async fn empty() -> Self {
        Self::start(MemoryPersistence::with_tasks(Vec::new())).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn create(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/tasks"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn create_ok(&self, body: Value) -> Task {
        let resp = self.create(body).await;
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        let body: ApiResponse<Task> = resp.json().await.unwrap();
        assert!(body.success);
        body.data.unwrap()
    }

    async fn list(&self, query: &str) -> Vec<Task> {
        let body: ApiResponse<Vec<Task>> = self
            .client
            .get(self.url(&format!("/api/tasks{query}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body.data.unwrap()
    }
}

fn titles(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.title.as_str()).collect()
}

fn read_file(path: &Path) -> Vec<Task> {
    JsonFile::new(path).load().unwrap().unwrap()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn task_lifecycle_over_http() {
    let server = TestServer::empty().await;

    let created = server
        .create_ok(json!({
            "title": "Write report",
            "description": "Quarterly numbers",
            "priority": "high",
            "recurrence": "monthly",
            "due_date": "2030-01-15T09:00:00Z",
        }))
        .await;
    assert_eq!(created.title, "Write report");
    assert_eq!(created.priority, Priority::High);
    assert_eq!(created.recurrence, Recurrence::Monthly);
    assert!(!created.completed);
    assert_eq!(created.created_at, created.updated_at);

    // GET by id
    let fetched: ApiResponse<Task> = server
        .client
        .get(server.url(&format!("/api/tasks/{}", created.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched.data.as_ref(), Some(&created));

    // PUT keeps absent fields and ignores immutable ones
    let resp = server
        .client
        .put(server.url(&format!("/api/tasks/{}", created.id)))
        .json(&json!({"title": "Write final report", "id": "hijack"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let updated = resp.json::<ApiResponse<Task>>().await.unwrap().data.unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.title, "Write final report");
    assert_eq!(updated.description, "Quarterly numbers");
    assert_eq!(updated.priority, Priority::High);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);

    // PATCH toggle twice
    let toggle_url = server.url(&format!("/api/tasks/{}/toggle", created.id));
    let done: ApiResponse<Task> = server
        .client
        .patch(&toggle_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(done.message.as_deref(), Some("Task marked as completed"));
    let done = done.data.unwrap();
    assert!(done.completed);
    assert!(done.completed_at.is_some());

    let reopened: ApiResponse<Task> = server
        .client
        .patch(&toggle_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reopened.message.as_deref(), Some("Task marked as pending"));
    let reopened = reopened.data.unwrap();
    assert!(!reopened.completed);
    assert_eq!(reopened.completed_at, None);

    // DELETE then GET is 404
    let resp = server
        .client
        .delete(server.url(&format!("/api/tasks/{}", created.id)))
        .send()
        .await
        .unwrap();
    let body: ApiResponse<()> = resp.json().await.unwrap();
    assert!(body.success);
    assert_eq!(body.message.as_deref(), Some("Task deleted successfully"));

    let resp = server
        .client
        .get(server.url(&format!("/api/tasks/{}", created.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: ApiResponse<()> = resp.json().await.unwrap();
    assert_eq!(body.error.as_deref(), Some("Task not found"));
}

#[tokio::test]
async fn missing_task_is_404_on_every_id_route() {
    let server = TestServer::empty().await;
    let url = server.url("/api/tasks/does-not-exist");
    let requests = [
        server.client.get(&url),
        server.client.put(&url).json(&json!({"title": "x"})),
        server.client.delete(&url),
        server.client.patch(format!("{url}/toggle")),
        server.client.post(format!("{url}/predict-due-date")),
    ];
    for request in requests {
        let resp = request.send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        let body: ApiResponse<()> = resp.json().await.unwrap();
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Task not found"));
    }
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn invalid_create_lists_every_error_and_stores_nothing() {
    let server = TestServer::empty().await;
    let resp = server
        .create(json!({
            "title": "x".repeat(201),
            "description": "d".repeat(1001),
            "priority": "urgent",
            "recurrence": "hourly",
        }))
        .await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: ApiResponse<()> = resp.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(
        body.errors.unwrap(),
        vec![
            validate::TITLE_TOO_LONG,
            validate::DESCRIPTION_TOO_LONG,
            validate::INVALID_PRIORITY,
            validate::INVALID_RECURRENCE,
        ]
    );
    assert!(server.list("").await.is_empty());
}

#[tokio::test]
async fn missing_title_is_rejected() {
    let server = TestServer::empty().await;
    let resp = server.create(json!({"description": "no title"})).await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: ApiResponse<()> = resp.json().await.unwrap();
    assert_eq!(body.errors.unwrap(), vec![validate::TITLE_REQUIRED]);
}

#[tokio::test]
async fn update_with_null_title_is_rejected() {
    let server = TestServer::empty().await;
    let task = server.create_ok(json!({"title": "Keep me"})).await;
    let resp = server
        .client
        .put(server.url(&format!("/api/tasks/{}", task.id)))
        .json(&json!({"title": null}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(server.list("").await[0].title, "Keep me");
}

#[tokio::test]
async fn date_only_due_date_is_accepted() {
    let server = TestServer::empty().await;
    let task = server
        .create_ok(json!({"title": "Dentist", "due_date": "2030-03-01"}))
        .await;
    assert_eq!(
        task.due_date,
        Some(Utc.with_ymd_and_hms(2030, 3, 1, 0, 0, 0).unwrap())
    );

    let resp = server
        .client
        .put(server.url(&format!("/api/tasks/{}", task.id)))
        .json(&json!({"due_date": "2030-03-02T08:15"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let updated = resp.json::<ApiResponse<Task>>().await.unwrap().data.unwrap();
    assert_eq!(
        updated.due_date,
        Some(Utc.with_ymd_and_hms(2030, 3, 2, 8, 15, 0).unwrap())
    );
}

#[tokio::test]
async fn mistyped_field_is_bad_request() {
    let server = TestServer::empty().await;
    let resp = server
        .create(json!({"title": "Typed", "completed": "yes"}))
        .await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: ApiResponse<()> = resp.json().await.unwrap();
    assert!(!body.success);
    assert!(body.error.is_some());
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn list_filters_search_and_order() {
    let server = TestServer::empty().await;
    let groceries = server
        .create_ok(json!({"title": "Buy groceries", "priority": "low"}))
        .await;
    server
        .create_ok(json!({"title": "Fix login bug", "priority": "high", "description": "Users see a blank page"}))
        .await;
    server
        .create_ok(json!({"title": "Plan offsite", "priority": "high"}))
        .await;
    server
        .client
        .patch(server.url(&format!("/api/tasks/{}/toggle", groceries.id)))
        .send()
        .await
        .unwrap();

    let all = server.list("").await;
    assert_eq!(
        titles(&all),
        ["Plan offsite", "Fix login bug", "Buy groceries"]
    );

    assert_eq!(titles(&server.list("?completed=true").await), ["Buy groceries"]);
    assert_eq!(
        titles(&server.list("?completed=false").await),
        ["Plan offsite", "Fix login bug"]
    );
    assert_eq!(
        titles(&server.list("?priority=high&completed=false").await),
        ["Plan offsite", "Fix login bug"]
    );
    assert_eq!(titles(&server.list("?search=BLANK").await), ["Fix login bug"]);
    assert_eq!(server.list("?priority=&search=").await.len(), 3);

    assert_eq!(
        titles(&server.list("?completed=").await),
        ["Plan offsite", "Fix login bug"]
    );

    // An unknown priority is not an error; it just matches nothing.
    let resp = server
        .client
        .get(server.url("/api/tasks?priority=critical"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: ApiResponse<Vec<Task>> = resp.json().await.unwrap();
    assert!(body.success);
    assert_eq!(body.data, Some(Vec::new()));
}

#[tokio::test]
async fn stats_reflect_collection() {
    let now = Utc::now();
    let mut overdue = Task::from_new(
        smarttask_proto::task::NewTask::titled("Late"),
        now - Duration::days(3),
    );
    overdue.due_date = Some(now - Duration::days(1));
    let mut done = Task::from_new(
        smarttask_proto::task::NewTask::titled("Done"),
        now - Duration::days(3),
    );
    done.completed = true;
    let server = TestServer::start(MemoryPersistence::with_tasks(vec![overdue, done])).await;

    let body: ApiResponse<TaskStats> = server
        .client
        .get(server.url("/api/tasks-stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body.data.unwrap(),
        TaskStats {
            total: 2,
            completed: 1,
            pending: 1,
            overdue: 1,
        }
    );
}

#[tokio::test]
async fn suggest_builds_from_input() {
    let server = TestServer::empty().await;
    let body: ApiResponse<Suggestions> = server
        .client
        .post(server.url("/api/tasks/suggest"))
        .json(&json!({"input": "  prepare quarterly budget review  "}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let suggestions = body.data.unwrap();
    assert_eq!(suggestions.titles[0], "Complete prepare task");
    assert_eq!(suggestions.titles[2], "Work on prepare quarterly");
    assert_eq!(
        suggestions.tags,
        ["prepare", "quarterly", "budget", "review"]
    );

    let resp = server
        .client
        .post(server.url("/api/tasks/suggest"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn fresh_data_file_is_seeded_with_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    let server = TestServer::start(JsonFile::new(&path)).await;

    let seeded = read_file(&path);
    assert_eq!(
        titles(&seeded),
        ["Complete project proposal", "Team meeting preparation"]
    );

    let found = server.list("?search=proposal").await;
    assert_eq!(titles(&found), ["Complete project proposal"]);
}

#[tokio::test]
async fn restart_sees_persisted_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");

    let first = TestServer::start(JsonFile::new(&path)).await;
    let created = first
        .create_ok(json!({"title": "Survive restart", "due_date": "2031-06-01T12:00:00Z"}))
        .await;
    let before = first.list("").await;
    assert_eq!(before.len(), 3);

    // A second server over the same file reloads it instead of seeding.
    let second = TestServer::start(JsonFile::new(&path)).await;
    let after = second.list("").await;
    assert_eq!(after, before);
    assert!(after.contains(&created));
    assert_eq!(read_file(&path).len(), 3);
}

#[tokio::test]
async fn corrupt_data_file_falls_back_to_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    std::fs::write(&path, "{ definitely not json").unwrap();

    let server = TestServer::start(JsonFile::new(&path)).await;
    assert_eq!(server.list("").await.len(), 2);
    assert_eq!(read_file(&path).len(), 2);

    // The unreadable original is kept next to the fresh file.
    let backup = dir.path().join("tasks.json.corrupt");
    assert_eq!(
        std::fs::read_to_string(backup).unwrap(),
        "{ definitely not json"
    );
}

#[tokio::test]
async fn hand_edited_dates_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    std::fs::write(
        &path,
        r#"[{"id": "dentist", "title": "Dentist", "due_date": "2030-03-01",
             "completed": true, "completed_at": "2030-02-28T17:00:00",
             "created_at": "2030-02-01T09:00:00Z", "updated_at": "2030-02-28T17:00:00Z"}]"#,
    )
    .unwrap();

    let server = TestServer::start(JsonFile::new(&path)).await;
    let tasks = server.list("").await;
    assert_eq!(titles(&tasks), ["Dentist"]);
    assert_eq!(
        tasks[0].due_date,
        Some(Utc.with_ymd_and_hms(2030, 3, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
        tasks[0].completed_at,
        Some(Utc.with_ymd_and_hms(2030, 2, 28, 17, 0, 0).unwrap())
    );
    assert!(!dir.path().join("tasks.json.corrupt").exists());
}
