//! HTTP surface: router, handlers, error mapping and server startup.
//!
//! Every handler answers with the [`ApiResponse`] envelope except
//! `GET /api/health`, which returns a bare [`HealthStatus`]. Store errors
//! are mapped onto status codes by [`ApiError`].

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{self, HeaderValue, InvalidHeaderValue};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::FutureExt;
use smarttask_proto::api::{
    ApiResponse, DueDatePrediction, HealthStatus, SERVICE_NAME, SuggestRequest, Suggestions,
    TaskPayload, TaskQuery,
};
use smarttask_proto::task::{Priority, Task, TaskFilter, TaskId, TaskStats};
use smarttask_proto::validate;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::predict;
use crate::store::{TaskError, TaskStore};
use crate::suggest;

/// Method and path of every route, in the order they are logged at startup.
pub const ROUTES: [(&str, &str); 10] = [
    ("GET", "/api/health"),
    ("GET", "/api/tasks"),
    ("GET", "/api/tasks/{id}"),
    ("POST", "/api/tasks"),
    ("PUT", "/api/tasks/{id}"),
    ("DELETE", "/api/tasks/{id}"),
    ("GET", "/api/tasks-stats"),
    ("POST", "/api/tasks/suggest"),
    ("POST", "/api/tasks/{id}/predict-due-date"),
    ("PATCH", "/api/tasks/{id}/toggle"),
];

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Shared state handed to every handler.
pub struct AppState {
    /// The task collection.
    pub store: Arc<TaskStore>,
    /// Value of the `Access-Control-Allow-Origin` header.
    allow_origin: HeaderValue,
}

impl AppState {
    /// Creates state over `store` that allows any CORS origin.
    #[must_use]
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            allow_origin: HeaderValue::from_static("*"),
        }
    }

    /// Restricts CORS to `origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if `origin` is not a valid header value.
    pub fn with_allow_origin(mut self, origin: &str) -> Result<Self, InvalidHeaderValue> {
        self.allow_origin = HeaderValue::from_str(origin)?;
        Ok(self)
    }
}

/// Errors a handler can answer with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Field rules were broken; every violation is reported.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// The request could not be understood.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The addressed task does not exist.
    #[error("task not found")]
    NotFound,
    /// Something failed on the server side; the detail is only logged.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Validation(errors) => Self::Validation(errors),
            TaskError::NotFound(_) => Self::NotFound,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status().is_server_error() {
            Self::Internal(rejection.body_text())
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, ApiResponse::<()>::invalid(errors)),
            Self::BadRequest(reason) => (StatusCode::BAD_REQUEST, ApiResponse::failure(reason)),
            Self::NotFound => (StatusCode::NOT_FOUND, ApiResponse::failure("Task not found")),
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::failure("Internal server error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks-stats", get(task_stats))
        .route("/api/tasks/suggest", post(suggest_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/tasks/{id}/predict-due-date", post(predict_due_date))
        .route("/api/tasks/{id}/toggle", patch(toggle_task))
        .fallback(route_not_found)
        .method_not_allowed_fallback(route_not_found)
        .layer(middleware::from_fn(catch_panic))
        .layer(middleware::from_fn(log_request))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), cors))
        .with_state(state)
}

/// Starts the server on `addr` over `store` and returns the bound address
/// and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
    store: Arc<TaskStore>,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    start_server_with_state(addr, Arc::new(AppState::new(store))).await
}

/// Starts the server with a pre-built [`AppState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<AppState>,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    start_server_with_shutdown(addr, state, CancellationToken::new()).await
}

/// Starts the server and stops it gracefully once `shutdown` is cancelled.
///
/// In-flight requests are allowed to finish before the join handle
/// completes.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_shutdown(
    addr: &str,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Starts a server in-process for testing, over an in-memory store holding
/// `tasks`.
///
/// Binds to `127.0.0.1:0` (OS-assigned port).
#[cfg(test)]
pub async fn start_test_server(tasks: Vec<Task>) -> (SocketAddr, Arc<TaskStore>) {
    use crate::persistence::MemoryPersistence;

    let store = Arc::new(TaskStore::open(MemoryPersistence::with_tasks(tasks)));
    let (addr, _handle) = start_server("127.0.0.1:0", Arc::clone(&store))
        .await
        .expect("failed to start test server");
    (addr, store)
}

/// Adds CORS headers to every response and answers preflight requests.
async fn cors(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        state.allow_origin.clone(),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    tracing::debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "request handled"
    );
    response
}

/// Turns a panicking handler into a 500 response.
async fn catch_panic(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            ApiError::Internal(detail).into_response()
        }
    }
}

async fn route_not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<()>>) {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure(format!("Route {target} not found"))),
    )
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        service: SERVICE_NAME.to_string(),
    })
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TaskQuery>, QueryRejection>,
) -> ApiResult<Vec<Task>> {
    let Query(query) = query?;
    let tasks = match task_filter(query) {
        Some(filter) => state.store.list(&filter).await,
        None => Vec::new(),
    };
    Ok(Json(ApiResponse::ok(tasks)))
}

async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Task> {
    let task = state
        .store
        .get(&TaskId::from(id))
        .await
        .ok_or(ApiError::NotFound)?;
    Ok(Json(ApiResponse::ok(task)))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TaskPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    let Json(payload) = body?;
    let input = validate::new_task(&payload).map_err(ApiError::Validation)?;
    let task = state.store.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(task))))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<TaskPayload>, JsonRejection>,
) -> ApiResult<Task> {
    let Json(payload) = body?;
    let patch = validate::task_patch(&payload).map_err(ApiError::Validation)?;
    let task = state.store.update(&TaskId::from(id), patch).await?;
    Ok(Json(ApiResponse::ok(task)))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.store.delete(&TaskId::from(id)).await?;
    Ok(Json(ApiResponse::message("Task deleted successfully")))
}

async fn task_stats(State(state): State<Arc<AppState>>) -> ApiResult<TaskStats> {
    Ok(Json(ApiResponse::ok(state.store.stats().await)))
}

async fn suggest_task(body: Result<Json<SuggestRequest>, JsonRejection>) -> ApiResult<Suggestions> {
    let Json(request) = body?;
    let input = request
        .input
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Input text is required".to_string()))?;
    Ok(Json(ApiResponse::ok(suggest::suggest(Some(input)))))
}

async fn predict_due_date(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<DueDatePrediction> {
    let task = state
        .store
        .get(&TaskId::from(id))
        .await
        .ok_or(ApiError::NotFound)?;
    let predicted_due_date = predict::predict(&task.title, &task.description, Utc::now());
    Ok(Json(ApiResponse::ok(DueDatePrediction {
        task_id: task.id,
        predicted_due_date,
        message: "Based on task content analysis".to_string(),
    })))
}

async fn toggle_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Task> {
    let task = state.store.toggle(&TaskId::from(id)).await?;
    let message = if task.completed {
        "Task marked as completed"
    } else {
        "Task marked as pending"
    };
    Ok(Json(ApiResponse::ok_with_message(task, message)))
}

/// Turns the raw list query into a filter.
///
/// A present `completed` selects completed tasks when it is exactly `true`
/// and pending ones for any other value, including an empty one. Empty
/// `priority` and `search` values are ignored. Returns `None` when the
/// priority names no known level, since such a filter matches nothing.
fn task_filter(query: TaskQuery) -> Option<TaskFilter> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

    let priority = match non_empty(query.priority) {
        Some(raw) => Some(raw.parse::<Priority>().ok()?),
        None => None,
    };

    Some(TaskFilter {
        completed: query.completed.map(|c| c == "true"),
        priority,
        search: non_empty(query.search),
    })
}
