//! JSON API over a shared [`Catalog`].
//!
//! The catalog sits behind one lock. Each handler runs its whole
//! read-modify-write under that lock on the blocking pool, since catalog
//! operations write files synchronously. Concurrent issues of the same book
//! or concurrent deletes rewriting the title file are therefore serialised.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::{
    access::AccessPolicy,
    catalog::{Catalog, CatalogSummary, DeleteOutcome},
    chat,
    error::{CatalogError, CatalogResult},
    files::HistoryEntry,
    record::{BookId, BookRecord, BookStatus},
};

/// Header carrying the admin password for privileged requests.
pub const ADMIN_HEADER: &str = "x-admin-password";

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Mutex<Catalog>>,
    pub access: Arc<dyn AccessPolicy>,
}

impl AppState {
    pub fn new(catalog: Catalog, access: impl AccessPolicy + 'static) -> Self {
        Self {
            catalog: Arc::new(Mutex::new(catalog)),
            access: Arc::new(access),
        }
    }

    /// Runs `op` on the blocking pool with the catalog locked for its whole
    /// duration.
    async fn with_catalog<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Catalog) -> CatalogResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let catalog = Arc::clone(&self.catalog);
        let outcome = tokio::task::spawn_blocking(move || {
            let mut catalog = catalog.blocking_lock();
            op(&mut catalog).map_err(ApiError::from)
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(err) => Err(ApiError::internal(&err.to_string())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/books", get(list_books))
        .route("/api/search", get(search_books))
        .route("/api/stats", get(stats))
        .route("/api/issue", post(issue_book))
        .route("/api/return", post(return_book))
        .route("/api/add", post(add_book))
        .route("/api/delete", post(delete_book))
        .route("/api/export", post(export_report))
        .route("/api/history", get(history))
        .route("/api/chat", post(chat_reply))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Response types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BookView {
    pub id: BookId,
    pub title: String,
    pub borrower: String,
    pub issued_at: String,
    pub status: BookStatus,
}

impl From<&BookRecord> for BookView {
    fn from(record: &BookRecord) -> Self {
        Self {
            id: record.id(),
            title: record.title().to_string(),
            borrower: record.borrower().to_string(),
            issued_at: record.issued_at().to_string(),
            status: record.status(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    matches: Vec<BookView>,
}

/// Outcome of a mutating request.
#[derive(Debug, Serialize)]
struct ActionResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<BookId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issued_at: Option<String>,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
            id: None,
            issued_at: None,
        }
    }

    fn failed(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: Some(code),
            id: None,
            issued_at: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
}

/// Error half of every handler: a status code plus a failed [`ActionResponse`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ActionResponse,
}

impl ApiError {
    fn missing(field: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ActionResponse::failed("invalid_input", format!("missing {field}")),
        }
    }

    fn unauthorized() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            body: ActionResponse::failed("unauthorized", "Unauthorized"),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ActionResponse::failed("invalid_input", message),
        }
    }

    fn internal(detail: &str) -> Self {
        error!(detail, "catalog task failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ActionResponse::failed("operation_failed", "operation failed"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection, "malformed request body");
        ApiError::invalid(rejection.body_text())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
            CatalogError::AlreadyIssued { .. }
            | CatalogError::NotIssued { .. }
            | CatalogError::CannotDeleteIssued { .. } => StatusCode::CONFLICT,
            CatalogError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            CatalogError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if err.is_storage() {
            error!(error = %err, "catalog operation failed");
        } else {
            warn!(code = err.code(), error = %err, "catalog operation rejected");
        }
        Self {
            status,
            body: ActionResponse::failed(err.code(), err.user_message()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Unwraps a JSON body, turning axum's rejection into a structured failure.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(ApiError::from)
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::missing(field))
}

/// Book id as clients send it: a JSON string or a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdField {
    Number(u64),
    Text(String),
}

fn required_id(value: Option<IdField>) -> Result<BookId, ApiError> {
    let raw = required(
        value.map(|field| match field {
            IdField::Number(n) => n.to_string(),
            IdField::Text(text) => text,
        }),
        "book_id",
    )?;
    Ok(Catalog::parse_id(&raw)?)
}

/// Delete confirmation: a boolean, or the `y`/`n` answer the browser client sends.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfirmField {
    Flag(bool),
    Answer(String),
}

fn confirmed(value: Option<ConfirmField>) -> Result<bool, ApiError> {
    match value {
        None => Ok(true),
        Some(ConfirmField::Flag(flag)) => Ok(flag),
        Some(ConfirmField::Answer(answer)) => match answer.trim().to_lowercase().as_str() {
            "y" | "yes" | "true" => Ok(true),
            "n" | "no" | "false" => Ok(false),
            _ => Err(ApiError::invalid("confirm must be y or n")),
        },
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListParams {
    sort: Option<String>,
}

async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<BookView>> {
    let sort_by_title = params.sort.as_deref() == Some("title");
    let books: Vec<BookView> = state
        .with_catalog(move |catalog| {
            Ok(catalog.list(sort_by_title).into_iter().map(BookView::from).collect())
        })
        .await?;
    Ok(Json(books))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search_books(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let matches = state
        .with_catalog(move |catalog| {
            Ok(catalog
                .search(&params.q)
                .records()
                .iter()
                .map(|record| BookView::from(*record))
                .collect())
        })
        .await?;
    Ok(Json(SearchResponse { matches }))
}

async fn stats(State(state): State<AppState>) -> ApiResult<CatalogSummary> {
    let summary = state.with_catalog(|catalog| Ok(catalog.summary())).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct IssueRequest {
    book_id: Option<IdField>,
    user_name: Option<String>,
}

async fn issue_book(
    State(state): State<AppState>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> ApiResult<ActionResponse> {
    let req = body(payload)?;
    let id = required_id(req.book_id)?;
    let user_name = required(req.user_name, "user_name")?;

    let issued_at = state
        .with_catalog(move |catalog| catalog.issue(id, &user_name))
        .await?;
    Ok(Json(ActionResponse {
        id: Some(id),
        issued_at: Some(issued_at),
        ..ActionResponse::ok("Book Issued")
    }))
}

#[derive(Debug, Deserialize)]
struct ReturnRequest {
    book_id: Option<IdField>,
}

async fn return_book(
    State(state): State<AppState>,
    payload: Result<Json<ReturnRequest>, JsonRejection>,
) -> ApiResult<ActionResponse> {
    let id = required_id(body(payload)?.book_id)?;

    state.with_catalog(move |catalog| catalog.return_book(id)).await?;
    Ok(Json(ActionResponse {
        id: Some(id),
        ..ActionResponse::ok("Book Returned")
    }))
}

#[derive(Debug, Deserialize)]
struct AddRequest {
    title: Option<String>,
}

async fn add_book(
    State(state): State<AppState>,
    payload: Result<Json<AddRequest>, JsonRejection>,
) -> ApiResult<ActionResponse> {
    let title = required(body(payload)?.title, "title")?;

    let id = state.with_catalog(move |catalog| catalog.add(&title)).await?;
    Ok(Json(ActionResponse {
        id: Some(id),
        ..ActionResponse::ok("Book Added")
    }))
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    book_id: Option<IdField>,
    confirm: Option<ConfirmField>,
}

async fn delete_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> ApiResult<ActionResponse> {
    let credential = headers.get(ADMIN_HEADER).and_then(|v| v.to_str().ok());
    if !state.access.is_privileged(credential) {
        return Err(ApiError::unauthorized());
    }
    let req = body(payload)?;
    let id = required_id(req.book_id)?;
    let confirm = confirmed(req.confirm)?;

    let response = match state.with_catalog(move |catalog| catalog.delete(id, confirm)).await? {
        DeleteOutcome::Deleted(_) => ActionResponse {
            id: Some(id),
            ..ActionResponse::ok("Book Deleted")
        },
        DeleteOutcome::Cancelled => ActionResponse {
            success: false,
            ..ActionResponse::ok("delete cancelled")
        },
    };
    Ok(Json(response))
}

async fn export_report(State(state): State<AppState>) -> ApiResult<ActionResponse> {
    let path = state.with_catalog(|catalog| catalog.export_report()).await?;
    Ok(Json(ActionResponse::ok(format!(
        "Report exported to {}",
        path.display()
    ))))
}

async fn history(State(state): State<AppState>) -> ApiResult<Vec<HistoryEntry>> {
    let entries = state.with_catalog(|catalog| catalog.history()).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

async fn chat_reply(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let message = body(payload)?.message;
    let response = state
        .with_catalog(move |catalog| Ok(chat::recommend(catalog, &message)))
        .await?;
    Ok(Json(ChatResponse { response }))
}
