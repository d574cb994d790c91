//! Inventory HTTP API.
//!
//! JSON over axum, backed by the SQLite [`InventoryStore`]. List endpoints
//! go through the same [`ListView`](infra_console_core::view::ListView)
//! pipeline as the CLI, so rankings and empty states match.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/services` | Filtered, ranked or sorted service list |
//! | `POST` | `/api/services` | Create a service |
//! | `GET` `PUT` `DELETE` | `/api/services/{id}` | Read, update, delete |
//! | `POST` | `/api/services/bulk` | Bulk delete or move to group |
//! | `GET`  | `/api/groups` | Filtered group list |
//! | `POST` | `/api/groups` | Create a group |
//! | `GET` `PUT` `DELETE` | `/api/groups/{id}` | Read, update, delete |
//! | `GET`  | `/api/groups/{id}/services` | Member services |
//! | `GET`  | `/api/stats` | Totals and breakdowns |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "conflict", "message": "a group named 'edge' already exists" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `internal` (500).

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use infra_console_core::filter::FilterCriteria;
use infra_console_core::models::{
    Group, GroupPatch, NewGroup, NewService, Record, RecordKind, Service, ServicePatch,
};
use infra_console_core::selection::BulkOperation;
use infra_console_core::store::{BulkOutcome, InventoryStore, StoreError};
use infra_console_core::view::EmptyState;

use crate::config::Config;
use crate::db;
use crate::listing::{self, ListOptions};
use crate::migrate;
use crate::sqlite_store::SqliteStore;
use crate::stats::{self, InventoryStats};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InventoryStore>,
    pub config: Arc<Config>,
}

/// Open the database, apply migrations and serve until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let state = AppState {
        store: Arc::new(SqliteStore::new(pool)),
        config: Arc::new(config.clone()),
    };

    println!("Inventory API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// All routes over `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/services",
            get(handle_list_services).post(handle_create_service),
        )
        .route("/api/services/bulk", post(handle_bulk))
        .route(
            "/api/services/{id}",
            get(handle_get_service)
                .put(handle_update_service)
                .delete(handle_delete_service),
        )
        .route(
            "/api/groups",
            get(handle_list_groups).post(handle_create_group),
        )
        .route(
            "/api/groups/{id}",
            get(handle_get_group)
                .put(handle_update_group)
                .delete(handle_delete_group),
        )
        .route("/api/groups/{id}/services", get(handle_group_services))
        .route("/api/stats", get(handle_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "conflict".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => not_found(err.to_string()),
            StoreError::Conflict(_) => conflict(err.to_string()),
            StoreError::Validation(_) => bad_request(err.to_string()),
            StoreError::Backend(e) => {
                tracing::error!(error = %e, "store backend failure");
                internal("internal storage error")
            }
        }
    }
}

type ApiResult<T> = Result<T, AppError>;

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ List endpoints ============

/// Query parameters shared by both list endpoints. Service-only fields are
/// ignored for groups.
#[derive(Debug, Default, Deserialize)]
struct ListParams {
    q: Option<String>,
    category: Option<String>,
    group: Option<String>,
    vlan: Option<String>,
    ip: Option<String>,
    domain: Option<String>,
    ports: Option<String>,
    sort: Option<String>,
    dir: Option<String>,
}

impl ListParams {
    fn into_options(self, kind: RecordKind) -> ApiResult<ListOptions> {
        let descending = listing::is_descending(self.dir.as_deref());
        let criteria = match kind {
            RecordKind::Service => {
                let category = match self.category.as_deref().map(str::trim) {
                    None | Some("") => None,
                    Some(raw) => Some(
                        listing::parse_category(raw)
                            .ok_or_else(|| bad_request(format!("unknown category: {}", raw)))?,
                    ),
                };
                FilterCriteria {
                    query: self.q,
                    category,
                    group_id: self.group,
                    vlan: self.vlan,
                    ip: self.ip,
                    domain: self.domain,
                    ports: self.ports,
                }
            }
            RecordKind::Group => FilterCriteria {
                query: self.q,
                ..FilterCriteria::default()
            },
        };
        Ok(ListOptions {
            criteria,
            sort: self.sort,
            descending,
        })
    }
}

#[derive(Serialize)]
struct ListItem {
    #[serde(flatten)]
    record: Record,
    /// Relevance when a query is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<u32>,
}

#[derive(Serialize)]
struct ListResponse {
    items: Vec<ListItem>,
    total: usize,
    empty_state: Option<EmptyState>,
}

async fn list_kind(state: &AppState, kind: RecordKind, params: ListParams) -> ApiResult<ListResponse> {
    let options = params.into_options(kind)?;
    let records = state.store.list_records(kind).await?;
    let view = listing::build_view(
        kind,
        records,
        &options,
        listing::headless_context(&state.config),
    )
    .map_err(|e| bad_request(e.to_string()))?;

    let items = view
        .rendered()
        .iter()
        .enumerate()
        .map(|(row, record)| ListItem {
            record: record.clone(),
            score: view.score(row),
        })
        .collect();

    Ok(ListResponse {
        items,
        total: view.rendered().len(),
        empty_state: view.empty_state(),
    })
}

async fn handle_list_services(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>> {
    Ok(Json(list_kind(&state, RecordKind::Service, params).await?))
}

async fn handle_list_groups(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>> {
    Ok(Json(list_kind(&state, RecordKind::Group, params).await?))
}

// ============ Services ============

async fn handle_create_service(
    State(state): State<AppState>,
    Json(input): Json<NewService>,
) -> ApiResult<(StatusCode, Json<Service>)> {
    let service = state.store.create_service(input).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

async fn handle_get_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Service>> {
    Ok(Json(state.store.get_service(&id).await?))
}

async fn handle_update_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ServicePatch>,
) -> ApiResult<Json<Service>> {
    Ok(Json(state.store.update_service(&id, patch).await?))
}

async fn handle_delete_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_service(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct BulkRequest {
    operation: BulkOperation,
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    target_group_id: Option<String>,
}

async fn handle_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkRequest>,
) -> ApiResult<Json<BulkOutcome>> {
    if req.ids.is_empty() {
        return Err(bad_request("ids must not be empty"));
    }
    let target = req
        .target_group_id
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let outcome = state
        .store
        .execute_bulk(req.operation, &req.ids, target)
        .await?;
    Ok(Json(outcome))
}

// ============ Groups ============

async fn handle_create_group(
    State(state): State<AppState>,
    Json(input): Json<NewGroup>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    let group = state.store.create_group(input).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn handle_get_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Group>> {
    Ok(Json(state.store.get_group(&id).await?))
}

async fn handle_update_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<GroupPatch>,
) -> ApiResult<Json<Group>> {
    Ok(Json(state.store.update_group(&id, patch).await?))
}

async fn handle_delete_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_group(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_group_services(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Service>>> {
    Ok(Json(state.store.group_services(&id).await?))
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> ApiResult<Json<InventoryStats>> {
    Ok(Json(stats::compute(state.store.as_ref()).await?))
}
