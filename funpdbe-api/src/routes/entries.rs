//! Entry REST API Routes
//!
//! Reads are public. Writes require a caller who belongs to the group named
//! after the resource; the optional auth middleware must wrap this router.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use funpdbe_core::EntryRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::middleware::Caller;
use crate::services::DepositionService;

// ============================================================================
// TYPES
// ============================================================================

/// Confirmation returned by a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeleteResponse {
    pub message: String,
    /// Number of entry trees removed
    pub deleted: u64,
}

// ============================================================================
// SHARED STATE
// ============================================================================

#[derive(Clone)]
pub struct EntryState {
    pub service: Arc<DepositionService>,
}

impl EntryState {
    pub fn new(service: Arc<DepositionService>) -> Self {
        Self { service }
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /entries/ - Every entry
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/entries/",
    tag = "Entries",
    responses(
        (status = 200, description = "All entries", body = Vec<EntryRecord>),
        (status = 404, description = "No entries", body = crate::error::ApiError),
    ),
))]
pub async fn list_entries(State(state): State<Arc<EntryState>>) -> ApiResult<Json<Vec<EntryRecord>>> {
    Ok(Json(state.service.list_all().await?))
}

/// GET /entries/resource/{resource}/ - Entries of one resource
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/entries/resource/{resource}/",
    tag = "Entries",
    params(("resource" = String, Path, description = "Data resource name")),
    responses(
        (status = 200, description = "Entries of the resource", body = Vec<EntryRecord>),
        (status = 400, description = "Invalid resource", body = crate::error::ApiError),
        (status = 404, description = "No entries", body = crate::error::ApiError),
    ),
))]
pub async fn list_by_resource(
    State(state): State<Arc<EntryState>>,
    Path(resource): Path<String>,
) -> ApiResult<Json<Vec<EntryRecord>>> {
    Ok(Json(state.service.by_resource(&resource).await?))
}

/// GET /entries/resource/{resource}/{pdb_id}/ - One structure in one resource
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/entries/resource/{resource}/{pdb_id}/",
    tag = "Entries",
    params(
        ("resource" = String, Path, description = "Data resource name"),
        ("pdb_id" = String, Path, description = "PDB identifier, case-insensitive"),
    ),
    responses(
        (status = 200, description = "Matching entries", body = Vec<EntryRecord>),
        (status = 400, description = "Invalid resource or PDB id", body = crate::error::ApiError),
        (status = 404, description = "No entries", body = crate::error::ApiError),
    ),
))]
pub async fn get_by_resource_and_pdb(
    State(state): State<Arc<EntryState>>,
    Path((resource, pdb_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<EntryRecord>>> {
    Ok(Json(
        state
            .service
            .by_resource_and_pdb(&resource, &pdb_id)
            .await?,
    ))
}

/// GET /entries/pdb/{pdb_id}/ - One structure across resources
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/entries/pdb/{pdb_id}/",
    tag = "Entries",
    params(("pdb_id" = String, Path, description = "PDB identifier, case-insensitive")),
    responses(
        (status = 200, description = "Matching entries", body = Vec<EntryRecord>),
        (status = 400, description = "Invalid PDB id", body = crate::error::ApiError),
        (status = 404, description = "No entries", body = crate::error::ApiError),
    ),
))]
pub async fn list_by_pdb(
    State(state): State<Arc<EntryState>>,
    Path(pdb_id): Path<String>,
) -> ApiResult<Json<Vec<EntryRecord>>> {
    Ok(Json(state.service.by_pdb(&pdb_id).await?))
}

/// POST /entries/resource/{resource}/ - Deposit a new entry
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/entries/resource/{resource}/",
    tag = "Entries",
    params(("resource" = String, Path, description = "Data resource name")),
    request_body = funpdbe_core::EntryDocument,
    responses(
        (status = 201, description = "Entry created", body = EntryRecord),
        (status = 400, description = "Invalid path, document or duplicate entry", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 403, description = "Caller may not write this resource", body = crate::error::ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = [])),
))]
pub async fn create_entry(
    State(state): State<Arc<EntryState>>,
    caller: Caller,
    Path(resource): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let record = state
        .service
        .create(caller.principal(), &resource, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /entries/resource/{resource}/{pdb_id}/ - Replace an existing entry
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/entries/resource/{resource}/{pdb_id}/",
    tag = "Entries",
    params(
        ("resource" = String, Path, description = "Data resource name"),
        ("pdb_id" = String, Path, description = "PDB identifier, case-insensitive"),
    ),
    request_body = funpdbe_core::EntryDocument,
    responses(
        (status = 201, description = "Entry replaced", body = EntryRecord),
        (status = 400, description = "Invalid path or document", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 403, description = "Caller may not write this resource", body = crate::error::ApiError),
        (status = 404, description = "Nothing to replace", body = crate::error::ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = [])),
))]
pub async fn replace_entry(
    State(state): State<Arc<EntryState>>,
    caller: Caller,
    Path((resource, pdb_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let record = state
        .service
        .replace(caller.principal(), &resource, &pdb_id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// DELETE /entries/resource/{resource}/{pdb_id}/ - Remove an entry
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/entries/resource/{resource}/{pdb_id}/",
    tag = "Entries",
    params(
        ("resource" = String, Path, description = "Data resource name"),
        ("pdb_id" = String, Path, description = "PDB identifier, case-insensitive"),
    ),
    responses(
        (status = 301, description = "Entry deleted", body = DeleteResponse),
        (status = 400, description = "Invalid resource or PDB id", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 403, description = "Caller may not write this resource", body = crate::error::ApiError),
        (status = 404, description = "No entries", body = crate::error::ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = [])),
))]
pub async fn delete_entry(
    State(state): State<Arc<EntryState>>,
    caller: Caller,
    Path((resource, pdb_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state
        .service
        .delete(caller.principal(), &resource, &pdb_id)
        .await?;
    let response = DeleteResponse {
        message: format!(
            "Deleted {} from {}",
            pdb_id.to_ascii_lowercase(),
            resource
        ),
        deleted,
    };
    Ok((StatusCode::MOVED_PERMANENTLY, Json(response)))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the entries router. Paths are absolute.
pub fn create_router(service: Arc<DepositionService>) -> Router {
    let state = Arc::new(EntryState::new(service));

    Router::new()
        .route("/entries/", get(list_entries))
        .route(
            "/entries/resource/:resource/",
            get(list_by_resource).post(create_entry),
        )
        .route(
            "/entries/resource/:resource/:pdb_id/",
            get(get_by_resource_and_pdb)
                .post(replace_entry)
                .delete(delete_entry),
        )
        .route("/entries/pdb/:pdb_id/", get(list_by_pdb))
        .with_state(state)
}
