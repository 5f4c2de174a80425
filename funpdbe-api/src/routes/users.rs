//! User REST API Routes
//!
//! Principals known to the membership directory. Public and read-only.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use funpdbe_core::MembershipDirectory;
use funpdbe_storage::DepositionStore;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::services::{get_user, list_users, UserSummary};

// ============================================================================
// SHARED STATE
// ============================================================================

#[derive(Clone)]
pub struct UserState {
    pub directory: Arc<dyn MembershipDirectory>,
    pub store: Arc<dyn DepositionStore>,
}

impl UserState {
    pub fn new(directory: Arc<dyn MembershipDirectory>, store: Arc<dyn DepositionStore>) -> Self {
        Self { directory, store }
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /users/ - Every principal with a membership
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/users/",
    tag = "Users",
    responses(
        (status = 200, description = "Known principals", body = Vec<UserSummary>),
    ),
))]
pub async fn list_users_handler(State(state): State<Arc<UserState>>) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = list_users(state.directory.as_ref(), state.store.as_ref()).await?;
    Ok(Json(users))
}

/// GET /users/{principal}/ - One principal
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/users/{principal}/",
    tag = "Users",
    params(("principal" = String, Path, description = "Principal id")),
    responses(
        (status = 200, description = "Principal details", body = UserSummary),
        (status = 404, description = "Unknown principal", body = crate::error::ApiError),
    ),
))]
pub async fn get_user_handler(
    State(state): State<Arc<UserState>>,
    Path(principal): Path<String>,
) -> ApiResult<Json<UserSummary>> {
    let user = get_user(state.directory.as_ref(), state.store.as_ref(), &principal).await?;
    Ok(Json(user))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(
    directory: Arc<dyn MembershipDirectory>,
    store: Arc<dyn DepositionStore>,
) -> Router {
    let state = Arc::new(UserState::new(directory, store));

    Router::new()
        .route("/users/", get(list_users_handler))
        .route("/users/:principal/", get(get_user_handler))
        .with_state(state)
}
