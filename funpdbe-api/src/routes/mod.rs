//! REST API Routes Module
//!
//! Includes:
//! - Entry deposition and retrieval (`/entries/...`, optional auth)
//! - Resource whitelist and user listings (public, read-only)
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod entries;
pub mod health;
pub mod resources;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use funpdbe_core::MembershipDirectory;
use funpdbe_storage::DepositionStore;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::AuthConfig;
use crate::config::{is_production_environment, ApiConfig};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthMiddlewareState, API_KEY_HEADER};
use crate::services::DepositionService;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use entries::create_router as entries_router;
pub use health::create_router as health_router;
pub use resources::create_router as resources_router;
pub use users::create_router as users_router;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set FUNPDBE_CORS_ORIGINS.",
        ));
    }
    config.validate_for_production()
}

// ============================================================================
// ROUTER
// ============================================================================

/// Everything the routers need from the running process.
#[derive(Clone)]
pub struct AppComponents {
    pub service: Arc<DepositionService>,
    pub store: Arc<dyn DepositionStore>,
    pub directory: Arc<dyn MembershipDirectory>,
}

impl AppComponents {
    /// Components sharing the store behind `service`.
    pub fn new(service: Arc<DepositionService>, directory: Arc<dyn MembershipDirectory>) -> Self {
        Self {
            store: service.store().clone(),
            service,
            directory,
        }
    }
}

/// Create the complete API router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS (outermost) - handles preflight requests
/// 2. Observability - tracing and metrics
/// 3. Body limit
/// 4. Auth (only on /entries/...) - resolves the optional caller
///
/// In production, validates the auth and CORS configuration first.
pub fn create_api_router(
    components: AppComponents,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> ApiResult<Router> {
    if is_production_environment() {
        auth_config.validate_for_production()?;
        validate_api_config_for_production(api_config)?;
    }

    let auth_state = AuthMiddlewareState::new(auth_config);
    let registry = components.service.gate().registry().clone();

    let entry_routes = entries::create_router(components.service.clone())
        .layer(from_fn_with_state(auth_state, auth_middleware));

    #[allow(unused_mut)]
    let mut router = Router::new()
        .merge(entry_routes)
        .merge(resources::create_router(registry))
        .merge(users::create_router(
            components.directory.clone(),
            components.store.clone(),
        ))
        .nest("/health", health::create_router(components.store.clone()))
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", crate::openapi::ApiDoc::openapi()),
        );
    }

    let cors = build_cors_layer(api_config);

    Ok(router
        .layer(DefaultBodyLimit::max(api_config.body_limit_bytes))
        .layer(from_fn(observability_middleware))
        .layer(cors))
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// Empty origins allow everything (development).
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}
