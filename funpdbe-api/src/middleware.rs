//! Axum Middleware for Authentication
//!
//! Authentication on the deposition API is optional. The middleware:
//! - Authenticates requests carrying `X-API-Key` or `Authorization: Bearer`
//! - Injects the resulting [`AuthContext`] into request extensions
//! - Lets requests without credentials through as anonymous
//! - Returns 401 when credentials are presented but invalid
//!
//! Whether an anonymous or authenticated caller may write is decided later,
//! per resource, by the authorization gate.

use crate::auth::{authenticate, AuthConfig, AuthContext};
use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::sync::Arc;

pub const API_KEY_HEADER: &str = "x-api-key";

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Optional authentication.
///
/// ```ignore
/// use axum::{Router, middleware};
/// use funpdbe_api::middleware::{auth_middleware, AuthMiddlewareState};
/// use funpdbe_api::AuthConfig;
///
/// let auth_state = AuthMiddlewareState::new(AuthConfig::from_env());
///
/// let app = Router::new()
///     .route("/entries/", axum::routing::get(|| async { "OK" }))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let api_key_header = credential_header(request.headers(), API_KEY_HEADER)?;
    let auth_header = credential_header(request.headers(), AUTHORIZATION.as_str())?;

    let auth_context = authenticate(&state.auth_config, api_key_header, auth_header)
        .map_err(AuthMiddlewareError)?;

    match auth_context {
        Some(context) => {
            tracing::debug!(
                principal = %context.principal,
                method = ?context.auth_method,
                "Request authenticated"
            );
            request.extensions_mut().insert(context);
        }
        None => tracing::trace!("Anonymous request"),
    }

    Ok(next.run(request).await)
}

/// A credential header that is present but not readable text is rejected,
/// never treated as absent.
fn credential_header<'a>(
    headers: &'a HeaderMap,
    name: &str,
) -> Result<Option<&'a str>, AuthMiddlewareError> {
    headers
        .get(name)
        .map(|value| {
            value.to_str().map_err(|_| {
                AuthMiddlewareError(ApiError::unauthorized(format!(
                    "{} header is not valid ASCII",
                    name
                )))
            })
        })
        .transpose()
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Rejection produced by [`auth_middleware`].
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// The caller of a request: authenticated, or anonymous (`None`).
///
/// Never rejects. Without [`auth_middleware`] on the route every caller is
/// anonymous.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<AuthContext>);

impl Caller {
    pub fn principal(&self) -> Option<&str> {
        self.0.as_ref().map(|ctx| ctx.principal.as_str())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(parts.extensions.get::<AuthContext>().cloned()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
