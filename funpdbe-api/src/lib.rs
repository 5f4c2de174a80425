//! FunPDBe API - REST Deposition Service
//!
//! Axum endpoints through which partner resources deposit, replace, delete
//! and query functional annotations of PDB structures. Writes are gated by
//! group membership; storage is PostgreSQL or an in-memory store.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod telemetry;

pub use auth::{
    authenticate, authenticate_api_key, authenticate_jwt, validate_jwt_token, AuthConfig,
    AuthContext, AuthMethod, Claims,
};
pub use config::{ApiConfig, StoreKind};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthMiddlewareState, Caller};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::{create_api_router, AppComponents};
pub use services::{DepositionService, UserSummary};
