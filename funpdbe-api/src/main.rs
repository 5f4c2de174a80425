//! FunPDBe API Server Entry Point
//!
//! Loads configuration from the environment, prepares the store and the
//! membership directory, and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use funpdbe_api::telemetry::{init_logging, LoggingConfig};
use funpdbe_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppComponents, AuthConfig, DbClient,
    DbConfig, DepositionService, StoreKind,
};
use funpdbe_core::{AuthorizationGate, MembershipDirectory, ResourceRegistry};
use funpdbe_storage::{DepositionStore, InMemoryStore, StaticDirectory};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_logging(&LoggingConfig::from_env())?;

    let api_config = ApiConfig::from_env()?;
    api_config.validate_for_production()?;
    let auth_config = AuthConfig::from_env();

    let registry = Arc::new(ResourceRegistry::from_env()?);
    let seed = StaticDirectory::from_env()?;
    tracing::info!(
        resources = registry.len(),
        memberships = seed.memberships().len(),
        "Configuration loaded"
    );

    let (store, directory): (Arc<dyn DepositionStore>, Arc<dyn MembershipDirectory>) =
        match api_config.store {
            StoreKind::Postgres => {
                let db = DbClient::from_config(&DbConfig::from_env())?;
                db.migrate().await?;
                let seeded = db.seed_memberships(&seed).await?;
                tracing::info!(seeded, "Membership seed applied");
                let db = Arc::new(db);
                (db.clone() as Arc<dyn DepositionStore>, db as Arc<dyn MembershipDirectory>)
            }
            StoreKind::Memory => (
                Arc::new(InMemoryStore::new()) as Arc<dyn DepositionStore>,
                Arc::new(seed) as Arc<dyn MembershipDirectory>,
            ),
        };

    let gate = AuthorizationGate::new(registry, directory.clone());
    let service = Arc::new(DepositionService::new(store, gate));

    let app: Router = create_api_router(
        AppComponents::new(service, directory),
        &api_config,
        auth_config,
    )?;

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting FunPDBe deposition API");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("FUNPDBE_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("FUNPDBE_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
