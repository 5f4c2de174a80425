//! API Configuration Module
//!
//! CORS, request size and storage backend selection. Loaded from environment
//! variables with development defaults.

use crate::error::{ApiError, ApiResult};

/// Default request body cap: deposition files for large structures run to a
/// few megabytes.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// True when `FUNPDBE_ENVIRONMENT` is `production` or `prod`.
pub fn is_production_environment() -> bool {
    let environment = std::env::var("FUNPDBE_ENVIRONMENT")
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase();
    environment == "production" || environment == "prod"
}

/// Storage backend behind the deposition service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreKind::Postgres),
            "memory" | "in-memory" | "mem" => Ok(StoreKind::Memory),
            other => Err(ApiError::invalid_input(format!(
                "Unknown FUNPDBE_STORE value: {}",
                other
            ))),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins. Empty means allow all (dev mode).
    pub cors_origins: Vec<String>,

    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Largest accepted request body.
    pub body_limit_bytes: usize,

    pub store: StoreKind,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            store: StoreKind::default(),
        }
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `FUNPDBE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `FUNPDBE_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `FUNPDBE_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `FUNPDBE_BODY_LIMIT_BYTES`: Request body cap (default: 16 MiB)
    /// - `FUNPDBE_STORE`: "postgres" or "memory" (default: postgres)
    pub fn from_env() -> ApiResult<Self> {
        let cors_origins = std::env::var("FUNPDBE_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("FUNPDBE_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("FUNPDBE_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        let body_limit_bytes = std::env::var("FUNPDBE_BODY_LIMIT_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BODY_LIMIT_BYTES);

        let store = match std::env::var("FUNPDBE_STORE") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreKind::default(),
        };

        Ok(Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            body_limit_bytes,
            store,
        })
    }

    /// The in-memory store loses every deposition on restart.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        if self.store == StoreKind::Memory {
            if is_production_environment() {
                return Err(ApiError::invalid_input(
                    "Cannot start server in production with FUNPDBE_STORE=memory",
                ));
            }
            tracing::warn!("Using in-memory store; depositions are lost on restart");
        }
        Ok(())
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.ebi.ac.uk matches any https subdomain
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain
                        .strip_suffix(pattern)
                        .is_some_and(|sub| sub.ends_with('.'));
                }
            }
            false
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_env::{EnvVarGuard, ENV_MUTEX};
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert_eq!(config.cors_max_age_secs, 86400);
        assert_eq!(config.body_limit_bytes, DEFAULT_BODY_LIMIT_BYTES);
        assert_eq!(config.store, StoreKind::Postgres);
    }

    #[test]
    fn test_from_env() -> ApiResult<()> {
        let _lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _origins = EnvVarGuard::set(
            "FUNPDBE_CORS_ORIGINS",
            Some("https://www.ebi.ac.uk, ,https://pdbe.org"),
        );
        let _store = EnvVarGuard::set("FUNPDBE_STORE", Some("Memory"));
        let _limit = EnvVarGuard::set("FUNPDBE_BODY_LIMIT_BYTES", Some("1024"));

        let config = ApiConfig::from_env()?;
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.body_limit_bytes, 1024);
        Ok(())
    }

    #[test]
    fn test_unknown_store_rejected() {
        let _lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _store = EnvVarGuard::set("FUNPDBE_STORE", Some("sqlite"));
        assert!(ApiConfig::from_env().is_err());
    }

    #[test]
    fn test_memory_store_refused_in_production() {
        let _lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let config = ApiConfig {
            store: StoreKind::Memory,
            ..ApiConfig::default()
        };

        let _env = EnvVarGuard::set("FUNPDBE_ENVIRONMENT", Some("production"));
        assert!(config.validate_for_production().is_err());
        drop(_env);

        let _env = EnvVarGuard::set("FUNPDBE_ENVIRONMENT", Some("development"));
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn test_origin_allowed() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("http://localhost:3000"));

        let config = ApiConfig {
            cors_origins: vec!["https://www.ebi.ac.uk".to_string(), "*.pdbe.org".to_string()],
            ..ApiConfig::default()
        };
        assert!(config.is_origin_allowed("https://www.ebi.ac.uk"));
        assert!(config.is_origin_allowed("https://api.pdbe.org"));
        assert!(!config.is_origin_allowed("https://evilpdbe.org"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }
}
