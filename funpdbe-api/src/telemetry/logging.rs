//! Tracing subscriber initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

const DEFAULT_FILTER: &str = "funpdbe_api=debug,tower_http=info,info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Logging configuration from environment variables.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            service_name: "funpdbe-api".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

impl LoggingConfig {
    /// - `FUNPDBE_LOG_FORMAT`: `json` (default) or `pretty`
    /// - `FUNPDBE_SERVICE_NAME`
    /// - `FUNPDBE_ENVIRONMENT`
    pub fn from_env() -> Self {
        let format = match std::env::var("FUNPDBE_LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "pretty" | "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Self {
            format,
            service_name: std::env::var("FUNPDBE_SERVICE_NAME")
                .unwrap_or_else(|_| "funpdbe-api".to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: std::env::var("FUNPDBE_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        }
    }
}

/// Install the global subscriber. Call once at startup; `RUST_LOG` overrides
/// the default filter.
pub fn init_logging(config: &LoggingConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        environment = config.environment,
        "Logging initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_env::{EnvVarGuard, ENV_MUTEX};

    #[test]
    fn test_logging_config_defaults() {
        let _lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _format = EnvVarGuard::set("FUNPDBE_LOG_FORMAT", None);
        let _name = EnvVarGuard::set("FUNPDBE_SERVICE_NAME", None);

        let config = LoggingConfig::from_env();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.service_name, "funpdbe-api");
    }

    #[test]
    fn test_pretty_format_selected() {
        let _lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _format = EnvVarGuard::set("FUNPDBE_LOG_FORMAT", Some("Pretty"));

        assert_eq!(LoggingConfig::from_env().format, LogFormat::Pretty);
    }
}
