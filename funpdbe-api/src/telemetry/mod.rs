//! FunPDBe Telemetry - Observability Infrastructure
//!
//! Structured logging setup and Prometheus metrics for the API layer.

pub mod logging;
pub mod metrics;
pub mod middleware;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{metrics_handler, FunpdbeMetrics, METRICS};
pub use middleware::{observability_middleware, route_label, UNMATCHED_ROUTE};
