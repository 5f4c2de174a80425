//! OpenAPI Specification for the FunPDBe Deposition API
//!
//! Generated with utoipa from the handler annotations and the document types.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::entries::DeleteResponse;
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{entries, health, resources, users};
use crate::services::UserSummary;
use crate::telemetry::metrics;

use funpdbe_core::{
    ChainDocument, EntryDocument, EntryRecord, EvidenceCodeOntologyDocument, PartnerInfo,
    ResidueDocument, SiteDataDocument, SiteDocument,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FunPDBe Deposition API",
        version = "0.4.0",
        description = "Deposition and retrieval of functional annotations of PDB structures contributed by partner resources",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "FunPDBe", url = "https://www.ebi.ac.uk/pdbe/funpdbe")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Entries", description = "Annotation entries keyed by PDB id and data resource"),
        (name = "Resources", description = "Whitelisted contributing resources"),
        (name = "Users", description = "Depositing principals and their groups"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        entries::list_entries,
        entries::list_by_resource,
        entries::get_by_resource_and_pdb,
        entries::list_by_pdb,
        entries::create_entry,
        entries::replace_entry,
        entries::delete_entry,
        resources::list_resources,
        users::list_users_handler,
        users::get_user_handler,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            EntryDocument, EntryRecord, ChainDocument, ResidueDocument, SiteDataDocument,
            SiteDocument, EvidenceCodeOntologyDocument,
            PartnerInfo, UserSummary, DeleteResponse,
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );

            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
