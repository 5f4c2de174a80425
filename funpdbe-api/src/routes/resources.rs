//! Resource listing
//!
//! The whitelist of contributing resources with their partner metadata.

use axum::{extract::State, routing::get, Json, Router};
use funpdbe_core::{PartnerInfo, ResourceRegistry};
use std::sync::Arc;

/// GET /resources/ - Whitelisted resources, in configuration order
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/resources/",
    tag = "Resources",
    responses(
        (status = 200, description = "Whitelisted resources", body = Vec<PartnerInfo>),
    ),
))]
pub async fn list_resources(State(registry): State<Arc<ResourceRegistry>>) -> Json<Vec<PartnerInfo>> {
    Json(registry.partners().to_vec())
}

pub fn create_router(registry: Arc<ResourceRegistry>) -> Router {
    Router::new()
        .route("/resources/", get(list_resources))
        .with_state(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_lists_registry_in_order() {
        let registry = ResourceRegistry::from_list("nod, funsites, cath");
        let app = create_router(Arc::new(registry));

        let response = app
            .oneshot(Request::builder().uri("/resources/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let partners: Vec<PartnerInfo> = serde_json::from_slice(&bytes).unwrap();
        let names: Vec<&str> = partners.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["nod", "funsites", "cath"]);
        assert!(partners.iter().all(|p| p.active));
    }
}
