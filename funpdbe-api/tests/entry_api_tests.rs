//! Router-level tests for the deposition endpoints
//!
//! Exercise the full stack (auth middleware, gate, validation, store) over
//! the in-memory store.

mod support;

use axum::http::StatusCode;
use funpdbe_core::EntryRecord;
use funpdbe_test_utils::{mock_document, mock_payload, mock_payload_for};
use serde_json::json;
use support::*;

const FUNSITES: &str = "/entries/resource/funsites/";
const FUNSITES_2ABC: &str = "/entries/resource/funsites/2abc/";

fn records(body: &serde_json::Value) -> Vec<EntryRecord> {
    serde_json::from_value(body.clone()).expect("body is a list of entries")
}

// ============================================================================
// REFERENCE SCENARIO
// ============================================================================

#[tokio::test]
async fn test_create_read_delete_lifecycle() {
    let app = test_app();

    let created = post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let record: EntryRecord = serde_json::from_value(created.body.clone()).unwrap();
    assert_eq!(record.owner, "alice");
    assert_eq!(record.document, mock_document());

    let duplicate = post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.code(), "DUPLICATE_ENTRY");
    assert_eq!(app.store.counts().await.entries, 1);

    let fetched = get(&app.router, FUNSITES_2ABC).await;
    assert_eq!(fetched.status, StatusCode::OK);
    let fetched = records(&fetched.body);
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].document, mock_document());
    assert_eq!(fetched[0].pk, record.pk);

    let deleted = delete(&app.router, FUNSITES_2ABC, Some(ALICE_KEY)).await;
    assert_eq!(deleted.status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(deleted.body["deleted"], 1);
    assert_eq!(deleted.body["message"], "Deleted 2abc from funsites");

    let gone = get(&app.router, FUNSITES_2ABC).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.code(), "NO_ENTRIES");
    assert_eq!(app.store.counts().await.total(), 0);
}

#[tokio::test]
async fn test_cascade_counts_rows_of_reference_tree() {
    let app = test_app();
    post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;

    let counts = app.store.counts().await;
    assert_eq!(counts.entries, 1);
    assert_eq!(counts.sites, 1);
    assert_eq!(counts.evidence_codes, 1);
    assert_eq!(counts.chains, 1);
    assert_eq!(counts.residues, 1);
    assert_eq!(counts.site_data, 1);
}

// ============================================================================
// AUTHORIZATION
// ============================================================================

#[tokio::test]
async fn test_anonymous_write_is_forbidden() {
    let app = test_app();

    let response = post_json(&app.router, FUNSITES, None, &mock_payload()).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.code(), "NO_PERMISSION");
    assert_eq!(app.store.counts().await.total(), 0);
}

#[tokio::test]
async fn test_non_member_is_forbidden_regardless_of_document() {
    let app = test_app();

    let response = post_json(&app.router, FUNSITES, Some(BOB_KEY), &mock_payload()).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = post_raw(&app.router, FUNSITES, Some(CAROL_KEY), "not json").await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;

    let response = delete(&app.router, FUNSITES_2ABC, Some(BOB_KEY)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = post_json(&app.router, FUNSITES_2ABC, Some(BOB_KEY), &mock_payload()).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    assert_eq!(app.store.counts().await.entries, 1);
}

#[tokio::test]
async fn test_invalid_credentials_are_unauthorized() {
    let app = test_app();

    let response = post_json(&app.router, FUNSITES, Some("wrong_key"), &mock_payload()).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_token_authorizes_member() {
    let app = test_app();
    let token = sign_token(&app.auth, "bob");

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/entries/resource/nod/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            mock_payload_for("1xyz", "nod").to_string(),
        ))
        .unwrap();

    let response = send(&app.router, request).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["owner"], "bob");
}

#[tokio::test]
async fn test_unreadable_credentials_are_unauthorized() {
    let app = test_app();

    for header in ["x-api-key", "authorization"] {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri(FUNSITES)
            .header(header, axum::http::HeaderValue::from_bytes(b"\xe9").unwrap())
            .header("content-type", "application/json")
            .body(axum::body::Body::from(mock_payload().to_string()))
            .unwrap();

        let response = send(&app.router, request).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{header}");
    }
    assert_eq!(app.store.counts().await.total(), 0);
}

#[tokio::test]
async fn test_reads_are_public() {
    let app = test_app();
    post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;

    assert_eq!(get(&app.router, "/entries/").await.status, StatusCode::OK);
    assert_eq!(get(&app.router, FUNSITES).await.status, StatusCode::OK);
    assert_eq!(get(&app.router, "/entries/pdb/2abc/").await.status, StatusCode::OK);
}

// ============================================================================
// VALIDATION
// ============================================================================

#[tokio::test]
async fn test_path_validation_errors() {
    let app = test_app();

    let response = get(&app.router, "/entries/resource/invalid/").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "INVALID_RESOURCE");

    let response = get(&app.router, "/entries/pdb/9999/").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "INVALID_PDB_PATTERN");

    // PDB id is checked before the resource
    let response = get(&app.router, "/entries/resource/invalid/asdasd/").await;
    assert_eq!(response.code(), "INVALID_PDB_PATTERN");

    let response = delete(&app.router, "/entries/resource/invalid/2abc/", Some(ALICE_KEY)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "INVALID_RESOURCE");

    let response = post_json(&app.router, "/entries/resource/invalid/", Some(ALICE_KEY), &mock_payload()).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "INVALID_RESOURCE");
}

#[tokio::test]
async fn test_payload_validation_errors() {
    let app = test_app();

    let response = post_json(
        &app.router,
        FUNSITES,
        Some(ALICE_KEY),
        &mock_payload_for("2abc", "nod"),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "RESOURCE_MISMATCH");

    let response = post_json(&app.router, FUNSITES, Some(ALICE_KEY), &json!({"pdb_id": "2abc"})).await;
    assert_eq!(response.code(), "MISSING_RESOURCE_FIELD");

    // the payload PDB id is checked before its resource field
    let response = post_json(&app.router, FUNSITES, Some(ALICE_KEY), &json!({"pdb_id": "9999"})).await;
    assert_eq!(response.code(), "INVALID_PDB_PATTERN");

    let response = post_json(
        &app.router,
        FUNSITES,
        Some(ALICE_KEY),
        &json!({"pdb_id": "xxxx", "data_resource": "funsites"}),
    )
    .await;
    assert_eq!(response.code(), "INVALID_PDB_PATTERN");

    let response = post_raw(&app.router, FUNSITES, Some(ALICE_KEY), "{not json").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "MALFORMED_DOCUMENT");

    let response = post_json(
        &app.router,
        FUNSITES,
        Some(ALICE_KEY),
        &json!({"pdb_id": "2abc", "data_resource": "funsites", "chains": "A"}),
    )
    .await;
    assert_eq!(response.code(), "MALFORMED_DOCUMENT");

    assert_eq!(app.store.counts().await.total(), 0);
}

#[tokio::test]
async fn test_text_wider_than_schema_is_malformed() {
    let app = test_app();

    let mut payload = mock_payload();
    payload["chains"][0]["chain_label"] = json!("A_very_long_chain_label_over_twenty");
    let response = post_json(&app.router, FUNSITES, Some(ALICE_KEY), &payload).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), "MALFORMED_DOCUMENT");

    let mut payload = mock_payload();
    payload["release_date"] = json!("a\u{0}b");
    let response = post_json(&app.router, FUNSITES, Some(ALICE_KEY), &payload).await;
    assert_eq!(response.code(), "MALFORMED_DOCUMENT");

    assert_eq!(app.store.counts().await.total(), 0);
}

#[tokio::test]
async fn test_optional_collections_may_be_absent_or_null() {
    let app = test_app();

    let response = post_json(
        &app.router,
        FUNSITES,
        Some(ALICE_KEY),
        &json!({"pdb_id": "3def", "data_resource": "funsites", "sites": null, "chains": []}),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["chains"], json!([]));
    assert_eq!(response.body["sites"], json!([]));
    assert_eq!(app.store.counts().await.total(), 1);
}

#[tokio::test]
async fn test_pdb_id_is_case_insensitive() {
    let app = test_app();
    let response = post_json(
        &app.router,
        FUNSITES,
        Some(ALICE_KEY),
        &mock_payload_for("2ABC", "funsites"),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["pdb_id"], "2abc");

    let fetched = get(&app.router, "/entries/pdb/2AbC/").await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(records(&fetched.body).len(), 1);

    let duplicate = post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;
    assert_eq!(duplicate.code(), "DUPLICATE_ENTRY");
}

// ============================================================================
// QUERIES
// ============================================================================

#[tokio::test]
async fn test_empty_store_reports_no_entries() {
    let app = test_app();

    for uri in ["/entries/", FUNSITES, FUNSITES_2ABC, "/entries/pdb/2abc/"] {
        let response = get(&app.router, uri).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(response.code(), "NO_ENTRIES");
    }
}

#[tokio::test]
async fn test_filters_select_by_resource_and_pdb() {
    let app = test_app();
    post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;
    post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload_for("1xyz", "funsites")).await;
    post_json(&app.router, "/entries/resource/nod/", Some(BOB_KEY), &mock_payload_for("2abc", "nod")).await;

    let all = records(&get(&app.router, "/entries/").await.body);
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].pk < w[1].pk));

    let funsites = records(&get(&app.router, FUNSITES).await.body);
    assert_eq!(funsites.len(), 2);
    assert!(funsites.iter().all(|r| r.document.data_resource == "funsites"));

    let by_pdb = records(&get(&app.router, "/entries/pdb/2abc/").await.body);
    let mut resources: Vec<_> = by_pdb.iter().map(|r| r.document.data_resource.as_str()).collect();
    resources.sort_unstable();
    assert_eq!(resources, vec!["funsites", "nod"]);

    let nod_xyz = get(&app.router, "/entries/resource/nod/1xyz/").await;
    assert_eq!(nod_xyz.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// DELETE AND REPLACE
// ============================================================================

#[tokio::test]
async fn test_delete_absent_entry_reports_no_entries() {
    let app = test_app();

    let response = delete(&app.router, FUNSITES_2ABC, Some(ALICE_KEY)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.code(), "NO_ENTRIES");
}

#[tokio::test]
async fn test_delete_leaves_other_trees_alone() {
    let app = test_app();
    post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;
    post_json(&app.router, "/entries/resource/nod/", Some(BOB_KEY), &mock_payload_for("2abc", "nod")).await;

    delete(&app.router, FUNSITES_2ABC, Some(ALICE_KEY)).await;

    let counts = app.store.counts().await;
    assert_eq!(counts.entries, 1);
    assert_eq!(counts.total(), 6);
    assert_eq!(get(&app.router, "/entries/resource/nod/2abc/").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_replace_swaps_tree() {
    let app = test_app();
    post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;

    let mut replacement = mock_payload();
    replacement["resource_version"] = json!("2.0");
    replacement["chains"] = json!([]);

    let response = post_json(&app.router, FUNSITES_2ABC, Some(ALICE_KEY), &replacement).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["resource_version"], "2.0");

    let fetched = records(&get(&app.router, FUNSITES_2ABC).await.body);
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].document.resource_version.as_deref(), Some("2.0"));
    assert!(fetched[0].document.chains.is_empty());

    let counts = app.store.counts().await;
    assert_eq!(counts.entries, 1);
    assert_eq!(counts.residues, 0);
    assert_eq!(counts.site_data, 0);
}

#[tokio::test]
async fn test_replace_without_prior_entry_reports_no_entries() {
    let app = test_app();

    let response = post_json(&app.router, FUNSITES_2ABC, Some(ALICE_KEY), &mock_payload()).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.code(), "NO_ENTRIES");
    assert_eq!(app.store.counts().await.total(), 0);
}

#[tokio::test]
async fn test_failed_replace_keeps_original_tree() {
    let app = test_app();
    post_json(&app.router, FUNSITES, Some(ALICE_KEY), &mock_payload()).await;
    let before = app.store.counts().await;

    let response = post_json(
        &app.router,
        FUNSITES_2ABC,
        Some(ALICE_KEY),
        &mock_payload_for("2abc", "nod"),
    )
    .await;
    assert_eq!(response.code(), "RESOURCE_MISMATCH");

    let response = post_json(
        &app.router,
        FUNSITES_2ABC,
        Some(ALICE_KEY),
        &mock_payload_for("1xyz", "funsites"),
    )
    .await;
    assert_eq!(response.code(), "PDB_MISMATCH");

    let response = post_raw(&app.router, FUNSITES_2ABC, Some(ALICE_KEY), "[]").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.counts().await, before);
    let fetched = records(&get(&app.router, FUNSITES_2ABC).await.body);
    assert_eq!(fetched[0].document, mock_document());
}
