use axum::{body::Body, http::Request, http::StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

#[tokio::test]
async fn livez_healthy_and_bad_requests_rejected() {
    let state = mt_api::test_state();
    let app = mt_api::create_router(state);

    let livez_response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/livez")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(livez_response.status(), StatusCode::OK);

    // lat without lon must be rejected before any database access.
    let bad_request = app
        .oneshot(
            Request::builder()
                .uri("/api/recommendations?member_id=1&lat=37.5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(bad_request.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_autocomplete_keyword_yields_empty_suggestions() {
    let state = mt_api::test_state();
    let app = mt_api::create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/autocomplete?keyword=%20%20")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["suggestions"], serde_json::json!([]));
}

#[tokio::test]
async fn blank_search_event_keyword_is_bad_request() {
    let state = mt_api::test_state();
    let app = mt_api::create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/search-events")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"keyword":"   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
