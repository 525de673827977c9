mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use common::TestApp;
use storefront_api::{app::build_app, routes::health::health_check};

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert!(!data.version.is_empty());
}

#[tokio::test]
async fn unknown_paths_get_the_json_fallback() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let router = build_app(app.state.clone(), None);

    let response = router
        .oneshot(Request::builder().uri("/nope").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
    assert_eq!(body["data"]["path"], "/nope");
    Ok(())
}
