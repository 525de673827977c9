mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tower::ServiceExt;

use common::{ADMIN_EMAIL, ADMIN_PASSWORD, JWT_SECRET, TestApp};
use storefront_api::{
    app::build_app,
    dto::auth::Claims,
    error::AppError,
    services::auth::{DELIVERY_SUBJECT, Identity},
};

fn forge(secret: &str, sub: &str, exp_offset_secs: i64) -> anyhow::Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        iat: now as usize,
        exp: (now + exp_offset_secs) as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

#[tokio::test]
async fn admin_token_round_trip() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let token = app.state.gate.issue_admin_token(ADMIN_PASSWORD)?;

    assert_eq!(token.token_type, "bearer");
    assert!(token.expires_at > Utc::now());
    assert_eq!(
        app.state.gate.verify(&token.access_token)?,
        Identity::Admin {
            email: ADMIN_EMAIL.to_string()
        }
    );

    let err = app.state.gate.issue_admin_token("guess").unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
    Ok(())
}

#[tokio::test]
async fn delivery_login_needs_a_stored_password() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let store = app.state.store.as_ref();
    let gate = &app.state.gate;

    assert!(!gate.delivery_password_status(store).await?.is_set);
    let err = gate
        .issue_delivery_token(store, "anything-at-all")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    let err = gate.set_delivery_password(store, "short").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let status = gate.set_delivery_password(store, "van-keys-2024").await?;
    assert!(status.is_set);
    assert_eq!(gate.delivery_password_status(store).await?, status);

    let err = gate.issue_delivery_token(store, "wrong-pass").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
    let token = gate.issue_delivery_token(store, "van-keys-2024").await?;
    assert_eq!(gate.verify(&token.access_token)?, Identity::Delivery);
    Ok(())
}

#[tokio::test]
async fn bad_tokens_are_all_unauthorized() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let gate = &app.state.gate;
    let valid = gate.issue_admin_token(ADMIN_PASSWORD)?.access_token;

    let tampered = format!("{valid}x");
    let bad = [
        tampered,
        "not-a-jwt".to_string(),
        forge("another-secret", ADMIN_EMAIL, 3600)?,
        forge(JWT_SECRET, ADMIN_EMAIL, -3600)?,
        forge(JWT_SECRET, "someone@example.com", 3600)?,
    ];
    for token in &bad {
        let err = gate.verify(token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized), "accepted {token}");
    }

    assert_eq!(
        gate.verify(&forge(JWT_SECRET, DELIVERY_SUBJECT, 3600)?)?,
        Identity::Delivery
    );
    Ok(())
}

#[tokio::test]
async fn routes_enforce_roles() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let router = build_app(app.state.clone(), None);
    let delivery = forge(JWT_SECRET, DELIVERY_SUBJECT, 3600)?;
    let admin = app.state.gate.issue_admin_token(ADMIN_PASSWORD)?.access_token;

    let get = |uri: &str, token: Option<&str>| {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty())
    };

    let response = router.clone().oneshot(get("/api/admin/orders", None)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let response = router
        .clone()
        .oneshot(get("/api/admin/orders", Some(&delivery))?)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(get("/api/delivery/orders", Some(&delivery))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(get("/api/admin/orders?status=ready", Some(&admin))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
    assert_eq!(body["meta"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn login_endpoint_issues_tokens() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let router = build_app(app.state.clone(), None);

    let login = |password: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "password": password }).to_string(),
            ))
    };

    let response = router.clone().oneshot(login("nope")?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
    assert_eq!(body["data"]["kind"], "unauthorized");

    let response = router.oneshot(login(ADMIN_PASSWORD)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
    let token = body["data"]["access_token"].as_str().unwrap_or_default();
    assert!(matches!(
        app.state.gate.verify(token)?,
        Identity::Admin { .. }
    ));
    Ok(())
}
