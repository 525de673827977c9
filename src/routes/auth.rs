use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::auth::{LoginRequest, TokenResponse},
    error::AppResult,
    response::ApiResponse,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Admin login", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<TokenResponse>>> {
    let token = state.gate.issue_admin_token(&payload.password)?;
    Ok(Json(ApiResponse::item("Login successful", token)))
}
