use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::{
        auth::{DeliveryPasswordStatus, DeliveryPasswordUpdate, LoginRequest, TokenResponse},
        orders::OrderList,
    },
    error::AppResult,
    middleware::auth::{AdminUser, StaffUser},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::orders as order_service,
    state::AppState,
};

/// Routes for the delivery role, mounted at `/delivery`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(delivery_login))
        .route("/orders", get(list_delivery_orders))
}

/// Credential management, mounted under `/admin`.
pub fn admin_router() -> Router<AppState> {
    Router::new().route(
        "/delivery-password",
        get(delivery_password_status).put(set_delivery_password),
    )
}

#[utoipa::path(
    post,
    path = "/api/delivery/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Delivery login", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials or no password set")
    ),
    tag = "Delivery"
)]
pub async fn delivery_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<TokenResponse>>> {
    let token = state
        .gate
        .issue_delivery_token(state.store.as_ref(), &payload.password)
        .await?;
    Ok(Json(ApiResponse::item("Login successful", token)))
}

#[utoipa::path(
    get,
    path = "/api/delivery/orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<u64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "processing, ready, shipped or delivered"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders for the delivery team", body = ApiResponse<OrderList>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Delivery"
)]
pub async fn list_delivery_orders(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let (items, meta) = order_service::list_orders(&state, query).await?;
    Ok(Json(ApiResponse::success("Ok", OrderList { items }, Some(meta))))
}

#[utoipa::path(
    get,
    path = "/api/admin/delivery-password",
    responses(
        (status = 200, description = "Whether a delivery password is set", body = ApiResponse<DeliveryPasswordStatus>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Delivery"
)]
pub async fn delivery_password_status(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<ApiResponse<DeliveryPasswordStatus>>> {
    let status = state
        .gate
        .delivery_password_status(state.store.as_ref())
        .await?;
    Ok(Json(ApiResponse::item("Ok", status)))
}

#[utoipa::path(
    put,
    path = "/api/admin/delivery-password",
    request_body = DeliveryPasswordUpdate,
    responses(
        (status = 200, description = "Delivery password replaced", body = ApiResponse<DeliveryPasswordStatus>),
        (status = 400, description = "Password too short"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Delivery"
)]
pub async fn set_delivery_password(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<DeliveryPasswordUpdate>,
) -> AppResult<Json<ApiResponse<DeliveryPasswordStatus>>> {
    let status = state
        .gate
        .set_delivery_password(state.store.as_ref(), &payload.password)
        .await?;
    Ok(Json(ApiResponse::item("Delivery password updated", status)))
}
