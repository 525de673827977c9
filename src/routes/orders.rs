use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::orders::{CreateOrderRequest, OrderDetail, OrderList, UpdateOrderRequest},
    error::{AppError, AppResult},
    middleware::auth::AdminUser,
    response::{ApiResponse, Deleted},
    routes::params::OrderListQuery,
    services::orders as order_service,
    state::AppState,
};

/// Admin order management, mounted under `/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/{id}",
            get(get_order).patch(update_order).delete(delete_order),
        )
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<u64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "processing, ready, shipped or delivered"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "List orders", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let (items, meta) = order_service::list_orders(&state, query).await?;
    Ok(Json(ApiResponse::success("Ok", OrderList { items }, Some(meta))))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created with its items", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Invalid order or items"),
        (status = 502, description = "Store failure, nothing persisted"),
        (status = 500, description = "Store failure and cleanup failed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderDetail>>)> {
    let order = order_service::create_order(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::item("Order created", order)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = order_service::get_order(&state, id).await?;
    Ok(Json(ApiResponse::item("Ok", order)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Invalid items"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = order_service::update_order(&state, id, payload).await?;
    Ok(Json(ApiResponse::item("Order updated", order)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order and its items deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    if !order_service::delete_order(&state, id).await? {
        return Err(AppError::not_found(format!("Order {id}")));
    }
    Ok(Json(ApiResponse::item("Order deleted", Deleted { id })))
}
