use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};

use crate::{
    dto::products::{
        CreateProductRequest, CreateVariantRequest, ProductDetail, ProductList,
        UpdateProductRequest, UpdateVariantRequest, UploadForm,
    },
    error::{AppError, AppResult},
    middleware::auth::AdminUser,
    models::{ProductImage, ProductVariant},
    response::{ApiResponse, Deleted, Meta},
    services::catalog,
    state::AppState,
};

/// Public catalog reads, mounted at `/products`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
}

/// Catalog writes, mounted under `/admin`.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/{id}", patch(update_product).delete(delete_product))
        .route("/products/{id}/images", post(upload_product_image))
        .route("/products/{id}/variants", post(create_variant))
        .route(
            "/products/images/{image_id}",
            axum::routing::delete(delete_product_image),
        )
        .route(
            "/products/images/{image_id}/set-primary",
            post(set_primary_image),
        )
        .route(
            "/products/variants/{variant_id}",
            patch(update_variant).delete(delete_variant),
        )
        .route(
            "/products/variants/{variant_id}/image",
            post(upload_variant_image),
        )
}

/// Pulls the `file` field out of a multipart body.
async fn read_file(mut multipart: Multipart) -> AppResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Read error: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Empty file".into()));
        }
        return Ok((filename, bytes.to_vec()));
    }
    Err(AppError::Validation("No file provided".into()))
}

#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Products with their primary image", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let items = catalog::list_products(&state).await?;
    let total = items.len() as u64;
    Ok(Json(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(1, total, total)),
    )))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product with category, images and variants", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let product = catalog::get_product(&state, id).await?;
    Ok(Json(ApiResponse::item("Product", product)))
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Create product", body = ApiResponse<ProductDetail>),
        (status = 400, description = "Invalid product"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductDetail>>)> {
    let product = catalog::create_product(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::item("Product created", product)),
    ))
}

#[utoipa::path(
    patch,
    path = "/api/admin/products/{id}",
    params(("id" = i64, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated and reconciled", body = ApiResponse<ProductDetail>),
        (status = 400, description = "Invalid image or variant set"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "A removed variant is referenced by an order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let product = catalog::apply_product_update(&state, id, payload).await?;
    Ok(Json(ApiResponse::item("Updated", product)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    params(("id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product, images and variants deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product is referenced by an order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    if !catalog::delete_product(&state, id).await? {
        return Err(AppError::not_found(format!("Product {id}")));
    }
    Ok(Json(ApiResponse::item("Product deleted", Deleted { id })))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/images",
    params(("id" = i64, Path, description = "Product ID")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = ApiResponse<ProductImage>),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn upload_product_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductImage>>)> {
    let (filename, bytes) = read_file(multipart).await?;
    let image = catalog::upload_image(&state, id, &filename, bytes).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::item("Image uploaded", image)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/images/{image_id}",
    params(("image_id" = i64, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Image not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(image_id): Path<i64>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    if !catalog::delete_image(&state, image_id).await? {
        return Err(AppError::not_found(format!("Image {image_id}")));
    }
    Ok(Json(ApiResponse::item("Image deleted", Deleted { id: image_id })))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/images/{image_id}/set-primary",
    params(("image_id" = i64, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image is now the product's only primary", body = ApiResponse<ProductImage>),
        (status = 404, description = "Image not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn set_primary_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(image_id): Path<i64>,
) -> AppResult<Json<ApiResponse<ProductImage>>> {
    let image = catalog::set_primary_image(&state, image_id).await?;
    Ok(Json(ApiResponse::item("Primary image set", image)))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/variants",
    params(("id" = i64, Path, description = "Product ID")),
    request_body = CreateVariantRequest,
    responses(
        (status = 201, description = "Variant created", body = ApiResponse<ProductVariant>),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Variants"
)]
pub async fn create_variant(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<CreateVariantRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductVariant>>)> {
    let variant = catalog::create_variant(&state, id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::item("Variant created", variant)),
    ))
}

#[utoipa::path(
    patch,
    path = "/api/admin/products/variants/{variant_id}",
    params(("variant_id" = i64, Path, description = "Variant ID")),
    request_body = UpdateVariantRequest,
    responses(
        (status = 200, description = "Variant updated", body = ApiResponse<ProductVariant>),
        (status = 404, description = "Variant not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Variants"
)]
pub async fn update_variant(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(variant_id): Path<i64>,
    Json(payload): Json<UpdateVariantRequest>,
) -> AppResult<Json<ApiResponse<ProductVariant>>> {
    let variant = catalog::update_variant(&state, variant_id, payload).await?;
    Ok(Json(ApiResponse::item("Variant updated", variant)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/variants/{variant_id}",
    params(("variant_id" = i64, Path, description = "Variant ID")),
    responses(
        (status = 200, description = "Variant deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Variant not found"),
        (status = 409, description = "Variant is referenced by an order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Variants"
)]
pub async fn delete_variant(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(variant_id): Path<i64>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    if !catalog::delete_variant(&state, variant_id).await? {
        return Err(AppError::not_found(format!("Variant {variant_id}")));
    }
    Ok(Json(ApiResponse::item(
        "Variant deleted",
        Deleted { id: variant_id },
    )))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/variants/{variant_id}/image",
    params(("variant_id" = i64, Path, description = "Variant ID")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Variant image replaced", body = ApiResponse<ProductVariant>),
        (status = 404, description = "Variant not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Variants"
)]
pub async fn upload_variant_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(variant_id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<ProductVariant>>> {
    let (filename, bytes) = read_file(multipart).await?;
    let variant = catalog::upload_variant_image(&state, variant_id, &filename, bytes).await?;
    Ok(Json(ApiResponse::item("Variant image uploaded", variant)))
}
