use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::nullable;
use crate::models::{Category, Product, ProductImage, ProductVariant};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock_quantity: Option<i32>,
    pub category_id: Option<i64>,
}

/// Partial product update. `product_images` and `product_variants`, when present,
/// are the complete desired collections: anything left out is deleted. An explicit
/// `null` on `description` or `category_id` clears the column.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub price: Option<i64>,
    pub stock_quantity: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i64>)]
    pub category_id: Option<Option<i64>>,
    pub product_images: Option<Vec<ImageSelection>>,
    pub product_variants: Option<Vec<VariantUpsert>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ImageSelection {
    pub id: i64,
    #[serde(default)]
    pub is_primary: bool,
}

/// Without `id` the variant is created.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VariantUpsert {
    pub id: Option<i64>,
    pub name: String,
    pub stock_quantity: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVariantRequest {
    pub name: String,
    pub stock_quantity: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateVariantRequest {
    pub name: Option<String>,
    pub stock_quantity: Option<i32>,
}

/// A product with its category and owned collections.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub product_images: Vec<ProductImage>,
    pub product_variants: Vec<ProductVariant>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: Product,
    pub primary_image: Option<ProductImage>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<ProductSummary>)]
    pub items: Vec<ProductSummary>,
}

#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
