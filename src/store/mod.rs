//! Per-table data access.
//!
//! Every method maps to exactly one statement against one table. Nothing here spans
//! tables or statements; the services layer owns ordering and compensation.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Category, Customer, DeliveryArea, DeliveryCredential, LineItemTarget, Order, OrderItem,
    OrderStatus, Product, ProductImage, ProductVariant, ShippingMethod,
};

pub mod memory;
pub mod orm;

pub use memory::{MemoryStore, StoreOp};
pub use orm::OrmStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock_quantity: Option<i32>,
    pub category_id: Option<i64>,
}

/// `description` and `category_id` use `Some(None)` to write NULL.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<i64>,
    pub stock_quantity: Option<i32>,
    pub category_id: Option<Option<i64>>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock_quantity.is_none()
            && self.category_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewProductImage {
    pub product_id: i64,
    pub image_url: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone)]
pub struct NewVariant {
    pub product_id: i64,
    pub name: String,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
}

/// `image_url: Some(None)` clears the column.
#[derive(Debug, Clone, Default)]
pub struct VariantChanges {
    pub name: Option<String>,
    pub stock_quantity: Option<i32>,
    pub image_url: Option<Option<String>>,
}

impl VariantChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.stock_quantity.is_none() && self.image_url.is_none()
    }

    /// Changes that put every column back to `variant`'s values.
    pub fn restore(variant: &ProductVariant) -> Self {
        Self {
            name: Some(variant.name.clone()),
            stock_quantity: Some(variant.stock_quantity),
            image_url: Some(variant.image_url.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: i64,
    pub shipping_method: ShippingMethod,
    pub status: OrderStatus,
    pub comments: Option<String>,
    pub delivery_area_id: Option<i64>,
    pub delivery_fee: Option<i64>,
}

/// Nullable columns use `Some(None)` to write NULL.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub customer_id: Option<i64>,
    pub shipping_method: Option<ShippingMethod>,
    pub status: Option<OrderStatus>,
    pub comments: Option<Option<String>>,
    pub delivery_area_id: Option<Option<i64>>,
    pub delivery_fee: Option<Option<i64>>,
}

impl OrderChanges {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.shipping_method.is_none()
            && self.status.is_none()
            && self.comments.is_none()
            && self.delivery_area_id.is_none()
            && self.delivery_fee.is_none()
    }

    pub fn restore(order: &Order) -> Self {
        Self {
            customer_id: Some(order.customer_id),
            shipping_method: Some(order.shipping_method),
            status: Some(order.status),
            comments: Some(order.comments.clone()),
            delivery_area_id: Some(order.delivery_area_id),
            delivery_fee: Some(order.delivery_fee),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub order_id: i64,
    pub quantity: i32,
    pub target: LineItemTarget,
}

#[derive(Debug, Clone)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub limit: u64,
    pub offset: u64,
    pub newest_first: bool,
}

#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn find_product(&self, id: i64) -> StoreResult<Option<Product>>;
    async fn list_products(&self) -> StoreResult<Vec<Product>>;
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product>;
    async fn update_product(&self, id: i64, changes: ProductChanges)
    -> StoreResult<Option<Product>>;
    async fn delete_product(&self, id: i64) -> StoreResult<bool>;

    /// Images of a product ordered by `(created_at, id)`.
    async fn list_images(&self, product_id: i64) -> StoreResult<Vec<ProductImage>>;
    async fn list_primary_images(&self, product_ids: &[i64]) -> StoreResult<Vec<ProductImage>>;
    async fn find_image(&self, id: i64) -> StoreResult<Option<ProductImage>>;
    async fn insert_image(&self, image: NewProductImage) -> StoreResult<ProductImage>;
    async fn delete_images(&self, ids: &[i64]) -> StoreResult<u64>;
    /// Clears `is_primary` on every image of the product except `keep`.
    async fn clear_primary(&self, product_id: i64, keep: Option<i64>) -> StoreResult<u64>;
    async fn mark_primary(&self, image_id: i64) -> StoreResult<Option<ProductImage>>;

    async fn list_variants(&self, product_id: i64) -> StoreResult<Vec<ProductVariant>>;
    async fn find_variant(&self, id: i64) -> StoreResult<Option<ProductVariant>>;
    async fn insert_variants(&self, variants: Vec<NewVariant>)
    -> StoreResult<Vec<ProductVariant>>;
    async fn update_variant(
        &self,
        id: i64,
        changes: VariantChanges,
    ) -> StoreResult<Option<ProductVariant>>;
    async fn delete_variants(&self, ids: &[i64]) -> StoreResult<u64>;
}

#[async_trait]
pub trait OrderRepo: Send + Sync {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order>;
    async fn find_order(&self, id: i64) -> StoreResult<Option<Order>>;
    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>>;
    async fn count_orders(&self, status: Option<OrderStatus>) -> StoreResult<u64>;
    async fn update_order(&self, id: i64, changes: OrderChanges) -> StoreResult<Option<Order>>;
    async fn delete_order(&self, id: i64) -> StoreResult<bool>;

    async fn list_order_items(&self, order_id: i64) -> StoreResult<Vec<OrderItem>>;
    async fn insert_order_items(&self, items: Vec<NewOrderItem>) -> StoreResult<Vec<OrderItem>>;
    async fn delete_order_items(&self, order_id: i64) -> StoreResult<u64>;
    async fn delete_order_items_by_id(&self, ids: &[i64]) -> StoreResult<u64>;
    async fn find_items_by_variants(&self, variant_ids: &[i64]) -> StoreResult<Vec<OrderItem>>;
    async fn find_items_by_product(&self, product_id: i64) -> StoreResult<Vec<OrderItem>>;
}

#[async_trait]
pub trait ReferenceRepo: Send + Sync {
    async fn find_category(&self, id: i64) -> StoreResult<Option<Category>>;
    async fn insert_category(&self, name: String) -> StoreResult<Category>;
    async fn find_customer(&self, id: i64) -> StoreResult<Option<Customer>>;
    async fn insert_customer(
        &self,
        name: String,
        phone: Option<String>,
        address: Option<String>,
    ) -> StoreResult<Customer>;
    async fn find_delivery_area(&self, id: i64) -> StoreResult<Option<DeliveryArea>>;
    async fn insert_delivery_area(&self, name: String, delivery_fee: i64)
    -> StoreResult<DeliveryArea>;
}

#[async_trait]
pub trait CredentialRepo: Send + Sync {
    async fn delivery_credential(&self) -> StoreResult<Option<DeliveryCredential>>;
    /// Single upsert of the one credential row.
    async fn save_delivery_credential(&self, password_hash: String)
    -> StoreResult<DeliveryCredential>;
}

/// Everything the services need from persistence.
pub trait Store: CatalogRepo + OrderRepo + ReferenceRepo + CredentialRepo {}

impl<T> Store for T where T: CatalogRepo + OrderRepo + ReferenceRepo + CredentialRepo {}
