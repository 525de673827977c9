#![allow(dead_code)]

use std::sync::Arc;

use storefront_api::{
    blob::MemoryBlobStorage,
    config::AuthConfig,
    dto::orders::{CreateOrderRequest, OrderItemInput},
    models::{Customer, Product, ProductImage, ProductVariant, ShippingMethod},
    services::{auth::AccessGate, catalog},
    state::AppState,
    store::{CatalogRepo, MemoryStore, NewProduct, NewVariant, ReferenceRepo},
};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-secret";
pub const JWT_SECRET: &str = "test-jwt-secret";

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: JWT_SECRET.to_string(),
        admin_email: ADMIN_EMAIL.to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        token_ttl_minutes: 60,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStorage>,
}

impl TestApp {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_store(MemoryStore::new())
    }

    /// Every store call yields first, so joined futures really interleave.
    pub fn interleaved() -> anyhow::Result<Self> {
        Self::with_store(MemoryStore::interleaved())
    }

    fn with_store(store: MemoryStore) -> anyhow::Result<Self> {
        let store = Arc::new(store);
        let blobs = Arc::new(MemoryBlobStorage::new());
        let gate = AccessGate::new(&auth_config())?;
        let state = AppState::new(store.clone(), blobs.clone(), gate);
        Ok(Self {
            state,
            store,
            blobs,
        })
    }

    pub async fn product(&self, name: &str) -> anyhow::Result<Product> {
        Ok(self
            .store
            .insert_product(NewProduct {
                name: name.to_string(),
                description: None,
                price: 1000,
                stock_quantity: Some(5),
                category_id: None,
            })
            .await?)
    }

    pub async fn variant(&self, product_id: i64, name: &str) -> anyhow::Result<ProductVariant> {
        let mut rows = self
            .store
            .insert_variants(vec![NewVariant {
                product_id,
                name: name.to_string(),
                stock_quantity: 3,
                image_url: None,
            }])
            .await?;
        rows.pop().ok_or_else(|| anyhow::anyhow!("no variant inserted"))
    }

    pub async fn upload(&self, product_id: i64, filename: &str) -> anyhow::Result<ProductImage> {
        Ok(catalog::upload_image(&self.state, product_id, filename, vec![0xFF, 0xD8, 0xFF]).await?)
    }

    pub async fn customer(&self) -> anyhow::Result<Customer> {
        Ok(self
            .store
            .insert_customer("Dana".to_string(), Some("+15550100".to_string()), None)
            .await?)
    }

    pub async fn images(&self, product_id: i64) -> anyhow::Result<Vec<ProductImage>> {
        Ok(self.store.list_images(product_id).await?)
    }

    pub async fn primary_ids(&self, product_id: i64) -> anyhow::Result<Vec<i64>> {
        Ok(self
            .images(product_id)
            .await?
            .into_iter()
            .filter(|image| image.is_primary)
            .map(|image| image.id)
            .collect())
    }
}

pub fn product_item(product_id: i64, quantity: i32) -> OrderItemInput {
    OrderItemInput {
        product_id: Some(product_id),
        product_variant_id: None,
        quantity,
    }
}

pub fn variant_item(variant_id: i64, quantity: i32) -> OrderItemInput {
    OrderItemInput {
        product_id: None,
        product_variant_id: Some(variant_id),
        quantity,
    }
}

pub fn order_request(customer_id: i64, items: Vec<OrderItemInput>) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id,
        shipping_method: ShippingMethod::PickUp,
        status: None,
        comments: None,
        delivery_area_id: None,
        delivery_fee: None,
        order_items: items,
    }
}
