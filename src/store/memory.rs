//! In-process store used by the test suite and by `storefront-api` when no
//! `DATABASE_URL` is configured.
//!
//! Each method takes the table lock once, so calls keep the single-statement
//! atomicity of the real store and nothing more. Failures can be injected per
//! write operation, [`MemoryStore::before_next`] runs a one-shot action ahead of a
//! write, and [`MemoryStore::interleaved`] yields to the scheduler before every call
//! so concurrent requests actually overlap.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::{
    CatalogRepo, CredentialRepo, NewOrder, NewOrderItem, NewProduct, NewProductImage, NewVariant,
    OrderChanges, OrderQuery, OrderRepo, ProductChanges, ReferenceRepo, StoreError, StoreResult,
    VariantChanges,
};
use crate::models::{
    Category, Customer, DeliveryArea, DeliveryCredential, LineItemTarget, Order, OrderItem,
    OrderStatus, Product, ProductImage, ProductVariant,
};

/// Write operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    InsertProduct,
    UpdateProduct,
    DeleteProduct,
    InsertImage,
    DeleteImages,
    ClearPrimary,
    MarkPrimary,
    InsertVariants,
    UpdateVariant,
    DeleteVariants,
    InsertOrder,
    UpdateOrder,
    DeleteOrder,
    InsertOrderItems,
    DeleteOrderItems,
    SaveCredential,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    categories: BTreeMap<i64, Category>,
    products: BTreeMap<i64, Product>,
    images: BTreeMap<i64, ProductImage>,
    variants: BTreeMap<i64, ProductVariant>,
    customers: BTreeMap<i64, Customer>,
    delivery_areas: BTreeMap<i64, DeliveryArea>,
    orders: BTreeMap<i64, Order>,
    order_items: BTreeMap<i64, OrderItem>,
    credential: Option<DeliveryCredential>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Hook = Box<dyn FnOnce() -> HookFuture + Send>;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<StoreOp>>,
    hooks: Mutex<HashMap<StoreOp, Hook>>,
    interleave: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that yields before every call.
    pub fn interleaved() -> Self {
        Self {
            interleave: true,
            ..Self::default()
        }
    }

    /// Makes every subsequent `op` fail until [`MemoryStore::heal`] is called.
    pub fn fail(&self, op: StoreOp) {
        self.failing().insert(op);
    }

    pub fn heal(&self, op: StoreOp) {
        self.failing().remove(&op);
    }

    /// Runs `hook` once, right before the next `op` is applied. The hook may call
    /// back into the store.
    pub fn before_next<F, Fut>(&self, op: StoreOp, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let hook: Hook = Box::new(move || -> HookFuture { Box::pin(hook()) });
        self.hooks().insert(op, hook);
    }

    fn failing(&self) -> MutexGuard<'_, HashSet<StoreOp>> {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hooks(&self) -> MutexGuard<'_, HashMap<StoreOp, Hook>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, op: Option<StoreOp>) -> StoreResult<()> {
        if self.interleave {
            tokio::task::yield_now().await;
        }
        let hook = op.and_then(|op| self.hooks().remove(&op));
        if let Some(hook) = hook {
            hook().await;
        }
        match op {
            Some(op) if self.failing().contains(&op) => {
                Err(StoreError::Unavailable(format!("{op:?} rejected")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogRepo for MemoryStore {
    async fn find_product(&self, id: i64) -> StoreResult<Option<Product>> {
        self.enter(None).await?;
        Ok(self.tables().products.get(&id).cloned())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        self.enter(None).await?;
        Ok(self.tables().products.values().cloned().collect())
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        self.enter(Some(StoreOp::InsertProduct)).await?;
        let mut tables = self.tables();
        let row = Product {
            id: tables.next_id(),
            name: product.name,
            description: product.description,
            price: product.price,
            stock_quantity: product.stock_quantity,
            category_id: product.category_id,
            created_at: Utc::now(),
        };
        tables.products.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
    ) -> StoreResult<Option<Product>> {
        self.enter(Some(StoreOp::UpdateProduct)).await?;
        let mut tables = self.tables();
        let Some(row) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(description) = changes.description {
            row.description = description;
        }
        if let Some(price) = changes.price {
            row.price = price;
        }
        if let Some(stock) = changes.stock_quantity {
            row.stock_quantity = Some(stock);
        }
        if let Some(category_id) = changes.category_id {
            row.category_id = category_id;
        }
        Ok(Some(row.clone()))
    }

    async fn delete_product(&self, id: i64) -> StoreResult<bool> {
        self.enter(Some(StoreOp::DeleteProduct)).await?;
        Ok(self.tables().products.remove(&id).is_some())
    }

    async fn list_images(&self, product_id: i64) -> StoreResult<Vec<ProductImage>> {
        self.enter(None).await?;
        let mut images: Vec<ProductImage> = self
            .tables()
            .images
            .values()
            .filter(|image| image.product_id == product_id)
            .cloned()
            .collect();
        images.sort_by_key(ProductImage::promotion_key);
        Ok(images)
    }

    async fn list_primary_images(&self, product_ids: &[i64]) -> StoreResult<Vec<ProductImage>> {
        self.enter(None).await?;
        let mut images: Vec<ProductImage> = self
            .tables()
            .images
            .values()
            .filter(|image| image.is_primary && product_ids.contains(&image.product_id))
            .cloned()
            .collect();
        images.sort_by_key(ProductImage::promotion_key);
        Ok(images)
    }

    async fn find_image(&self, id: i64) -> StoreResult<Option<ProductImage>> {
        self.enter(None).await?;
        Ok(self.tables().images.get(&id).cloned())
    }

    async fn insert_image(&self, image: NewProductImage) -> StoreResult<ProductImage> {
        self.enter(Some(StoreOp::InsertImage)).await?;
        let mut tables = self.tables();
        let row = ProductImage {
            id: tables.next_id(),
            product_id: image.product_id,
            image_url: image.image_url,
            is_primary: image.is_primary,
            created_at: Utc::now(),
        };
        tables.images.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_images(&self, ids: &[i64]) -> StoreResult<u64> {
        self.enter(Some(StoreOp::DeleteImages)).await?;
        let mut tables = self.tables();
        let removed = ids
            .iter()
            .filter(|id| tables.images.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn clear_primary(&self, product_id: i64, keep: Option<i64>) -> StoreResult<u64> {
        self.enter(Some(StoreOp::ClearPrimary)).await?;
        let mut tables = self.tables();
        let mut touched = 0;
        for image in tables.images.values_mut() {
            if image.product_id == product_id && Some(image.id) != keep {
                image.is_primary = false;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn mark_primary(&self, image_id: i64) -> StoreResult<Option<ProductImage>> {
        self.enter(Some(StoreOp::MarkPrimary)).await?;
        let mut tables = self.tables();
        Ok(tables.images.get_mut(&image_id).map(|image| {
            image.is_primary = true;
            image.clone()
        }))
    }

    async fn list_variants(&self, product_id: i64) -> StoreResult<Vec<ProductVariant>> {
        self.enter(None).await?;
        Ok(self
            .tables()
            .variants
            .values()
            .filter(|variant| variant.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn find_variant(&self, id: i64) -> StoreResult<Option<ProductVariant>> {
        self.enter(None).await?;
        Ok(self.tables().variants.get(&id).cloned())
    }

    async fn insert_variants(
        &self,
        variants: Vec<NewVariant>,
    ) -> StoreResult<Vec<ProductVariant>> {
        self.enter(Some(StoreOp::InsertVariants)).await?;
        let mut tables = self.tables();
        let mut inserted = Vec::with_capacity(variants.len());
        for variant in variants {
            let row = ProductVariant {
                id: tables.next_id(),
                product_id: variant.product_id,
                name: variant.name,
                stock_quantity: variant.stock_quantity,
                image_url: variant.image_url,
            };
            tables.variants.insert(row.id, row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn update_variant(
        &self,
        id: i64,
        changes: VariantChanges,
    ) -> StoreResult<Option<ProductVariant>> {
        self.enter(Some(StoreOp::UpdateVariant)).await?;
        let mut tables = self.tables();
        let Some(row) = tables.variants.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(stock) = changes.stock_quantity {
            row.stock_quantity = stock;
        }
        if let Some(image_url) = changes.image_url {
            row.image_url = image_url;
        }
        Ok(Some(row.clone()))
    }

    async fn delete_variants(&self, ids: &[i64]) -> StoreResult<u64> {
        self.enter(Some(StoreOp::DeleteVariants)).await?;
        let mut tables = self.tables();
        let removed = ids
            .iter()
            .filter(|id| tables.variants.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[async_trait]
impl OrderRepo for MemoryStore {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
        self.enter(Some(StoreOp::InsertOrder)).await?;
        let mut tables = self.tables();
        let row = Order {
            id: tables.next_id(),
            customer_id: order.customer_id,
            shipping_method: order.shipping_method,
            status: order.status,
            comments: order.comments,
            delivery_area_id: order.delivery_area_id,
            delivery_fee: order.delivery_fee,
            created_at: Utc::now(),
        };
        tables.orders.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_order(&self, id: i64) -> StoreResult<Option<Order>> {
        self.enter(None).await?;
        Ok(self.tables().orders.get(&id).cloned())
    }

    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        self.enter(None).await?;
        let mut orders: Vec<Order> = self
            .tables()
            .orders
            .values()
            .filter(|order| query.status.is_none_or(|status| order.status == status))
            .cloned()
            .collect();
        orders.sort_by_key(|order| (order.created_at, order.id));
        if query.newest_first {
            orders.reverse();
        }
        Ok(orders
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn count_orders(&self, status: Option<OrderStatus>) -> StoreResult<u64> {
        self.enter(None).await?;
        let count = self
            .tables()
            .orders
            .values()
            .filter(|order| status.is_none_or(|status| order.status == status))
            .count();
        Ok(count as u64)
    }

    async fn update_order(&self, id: i64, changes: OrderChanges) -> StoreResult<Option<Order>> {
        self.enter(Some(StoreOp::UpdateOrder)).await?;
        let mut tables = self.tables();
        let Some(row) = tables.orders.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(customer_id) = changes.customer_id {
            row.customer_id = customer_id;
        }
        if let Some(method) = changes.shipping_method {
            row.shipping_method = method;
        }
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(comments) = changes.comments {
            row.comments = comments;
        }
        if let Some(area) = changes.delivery_area_id {
            row.delivery_area_id = area;
        }
        if let Some(fee) = changes.delivery_fee {
            row.delivery_fee = fee;
        }
        Ok(Some(row.clone()))
    }

    async fn delete_order(&self, id: i64) -> StoreResult<bool> {
        self.enter(Some(StoreOp::DeleteOrder)).await?;
        Ok(self.tables().orders.remove(&id).is_some())
    }

    async fn list_order_items(&self, order_id: i64) -> StoreResult<Vec<OrderItem>> {
        self.enter(None).await?;
        Ok(self
            .tables()
            .order_items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_order_items(&self, items: Vec<NewOrderItem>) -> StoreResult<Vec<OrderItem>> {
        self.enter(Some(StoreOp::InsertOrderItems)).await?;
        let mut tables = self.tables();
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = OrderItem {
                id: tables.next_id(),
                order_id: item.order_id,
                quantity: item.quantity,
                target: item.target,
            };
            tables.order_items.insert(row.id, row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn delete_order_items(&self, order_id: i64) -> StoreResult<u64> {
        self.enter(Some(StoreOp::DeleteOrderItems)).await?;
        let mut tables = self.tables();
        let before = tables.order_items.len();
        tables.order_items.retain(|_, item| item.order_id != order_id);
        Ok((before - tables.order_items.len()) as u64)
    }

    async fn delete_order_items_by_id(&self, ids: &[i64]) -> StoreResult<u64> {
        self.enter(Some(StoreOp::DeleteOrderItems)).await?;
        let mut tables = self.tables();
        let removed = ids
            .iter()
            .filter(|id| tables.order_items.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn find_items_by_variants(&self, variant_ids: &[i64]) -> StoreResult<Vec<OrderItem>> {
        self.enter(None).await?;
        Ok(self
            .tables()
            .order_items
            .values()
            .filter(|item| {
                item.target
                    .variant_id()
                    .is_some_and(|id| variant_ids.contains(&id))
            })
            .cloned()
            .collect())
    }

    async fn find_items_by_product(&self, product_id: i64) -> StoreResult<Vec<OrderItem>> {
        self.enter(None).await?;
        Ok(self
            .tables()
            .order_items
            .values()
            .filter(|item| item.target == LineItemTarget::Product(product_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReferenceRepo for MemoryStore {
    async fn find_category(&self, id: i64) -> StoreResult<Option<Category>> {
        self.enter(None).await?;
        Ok(self.tables().categories.get(&id).cloned())
    }

    async fn insert_category(&self, name: String) -> StoreResult<Category> {
        self.enter(None).await?;
        let mut tables = self.tables();
        let row = Category {
            id: tables.next_id(),
            name,
        };
        tables.categories.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_customer(&self, id: i64) -> StoreResult<Option<Customer>> {
        self.enter(None).await?;
        Ok(self.tables().customers.get(&id).cloned())
    }

    async fn insert_customer(
        &self,
        name: String,
        phone: Option<String>,
        address: Option<String>,
    ) -> StoreResult<Customer> {
        self.enter(None).await?;
        let mut tables = self.tables();
        let row = Customer {
            id: tables.next_id(),
            name,
            phone,
            address,
        };
        tables.customers.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_delivery_area(&self, id: i64) -> StoreResult<Option<DeliveryArea>> {
        self.enter(None).await?;
        Ok(self.tables().delivery_areas.get(&id).cloned())
    }

    async fn insert_delivery_area(
        &self,
        name: String,
        delivery_fee: i64,
    ) -> StoreResult<DeliveryArea> {
        self.enter(None).await?;
        let mut tables = self.tables();
        let row = DeliveryArea {
            id: tables.next_id(),
            name,
            delivery_fee,
        };
        tables.delivery_areas.insert(row.id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl CredentialRepo for MemoryStore {
    async fn delivery_credential(&self) -> StoreResult<Option<DeliveryCredential>> {
        self.enter(None).await?;
        Ok(self.tables().credential.clone())
    }

    async fn save_delivery_credential(
        &self,
        password_hash: String,
    ) -> StoreResult<DeliveryCredential> {
        self.enter(Some(StoreOp::SaveCredential)).await?;
        let credential = DeliveryCredential {
            password_hash,
            updated_at: Utc::now(),
        };
        self.tables().credential = Some(credential.clone());
        Ok(credential)
    }
}
