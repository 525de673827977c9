use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use super::{
    CatalogRepo, CredentialRepo, NewOrder, NewOrderItem, NewProduct, NewProductImage, NewVariant,
    OrderChanges, OrderQuery, OrderRepo, ProductChanges, ReferenceRepo, StoreError, StoreResult,
    VariantChanges,
};
use crate::{
    entity::{
        categories, customers, delivery_areas, delivery_credentials, order_items, orders,
        product_images, product_variants, products,
    },
    models::{
        Category, Customer, DeliveryArea, DeliveryCredential, LineItemTarget, Order, OrderItem,
        OrderStatus, Product, ProductImage, ProductVariant,
    },
};

/// Postgres-backed store. Each method issues one statement through SeaORM.
#[derive(Clone)]
pub struct OrmStore {
    conn: DatabaseConnection,
}

impl OrmStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CatalogRepo for OrmStore {
    async fn find_product(&self, id: i64) -> StoreResult<Option<Product>> {
        let model = products::Entity::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(product_from_entity))
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let models = products::Entity::find()
            .order_by_asc(products::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(models.into_iter().map(product_from_entity).collect())
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let model = products::ActiveModel {
            id: NotSet,
            name: Set(product.name),
            description: Set(product.description),
            price: Set(product.price),
            stock_quantity: Set(product.stock_quantity),
            category_id: Set(product.category_id),
            created_at: NotSet,
        }
        .insert(&self.conn)
        .await?;
        Ok(product_from_entity(model))
    }

    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
    ) -> StoreResult<Option<Product>> {
        if changes.is_empty() {
            return self.find_product(id).await;
        }

        let mut update = products::Entity::update_many().filter(products::Column::Id.eq(id));
        if let Some(name) = changes.name {
            update = update.col_expr(products::Column::Name, Expr::value(name));
        }
        if let Some(description) = changes.description {
            update = update.col_expr(products::Column::Description, Expr::value(description));
        }
        if let Some(price) = changes.price {
            update = update.col_expr(products::Column::Price, Expr::value(price));
        }
        if let Some(stock) = changes.stock_quantity {
            update = update.col_expr(products::Column::StockQuantity, Expr::value(stock));
        }
        if let Some(category_id) = changes.category_id {
            update = update.col_expr(products::Column::CategoryId, Expr::value(category_id));
        }

        let rows = update.exec_with_returning(&self.conn).await?;
        Ok(rows.into_iter().next().map(product_from_entity))
    }

    async fn delete_product(&self, id: i64) -> StoreResult<bool> {
        let result = products::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    async fn list_images(&self, product_id: i64) -> StoreResult<Vec<ProductImage>> {
        let models = product_images::Entity::find()
            .filter(product_images::Column::ProductId.eq(product_id))
            .order_by_asc(product_images::Column::CreatedAt)
            .order_by_asc(product_images::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(models.into_iter().map(image_from_entity).collect())
    }

    async fn list_primary_images(&self, product_ids: &[i64]) -> StoreResult<Vec<ProductImage>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = product_images::Entity::find()
            .filter(product_images::Column::ProductId.is_in(product_ids.to_vec()))
            .filter(product_images::Column::IsPrimary.eq(true))
            .order_by_asc(product_images::Column::CreatedAt)
            .order_by_asc(product_images::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(models.into_iter().map(image_from_entity).collect())
    }

    async fn find_image(&self, id: i64) -> StoreResult<Option<ProductImage>> {
        let model = product_images::Entity::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(image_from_entity))
    }

    async fn insert_image(&self, image: NewProductImage) -> StoreResult<ProductImage> {
        let model = product_images::ActiveModel {
            id: NotSet,
            product_id: Set(image.product_id),
            image_url: Set(image.image_url),
            is_primary: Set(image.is_primary),
            created_at: NotSet,
        }
        .insert(&self.conn)
        .await?;
        Ok(image_from_entity(model))
    }

    async fn delete_images(&self, ids: &[i64]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = product_images::Entity::delete_many()
            .filter(product_images::Column::Id.is_in(ids.to_vec()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    async fn clear_primary(&self, product_id: i64, keep: Option<i64>) -> StoreResult<u64> {
        let mut update = product_images::Entity::update_many()
            .col_expr(product_images::Column::IsPrimary, Expr::value(false))
            .filter(product_images::Column::ProductId.eq(product_id));
        if let Some(keep) = keep {
            update = update.filter(product_images::Column::Id.ne(keep));
        }
        let result = update.exec(&self.conn).await?;
        Ok(result.rows_affected)
    }

    async fn mark_primary(&self, image_id: i64) -> StoreResult<Option<ProductImage>> {
        let rows = product_images::Entity::update_many()
            .col_expr(product_images::Column::IsPrimary, Expr::value(true))
            .filter(product_images::Column::Id.eq(image_id))
            .exec_with_returning(&self.conn)
            .await?;
        Ok(rows.into_iter().next().map(image_from_entity))
    }

    async fn list_variants(&self, product_id: i64) -> StoreResult<Vec<ProductVariant>> {
        let models = product_variants::Entity::find()
            .filter(product_variants::Column::ProductId.eq(product_id))
            .order_by_asc(product_variants::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(models.into_iter().map(variant_from_entity).collect())
    }

    async fn find_variant(&self, id: i64) -> StoreResult<Option<ProductVariant>> {
        let model = product_variants::Entity::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(variant_from_entity))
    }

    async fn insert_variants(
        &self,
        variants: Vec<NewVariant>,
    ) -> StoreResult<Vec<ProductVariant>> {
        if variants.is_empty() {
            return Ok(Vec::new());
        }
        let models = variants.into_iter().map(|variant| product_variants::ActiveModel {
            id: NotSet,
            product_id: Set(variant.product_id),
            name: Set(variant.name),
            stock_quantity: Set(variant.stock_quantity),
            image_url: Set(variant.image_url),
        });
        let inserted = product_variants::Entity::insert_many(models)
            .exec_with_returning_many(&self.conn)
            .await?;
        Ok(inserted.into_iter().map(variant_from_entity).collect())
    }

    async fn update_variant(
        &self,
        id: i64,
        changes: VariantChanges,
    ) -> StoreResult<Option<ProductVariant>> {
        if changes.is_empty() {
            return self.find_variant(id).await;
        }

        let mut update =
            product_variants::Entity::update_many().filter(product_variants::Column::Id.eq(id));
        if let Some(name) = changes.name {
            update = update.col_expr(product_variants::Column::Name, Expr::value(name));
        }
        if let Some(stock) = changes.stock_quantity {
            update = update.col_expr(product_variants::Column::StockQuantity, Expr::value(stock));
        }
        if let Some(image_url) = changes.image_url {
            update = update.col_expr(product_variants::Column::ImageUrl, Expr::value(image_url));
        }

        let rows = update.exec_with_returning(&self.conn).await?;
        Ok(rows.into_iter().next().map(variant_from_entity))
    }

    async fn delete_variants(&self, ids: &[i64]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = product_variants::Entity::delete_many()
            .filter(product_variants::Column::Id.is_in(ids.to_vec()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl OrderRepo for OrmStore {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
        let model = orders::ActiveModel {
            id: NotSet,
            customer_id: Set(order.customer_id),
            shipping_method: Set(order.shipping_method.as_str().to_string()),
            status: Set(order.status.as_str().to_string()),
            comments: Set(order.comments),
            delivery_area_id: Set(order.delivery_area_id),
            delivery_fee: Set(order.delivery_fee),
            created_at: NotSet,
        }
        .insert(&self.conn)
        .await?;
        order_from_entity(model)
    }

    async fn find_order(&self, id: i64) -> StoreResult<Option<Order>> {
        orders::Entity::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let mut finder = orders::Entity::find();
        if let Some(status) = query.status {
            finder = finder.filter(orders::Column::Status.eq(status.as_str()));
        }
        finder = if query.newest_first {
            finder
                .order_by_desc(orders::Column::CreatedAt)
                .order_by_desc(orders::Column::Id)
        } else {
            finder
                .order_by_asc(orders::Column::CreatedAt)
                .order_by_asc(orders::Column::Id)
        };

        finder
            .limit(query.limit)
            .offset(query.offset)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect()
    }

    async fn count_orders(&self, status: Option<OrderStatus>) -> StoreResult<u64> {
        let mut finder = orders::Entity::find();
        if let Some(status) = status {
            finder = finder.filter(orders::Column::Status.eq(status.as_str()));
        }
        Ok(finder.count(&self.conn).await?)
    }

    async fn update_order(&self, id: i64, changes: OrderChanges) -> StoreResult<Option<Order>> {
        if changes.is_empty() {
            return self.find_order(id).await;
        }

        let mut update = orders::Entity::update_many().filter(orders::Column::Id.eq(id));
        if let Some(customer_id) = changes.customer_id {
            update = update.col_expr(orders::Column::CustomerId, Expr::value(customer_id));
        }
        if let Some(method) = changes.shipping_method {
            update = update.col_expr(orders::Column::ShippingMethod, Expr::value(method.as_str()));
        }
        if let Some(status) = changes.status {
            update = update.col_expr(orders::Column::Status, Expr::value(status.as_str()));
        }
        if let Some(comments) = changes.comments {
            update = update.col_expr(orders::Column::Comments, Expr::value(comments));
        }
        if let Some(area) = changes.delivery_area_id {
            update = update.col_expr(orders::Column::DeliveryAreaId, Expr::value(area));
        }
        if let Some(fee) = changes.delivery_fee {
            update = update.col_expr(orders::Column::DeliveryFee, Expr::value(fee));
        }

        update
            .exec_with_returning(&self.conn)
            .await?
            .into_iter()
            .next()
            .map(order_from_entity)
            .transpose()
    }

    async fn delete_order(&self, id: i64) -> StoreResult<bool> {
        let result = orders::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    async fn list_order_items(&self, order_id: i64) -> StoreResult<Vec<OrderItem>> {
        order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order_id))
            .order_by_asc(order_items::Column::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(order_item_from_entity)
            .collect()
    }

    async fn insert_order_items(&self, items: Vec<NewOrderItem>) -> StoreResult<Vec<OrderItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let models = items.into_iter().map(|item| {
            let (product_id, product_variant_id) = item.target.into_columns();
            order_items::ActiveModel {
                id: NotSet,
                order_id: Set(item.order_id),
                quantity: Set(item.quantity),
                product_id: Set(product_id),
                product_variant_id: Set(product_variant_id),
            }
        });
        order_items::Entity::insert_many(models)
            .exec_with_returning_many(&self.conn)
            .await?
            .into_iter()
            .map(order_item_from_entity)
            .collect()
    }

    async fn delete_order_items(&self, order_id: i64) -> StoreResult<u64> {
        let result = order_items::Entity::delete_many()
            .filter(order_items::Column::OrderId.eq(order_id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_order_items_by_id(&self, ids: &[i64]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = order_items::Entity::delete_many()
            .filter(order_items::Column::Id.is_in(ids.to_vec()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    async fn find_items_by_variants(&self, variant_ids: &[i64]) -> StoreResult<Vec<OrderItem>> {
        if variant_ids.is_empty() {
            return Ok(Vec::new());
        }
        order_items::Entity::find()
            .filter(order_items::Column::ProductVariantId.is_in(variant_ids.to_vec()))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(order_item_from_entity)
            .collect()
    }

    async fn find_items_by_product(&self, product_id: i64) -> StoreResult<Vec<OrderItem>> {
        order_items::Entity::find()
            .filter(order_items::Column::ProductId.eq(product_id))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(order_item_from_entity)
            .collect()
    }
}

#[async_trait]
impl ReferenceRepo for OrmStore {
    async fn find_category(&self, id: i64) -> StoreResult<Option<Category>> {
        let model = categories::Entity::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(|m| Category {
            id: m.id,
            name: m.name,
        }))
    }

    async fn insert_category(&self, name: String) -> StoreResult<Category> {
        let model = categories::ActiveModel {
            id: NotSet,
            name: Set(name),
        }
        .insert(&self.conn)
        .await?;
        Ok(Category {
            id: model.id,
            name: model.name,
        })
    }

    async fn find_customer(&self, id: i64) -> StoreResult<Option<Customer>> {
        let model = customers::Entity::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(customer_from_entity))
    }

    async fn insert_customer(
        &self,
        name: String,
        phone: Option<String>,
        address: Option<String>,
    ) -> StoreResult<Customer> {
        let model = customers::ActiveModel {
            id: NotSet,
            name: Set(name),
            phone: Set(phone),
            address: Set(address),
        }
        .insert(&self.conn)
        .await?;
        Ok(customer_from_entity(model))
    }

    async fn find_delivery_area(&self, id: i64) -> StoreResult<Option<DeliveryArea>> {
        let model = delivery_areas::Entity::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(|m| DeliveryArea {
            id: m.id,
            name: m.name,
            delivery_fee: m.delivery_fee,
        }))
    }

    async fn insert_delivery_area(
        &self,
        name: String,
        delivery_fee: i64,
    ) -> StoreResult<DeliveryArea> {
        let model = delivery_areas::ActiveModel {
            id: NotSet,
            name: Set(name),
            delivery_fee: Set(delivery_fee),
        }
        .insert(&self.conn)
        .await?;
        Ok(DeliveryArea {
            id: model.id,
            name: model.name,
            delivery_fee: model.delivery_fee,
        })
    }
}

#[async_trait]
impl CredentialRepo for OrmStore {
    async fn delivery_credential(&self) -> StoreResult<Option<DeliveryCredential>> {
        let model = delivery_credentials::Entity::find_by_id(delivery_credentials::SINGLETON_ID)
            .one(&self.conn)
            .await?;
        Ok(model.map(credential_from_entity))
    }

    async fn save_delivery_credential(
        &self,
        password_hash: String,
    ) -> StoreResult<DeliveryCredential> {
        let model = delivery_credentials::ActiveModel {
            id: Set(delivery_credentials::SINGLETON_ID),
            password_hash: Set(password_hash),
            updated_at: Set(Utc::now().into()),
        };
        let saved = delivery_credentials::Entity::insert(model)
            .on_conflict(
                OnConflict::column(delivery_credentials::Column::Id)
                    .update_columns([
                        delivery_credentials::Column::PasswordHash,
                        delivery_credentials::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(&self.conn)
            .await?;
        Ok(credential_from_entity(saved))
    }
}

fn product_from_entity(model: products::Model) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock_quantity: model.stock_quantity,
        category_id: model.category_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn image_from_entity(model: product_images::Model) -> ProductImage {
    ProductImage {
        id: model.id,
        product_id: model.product_id,
        image_url: model.image_url,
        is_primary: model.is_primary,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn variant_from_entity(model: product_variants::Model) -> ProductVariant {
    ProductVariant {
        id: model.id,
        product_id: model.product_id,
        name: model.name,
        stock_quantity: model.stock_quantity,
        image_url: model.image_url,
    }
}

fn customer_from_entity(model: customers::Model) -> Customer {
    Customer {
        id: model.id,
        name: model.name,
        phone: model.phone,
        address: model.address,
    }
}

fn credential_from_entity(model: delivery_credentials::Model) -> DeliveryCredential {
    DeliveryCredential {
        password_hash: model.password_hash,
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_from_entity(model: orders::Model) -> StoreResult<Order> {
    let id = model.id;
    let corrupt = move |detail: String| StoreError::Corrupt {
        table: "orders",
        detail: format!("order {id}: {detail}"),
    };
    let shipping_method = model.shipping_method.parse().map_err(corrupt)?;
    let status = model.status.parse().map_err(corrupt)?;
    Ok(Order {
        id: model.id,
        customer_id: model.customer_id,
        shipping_method,
        status,
        comments: model.comments,
        delivery_area_id: model.delivery_area_id,
        delivery_fee: model.delivery_fee,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: order_items::Model) -> StoreResult<OrderItem> {
    let target = LineItemTarget::from_columns(model.product_id, model.product_variant_id)
        .ok_or_else(|| StoreError::Corrupt {
            table: "order_items",
            detail: format!("item {} must reference exactly one of product/variant", model.id),
        })?;
    Ok(OrderItem {
        id: model.id,
        order_id: model.order_id,
        quantity: model.quantity,
        target,
    })
}
