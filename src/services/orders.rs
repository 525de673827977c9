//! Order writes spanning the header and item tables.
//!
//! Each multi-step write is ordered so every applied step has a single-call inverse,
//! and a failure undoes what ran before reporting the original error.

use std::collections::BTreeSet;

use crate::{
    dto::orders::{
        CreateOrderRequest, OrderDetail, OrderItemDetail, OrderItemInput, UpdateOrderRequest,
    },
    error::{AppError, AppResult},
    models::{LineItemTarget, Order, OrderItem},
    response::Meta,
    routes::params::OrderListQuery,
    services::saga::compensate,
    state::AppState,
    store::{NewOrder, NewOrderItem, OrderChanges, OrderQuery, Store},
};

/// A line item that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ValidItem {
    pub target: LineItemTarget,
    pub quantity: i32,
}

impl ValidItem {
    fn attach(self, order_id: i64) -> NewOrderItem {
        NewOrderItem {
            order_id,
            quantity: self.quantity,
            target: self.target,
        }
    }
}

pub(crate) fn validate_items(inputs: &[OrderItemInput]) -> AppResult<Vec<ValidItem>> {
    if inputs.is_empty() {
        return Err(AppError::Validation(
            "an order needs at least one item".into(),
        ));
    }
    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let target = input.target().map_err(|err| match err {
                AppError::Validation(msg) => {
                    AppError::Validation(format!("order_items[{index}]: {msg}"))
                }
                other => other,
            })?;
            if input.quantity <= 0 {
                return Err(AppError::Validation(format!(
                    "order_items[{index}]: quantity must be positive"
                )));
            }
            Ok(ValidItem {
                target,
                quantity: input.quantity,
            })
        })
        .collect()
}

fn validate_fee(delivery_fee: Option<i64>) -> AppResult<()> {
    if delivery_fee.is_some_and(|fee| fee < 0) {
        return Err(AppError::Validation(
            "delivery_fee must not be negative".into(),
        ));
    }
    Ok(())
}

/// NotFound for the first referenced row that does not exist. Read-only, so it runs
/// before any write.
async fn ensure_references(
    store: &dyn Store,
    customer_id: Option<i64>,
    delivery_area_id: Option<i64>,
    items: &[ValidItem],
) -> AppResult<()> {
    if let Some(customer_id) = customer_id {
        store
            .find_customer(customer_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Customer {customer_id}")))?;
    }
    if let Some(area_id) = delivery_area_id {
        store
            .find_delivery_area(area_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Delivery area {area_id}")))?;
    }

    let targets: BTreeSet<LineItemTarget> = items.iter().map(|item| item.target).collect();
    for target in targets {
        let missing = match target {
            LineItemTarget::Product(id) => {
                store.find_product(id).await?.is_none().then(|| format!("Product {id}"))
            }
            LineItemTarget::Variant(id) => {
                store.find_variant(id).await?.is_none().then(|| format!("Variant {id}"))
            }
        };
        if let Some(what) = missing {
            return Err(AppError::not_found(what));
        }
    }
    Ok(())
}

/// Header first, then all items in one call. If the items cannot be written the
/// header is deleted again, so no order ever exists without its items.
pub async fn create_order(state: &AppState, payload: CreateOrderRequest) -> AppResult<OrderDetail> {
    let store = state.store.as_ref();
    let items = validate_items(&payload.order_items)?;
    validate_fee(payload.delivery_fee)?;
    ensure_references(
        store,
        Some(payload.customer_id),
        payload.delivery_area_id,
        &items,
    )
    .await?;

    let order = store
        .insert_order(NewOrder {
            customer_id: payload.customer_id,
            shipping_method: payload.shipping_method,
            status: payload.status.unwrap_or_default(),
            comments: payload.comments,
            delivery_area_id: payload.delivery_area_id,
            delivery_fee: payload.delivery_fee,
        })
        .await?;

    let new_items = items.into_iter().map(|item| item.attach(order.id)).collect();
    if let Err(err) = store.insert_order_items(new_items).await {
        return Err(compensate(err.into(), "order_items_insert", store.delete_order(order.id)).await);
    }

    tracing::info!(order_id = order.id, "order created");
    load_order_detail(store, order.id).await
}

/// Applies header changes, then replaces the item set when one is given.
///
/// Replacement inserts the new items before deleting the old ids, so an order is
/// never left empty: a failed insert only needs the header restored, a failed delete
/// removes the new ids and restores the header.
pub async fn update_order(
    state: &AppState,
    order_id: i64,
    patch: UpdateOrderRequest,
) -> AppResult<OrderDetail> {
    let store = state.store.as_ref();
    let before = store
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;
    let replacement = patch.order_items.as_deref().map(validate_items).transpose()?;
    validate_fee(patch.delivery_fee.flatten())?;
    ensure_references(
        store,
        patch.customer_id,
        patch.delivery_area_id.flatten(),
        replacement.as_deref().unwrap_or_default(),
    )
    .await?;

    let changes = OrderChanges {
        customer_id: patch.customer_id,
        shipping_method: patch.shipping_method,
        status: patch.status,
        comments: patch.comments,
        delivery_area_id: patch.delivery_area_id,
        delivery_fee: patch.delivery_fee,
    };
    let header_changed = !changes.is_empty();
    if header_changed {
        store
            .update_order(order_id, changes)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;
    }

    if let Some(items) = replacement {
        replace_items(store, &before, header_changed, items).await?;
    }

    tracing::info!(order_id, "order updated");
    load_order_detail(store, order_id).await
}

async fn replace_items(
    store: &dyn Store,
    before: &Order,
    header_changed: bool,
    items: Vec<ValidItem>,
) -> AppResult<()> {
    let restore_header = move || async move {
        if header_changed {
            store
                .update_order(before.id, OrderChanges::restore(before))
                .await?;
        }
        Ok::<_, AppError>(())
    };

    let old_ids: Vec<i64> = match store.list_order_items(before.id).await {
        Ok(old) => old.iter().map(|item| item.id).collect(),
        Err(err) => return Err(compensate(err.into(), "order_items_read", restore_header()).await),
    };

    let new_items = items.into_iter().map(|item| item.attach(before.id)).collect();
    let new_ids: Vec<i64> = match store.insert_order_items(new_items).await {
        Ok(inserted) => inserted.iter().map(|item| item.id).collect(),
        Err(err) => {
            return Err(compensate(err.into(), "order_items_insert", restore_header()).await);
        }
    };

    if let Err(err) = store.delete_order_items_by_id(&old_ids).await {
        let undo = async {
            store.delete_order_items_by_id(&new_ids).await?;
            restore_header().await
        };
        return Err(compensate(err.into(), "order_items_delete", undo).await);
    }
    tracing::debug!(
        order_id = before.id,
        removed = old_ids.len(),
        added = new_ids.len(),
        "order items replaced"
    );
    Ok(())
}

/// Items first, then the header. True iff the header existed.
pub async fn delete_order(state: &AppState, order_id: i64) -> AppResult<bool> {
    let store = state.store.as_ref();
    store.delete_order_items(order_id).await?;
    let deleted = store.delete_order(order_id).await?;
    if deleted {
        tracing::info!(order_id, "order deleted");
    }
    Ok(deleted)
}

pub async fn get_order(state: &AppState, order_id: i64) -> AppResult<OrderDetail> {
    load_order_detail(state.store.as_ref(), order_id).await
}

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<(Vec<OrderDetail>, Meta)> {
    let store = state.store.as_ref();
    let (page, limit, offset) = query.pagination().normalize();
    let total = store.count_orders(query.status).await?;
    let orders = store
        .list_orders(&OrderQuery {
            status: query.status,
            limit,
            offset,
            newest_first: query.newest_first(),
        })
        .await?;

    let mut details = Vec::with_capacity(orders.len());
    for order in orders {
        details.push(assemble(store, order).await?);
    }
    Ok((details, Meta::new(page, limit, total)))
}

async fn load_order_detail(store: &dyn Store, order_id: i64) -> AppResult<OrderDetail> {
    let order = store
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {order_id}")))?;
    assemble(store, order).await
}

async fn assemble(store: &dyn Store, order: Order) -> AppResult<OrderDetail> {
    let customer = store.find_customer(order.customer_id).await?;
    let delivery_area = match order.delivery_area_id {
        Some(area_id) => store.find_delivery_area(area_id).await?,
        None => None,
    };
    let items = store.list_order_items(order.id).await?;
    let mut order_items = Vec::with_capacity(items.len());
    for item in items {
        order_items.push(item_detail(store, item).await?);
    }
    Ok(OrderDetail {
        order,
        customer,
        delivery_area,
        order_items,
    })
}

async fn item_detail(store: &dyn Store, item: OrderItem) -> AppResult<OrderItemDetail> {
    let (product, product_variant) = match item.target {
        LineItemTarget::Product(product_id) => (store.find_product(product_id).await?, None),
        LineItemTarget::Variant(variant_id) => {
            let variant = store.find_variant(variant_id).await?;
            let product = match &variant {
                Some(variant) => store.find_product(variant.product_id).await?,
                None => None,
            };
            (product, variant)
        }
    };

    let mut image_url = product_variant
        .as_ref()
        .and_then(|variant| variant.image_url.clone());
    if image_url.is_none() {
        if let Some(product) = &product {
            image_url = store
                .list_primary_images(&[product.id])
                .await?
                .into_iter()
                .next()
                .map(|image| image.image_url);
        }
    }

    Ok(OrderItemDetail {
        id: item.id,
        quantity: item.quantity,
        target: item.target,
        product,
        product_variant,
        image_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(product: Option<i64>, variant: Option<i64>, quantity: i32) -> OrderItemInput {
        OrderItemInput {
            product_id: product,
            product_variant_id: variant,
            quantity,
        }
    }

    #[test]
    fn items_need_exactly_one_target() {
        assert!(validate_items(&[input(Some(1), Some(2), 1)]).is_err());
        assert!(validate_items(&[input(None, None, 1)]).is_err());

        let items = validate_items(&[input(Some(1), None, 2), input(None, Some(9), 1)]).unwrap();
        assert_eq!(items[0].target, LineItemTarget::Product(1));
        assert_eq!(items[1].target, LineItemTarget::Variant(9));
    }

    #[test]
    fn empty_and_non_positive_items_are_rejected() {
        assert!(validate_items(&[]).is_err());
        let err = validate_items(&[input(Some(1), None, 1), input(Some(1), None, 0)]).unwrap_err();
        assert!(err.to_string().contains("order_items[1]"));
    }

    #[test]
    fn negative_fee_is_rejected() {
        assert!(validate_fee(Some(-1)).is_err());
        assert!(validate_fee(Some(0)).is_ok());
        assert!(validate_fee(None).is_ok());
    }
}
