use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::nullable;
use crate::{
    error::{AppError, AppResult},
    models::{
        Customer, DeliveryArea, LineItemTarget, Order, OrderStatus, Product, ProductVariant,
        ShippingMethod,
    },
};

/// Wire shape of a line item. Converted to [`LineItemTarget`] before anything is written.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Option<i64>,
    pub product_variant_id: Option<i64>,
    pub quantity: i32,
}

impl OrderItemInput {
    pub fn target(&self) -> AppResult<LineItemTarget> {
        LineItemTarget::from_columns(self.product_id, self.product_variant_id).ok_or_else(|| {
            AppError::Validation(
                "an order item must reference exactly one of product_id or product_variant_id"
                    .into(),
            )
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: i64,
    pub shipping_method: ShippingMethod,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    pub comments: Option<String>,
    pub delivery_area_id: Option<i64>,
    pub delivery_fee: Option<i64>,
    pub order_items: Vec<OrderItemInput>,
}

/// `order_items`, when present, replaces the whole item set. An explicit `null` on
/// `comments`, `delivery_area_id` or `delivery_fee` clears the column.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub customer_id: Option<i64>,
    pub shipping_method: Option<ShippingMethod>,
    pub status: Option<OrderStatus>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub comments: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i64>)]
    pub delivery_area_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i64>)]
    pub delivery_fee: Option<Option<i64>>,
    pub order_items: Option<Vec<OrderItemInput>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemDetail {
    pub id: i64,
    pub quantity: i32,
    pub target: LineItemTarget,
    pub product: Option<Product>,
    pub product_variant: Option<ProductVariant>,
    /// Variant image if it has one, else the product's primary image.
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<Customer>,
    pub delivery_area: Option<DeliveryArea>,
    pub order_items: Vec<OrderItemDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_null_is_kept_apart_from_absent() {
        let patch: UpdateOrderRequest =
            serde_json::from_str(r#"{"delivery_fee":null,"comments":"ring bell"}"#).unwrap();
        assert_eq!(patch.delivery_fee, Some(None));
        assert_eq!(patch.comments, Some(Some("ring bell".to_string())));
        assert_eq!(patch.delivery_area_id, None);

        let patch: UpdateOrderRequest = serde_json::from_str(r#"{"delivery_fee":500}"#).unwrap();
        assert_eq!(patch.delivery_fee, Some(Some(500)));
    }
}
