use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Price in minor currency units.
    pub price: i64,
    pub stock_quantity: Option<i32>,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductImage {
    pub id: i64,
    pub product_id: i64,
    pub image_url: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl ProductImage {
    /// Promotion order: first created wins, id breaks ties.
    pub fn promotion_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductVariant {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryArea {
    pub id: i64,
    pub name: String,
    pub delivery_fee: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    Delivery,
    PickUp,
}

impl ShippingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Delivery => "delivery",
            ShippingMethod::PickUp => "pick_up",
        }
    }
}

impl FromStr for ShippingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(ShippingMethod::Delivery),
            "pick_up" => Ok(ShippingMethod::PickUp),
            other => Err(format!("unknown shipping method `{other}`")),
        }
    }
}

/// Order lifecycle. Any value may follow any other; transitions are admin-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Processing,
    Ready,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Ready => "ready",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(OrderStatus::Processing),
            "ready" => Ok(OrderStatus::Ready),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(format!("unknown order status `{other}`")),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub shipping_method: ShippingMethod,
    pub status: OrderStatus,
    pub comments: Option<String>,
    pub delivery_area_id: Option<i64>,
    pub delivery_fee: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// What a line item points at. Exactly one of the two, never both, never neither.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum LineItemTarget {
    Product(i64),
    Variant(i64),
}

impl LineItemTarget {
    /// Splits into the `(product_id, product_variant_id)` column pair.
    pub fn into_columns(self) -> (Option<i64>, Option<i64>) {
        match self {
            LineItemTarget::Product(id) => (Some(id), None),
            LineItemTarget::Variant(id) => (None, Some(id)),
        }
    }

    /// Rebuilds the target from the column pair; `None` when the pair is not exactly-one.
    pub fn from_columns(product_id: Option<i64>, variant_id: Option<i64>) -> Option<Self> {
        match (product_id, variant_id) {
            (Some(id), None) => Some(LineItemTarget::Product(id)),
            (None, Some(id)) => Some(LineItemTarget::Variant(id)),
            _ => None,
        }
    }

    pub fn variant_id(&self) -> Option<i64> {
        match self {
            LineItemTarget::Variant(id) => Some(*id),
            LineItemTarget::Product(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub quantity: i32,
    pub target: LineItemTarget,
}

/// Typed replacement for the old `delivery_password` settings row.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryCredential {
    pub password_hash: String,
    pub updated_at: DateTime<Utc>,
}
