use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{DeliveryPasswordStatus, DeliveryPasswordUpdate, LoginRequest, TokenResponse},
        orders::{
            CreateOrderRequest, OrderDetail, OrderItemDetail, OrderItemInput, OrderList,
            UpdateOrderRequest,
        },
        products::{
            CreateProductRequest, CreateVariantRequest, ImageSelection, ProductDetail,
            ProductList, ProductSummary, UpdateProductRequest, UpdateVariantRequest, UploadForm,
            VariantUpsert,
        },
    },
    error::ErrorData,
    models::{
        Category, Customer, DeliveryArea, LineItemTarget, Order, OrderStatus, Product,
        ProductImage, ProductVariant, ShippingMethod,
    },
    response::{ApiResponse, Deleted, Meta},
    routes::{auth, delivery, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        delivery::delivery_login,
        delivery::list_delivery_orders,
        delivery::delivery_password_status,
        delivery::set_delivery_password,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::upload_product_image,
        products::delete_product_image,
        products::set_primary_image,
        products::create_variant,
        products::update_variant,
        products::delete_variant,
        products::upload_variant_image,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::update_order,
        orders::delete_order
    ),
    components(
        schemas(
            Category,
            Customer,
            DeliveryArea,
            Product,
            ProductImage,
            ProductVariant,
            Order,
            OrderStatus,
            ShippingMethod,
            LineItemTarget,
            LoginRequest,
            TokenResponse,
            DeliveryPasswordUpdate,
            DeliveryPasswordStatus,
            CreateProductRequest,
            UpdateProductRequest,
            ImageSelection,
            VariantUpsert,
            CreateVariantRequest,
            UpdateVariantRequest,
            UploadForm,
            ProductDetail,
            ProductSummary,
            ProductList,
            CreateOrderRequest,
            UpdateOrderRequest,
            OrderItemInput,
            OrderItemDetail,
            OrderDetail,
            OrderList,
            params::Pagination,
            params::OrderListQuery,
            params::SortOrder,
            ErrorData,
            Deleted,
            Meta,
            ApiResponse<ProductDetail>,
            ApiResponse<ProductList>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<TokenResponse>,
            ApiResponse<ErrorData>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Admin login"),
        (name = "Products", description = "Catalog reads and admin catalog writes"),
        (name = "Variants", description = "Product variant management"),
        (name = "Orders", description = "Admin order management"),
        (name = "Delivery", description = "Delivery login, order list and credential"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
