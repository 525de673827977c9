use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod delivery;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    let admin = Router::new()
        .merge(products::admin_router())
        .merge(orders::router())
        .merge(delivery::admin_router());

    Router::new()
        .merge(auth::router())
        .nest("/products", products::router())
        .nest("/delivery", delivery::router())
        .nest("/admin", admin)
}
