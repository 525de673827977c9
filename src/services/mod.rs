pub mod auth;
pub mod catalog;
pub mod orders;
pub(crate) mod saga;
