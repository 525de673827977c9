use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct DeliveryPasswordUpdate {
    pub password: String,
}

/// Never carries the hash itself.
#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct DeliveryPasswordStatus {
    pub is_set: bool,
    pub updated_at: Option<DateTime<Utc>>,
}
