use axum::{extract::FromRequestParts, http::header};

use crate::{error::AppError, services::auth::Identity, state::AppState};

/// Any holder of a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthIdentity(pub Identity);

/// Bearer token issued to the admin.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
}

/// Bearer token of the delivery role, or the admin.
#[derive(Debug, Clone)]
pub struct StaffUser(pub Identity);

fn bearer_token(parts: &axum::http::request::Parts) -> Result<&str, AppError> {
    let auth_str = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?
        .trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    Ok(token)
}

impl FromRequestParts<AppState> for AuthIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        Ok(AuthIdentity(state.gate.verify(token)?))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthIdentity(identity) = AuthIdentity::from_request_parts(parts, state).await?;
        match identity {
            Identity::Admin { email } => Ok(AdminUser { email }),
            Identity::Delivery => Err(AppError::Forbidden),
        }
    }
}

impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthIdentity(identity) = AuthIdentity::from_request_parts(parts, state).await?;
        Ok(StaffUser(identity))
    }
}
