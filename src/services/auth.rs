use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;

use crate::{
    config::AuthConfig,
    dto::auth::{Claims, DeliveryPasswordStatus, TokenResponse},
    error::{AppError, AppResult},
    store::Store,
};

/// Token subject used for the shared delivery login.
pub const DELIVERY_SUBJECT: &str = "delivery_user";

const MIN_PASSWORD_LEN: usize = 8;

/// Who a verified token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Admin { email: String },
    Delivery,
}

/// Issues and verifies bearer tokens for the admin and delivery roles.
pub struct AccessGate {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    admin_email: String,
    admin_password_hash: String,
}

impl AccessGate {
    /// Hashes the configured admin password once so logins never compare plaintext.
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(AppError::Internal(anyhow::anyhow!("JWT secret is empty")));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::minutes(config.token_ttl_minutes),
            admin_email: config.admin_email.clone(),
            admin_password_hash: hash_password(&config.admin_password)?,
        })
    }

    pub fn issue_admin_token(&self, password: &str) -> AppResult<TokenResponse> {
        if !verify_password(&self.admin_password_hash, password) {
            tracing::warn!("admin login rejected");
            return Err(AppError::Unauthorized);
        }
        self.issue(&self.admin_email)
    }

    pub async fn issue_delivery_token(
        &self,
        store: &dyn Store,
        password: &str,
    ) -> AppResult<TokenResponse> {
        let Some(credential) = store.delivery_credential().await? else {
            tracing::warn!("delivery login attempted before a password was set");
            return Err(AppError::Unauthorized);
        };
        if !verify_password(&credential.password_hash, password) {
            tracing::warn!("delivery login rejected");
            return Err(AppError::Unauthorized);
        }
        self.issue(DELIVERY_SUBJECT)
    }

    /// Every failure collapses into `Unauthorized`.
    pub fn verify(&self, token: &str) -> AppResult<Identity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|err| {
                tracing::debug!(error = %err, "token rejected");
                AppError::Unauthorized
            })?
            .claims;

        match claims.sub.as_str() {
            DELIVERY_SUBJECT => Ok(Identity::Delivery),
            sub if sub == self.admin_email => Ok(Identity::Admin {
                email: self.admin_email.clone(),
            }),
            _ => Err(AppError::Unauthorized),
        }
    }

    pub async fn set_delivery_password(
        &self,
        store: &dyn Store,
        password: &str,
    ) -> AppResult<DeliveryPasswordStatus> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let credential = store
            .save_delivery_credential(hash_password(password)?)
            .await?;
        tracing::info!("delivery password updated");
        Ok(DeliveryPasswordStatus {
            is_set: true,
            updated_at: Some(credential.updated_at),
        })
    }

    pub async fn delivery_password_status(
        &self,
        store: &dyn Store,
    ) -> AppResult<DeliveryPasswordStatus> {
        let credential = store.delivery_credential().await?;
        Ok(DeliveryPasswordStatus {
            is_set: credential.is_some(),
            updated_at: credential.map(|c| c.updated_at),
        })
    }

    fn issue(&self, subject: &str) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
        Ok(TokenResponse {
            access_token: token,
            token_type: "bearer".to_string(),
            expires_at,
        })
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

/// A malformed stored hash counts as a mismatch.
fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::error!(error = %err, "stored password hash is malformed");
            false
        }
    }
}
