use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absent means the in-memory store is used.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub upload_dir: String,
    pub public_upload_url: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub admin_email: String,
    pub admin_password: String,
    pub token_ttl_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let public_upload_url =
            env::var("PUBLIC_UPLOAD_URL").unwrap_or_else(|_| "/uploads".to_string());
        Ok(Self {
            database_url,
            host,
            port,
            auth: AuthConfig::from_env()?,
            upload_dir,
            public_upload_url,
        })
    }
}

impl AuthConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let admin_password = env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD is not set")?;
        let admin_email =
            env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
        let token_ttl_minutes = env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|m| m.parse::<i64>().ok())
            .filter(|m| *m > 0)
            .unwrap_or(1440);
        Ok(Self {
            jwt_secret,
            admin_email,
            admin_password,
            token_ttl_minutes,
        })
    }
}
