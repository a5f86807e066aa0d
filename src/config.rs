use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub currency: String,
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminAuthConfig {
    pub jwt_secret: String,
    pub audience: String,
    pub allowed_emails: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessConfig {
    pub timezone: String,
    pub order_window_days: i64,
    pub fulfill_sweep_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub public_base_url: String,
    pub stripe: StripeConfig,
    pub admin: AdminAuthConfig,
    pub storage: StorageConfig,
    pub business: BusinessConfig,
}

fn required(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name).with_context(|| format!("{name} is not set"))?;
    anyhow::ensure!(!value.trim().is_empty(), "{name} is empty");
    Ok(value)
}

fn optional_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Splits a comma separated allowlist, lower-casing and dropping blanks.
pub fn parse_admin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let server = ServerConfig {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: optional_parsed("APP_PORT", 8080),
        };
        let database_url = required("DATABASE_URL")?;
        let public_base_url = required("PUBLIC_BASE_URL")?
            .trim_end_matches('/')
            .to_string();

        let stripe = StripeConfig {
            secret_key: required("STRIPE_SECRET_KEY")?,
            webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".into()),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "usd".into()),
            webhook_tolerance_secs: optional_parsed("WEBHOOK_TOLERANCE_SECS", 300),
        };

        let allowed_emails = parse_admin_list(&required("ALLOWED_ADMINS")?);
        anyhow::ensure!(!allowed_emails.is_empty(), "ALLOWED_ADMINS has no entries");
        let admin = AdminAuthConfig {
            jwt_secret: required("ADMIN_JWT_SECRET")?,
            audience: std::env::var("ADMIN_JWT_AUDIENCE")
                .unwrap_or_else(|_| "authenticated".into()),
            allowed_emails,
        };

        let storage = StorageConfig {
            endpoint: required("S3_ENDPOINT")?,
            bucket: required("S3_BUCKET")?,
            access_key: required("S3_ACCESS_KEY")?,
            secret_key: required("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_base_url: required("IMAGE_PUBLIC_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
        };

        let business = BusinessConfig {
            timezone: std::env::var("BUSINESS_TIMEZONE")
                .unwrap_or_else(|_| "America/Los_Angeles".into()),
            order_window_days: optional_parsed("ORDER_WINDOW_DAYS", 14),
            fulfill_sweep_secs: optional_parsed("FULFILL_SWEEP_SECS", 300),
        };

        Ok(Self {
            server,
            database_url,
            public_base_url,
            stripe,
            admin,
            storage,
            business,
        })
    }
}
