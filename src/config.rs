use std::env;
use std::str::FromStr;

use anyhow::Context;

// ============================================================================
// Configuration - read once from the environment at startup
// ============================================================================

const DEV_TOKEN_SECRET: &str = "dev-only-token-secret-change-me";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub token_secret: String,
    pub token_ttl_hours: i64,
    pub gateway_secret_key: Option<String>,
    pub gateway_webhook_secret: String,
    pub gateway_api_base: String,
    pub currency: String,
    pub upload_dir: String,
    pub public_upload_url: String,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
    pub shop_email: String,
    pub cors_origins: Vec<String>,
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_per_sec: f64,
    pub trust_proxy_headers: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            database_url: None,
            redis_url: None,
            token_secret: DEV_TOKEN_SECRET.into(),
            token_ttl_hours: 24,
            gateway_secret_key: None,
            gateway_webhook_secret: String::new(),
            gateway_api_base: crate::payments::DEFAULT_API_BASE.into(),
            currency: "usd".into(),
            upload_dir: "./uploads".into(),
            public_upload_url: "/uploads".into(),
            mail_relay_url: None,
            mail_from: "shop@localhost".into(),
            shop_email: "shop@localhost".into(),
            cors_origins: Vec::new(),
            rate_limit_capacity: 100,
            rate_limit_refill_per_sec: 2.0,
            trust_proxy_headers: false,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            host: string("HOST").unwrap_or(defaults.host),
            port: parsed("PORT")?.unwrap_or(defaults.port),
            database_url: string("DATABASE_URL"),
            redis_url: string("REDIS_URL"),
            token_secret: string("TOKEN_SECRET").unwrap_or(defaults.token_secret),
            token_ttl_hours: parsed("TOKEN_TTL_HOURS")?.unwrap_or(defaults.token_ttl_hours),
            gateway_secret_key: string("GATEWAY_SECRET_KEY"),
            gateway_webhook_secret: string("GATEWAY_WEBHOOK_SECRET")
                .unwrap_or(defaults.gateway_webhook_secret),
            gateway_api_base: string("GATEWAY_API_BASE").unwrap_or(defaults.gateway_api_base),
            currency: string("CURRENCY").unwrap_or(defaults.currency).to_lowercase(),
            upload_dir: string("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            public_upload_url: string("PUBLIC_UPLOAD_URL").unwrap_or(defaults.public_upload_url),
            mail_relay_url: string("MAIL_RELAY_URL"),
            mail_from: string("MAIL_FROM").unwrap_or(defaults.mail_from),
            shop_email: string("SHOP_EMAIL").unwrap_or(defaults.shop_email),
            cors_origins: string("CORS_ORIGINS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            rate_limit_capacity: parsed("RATE_LIMIT_CAPACITY")?.unwrap_or(defaults.rate_limit_capacity),
            rate_limit_refill_per_sec: parsed("RATE_LIMIT_REFILL_PER_SEC")?
                .unwrap_or(defaults.rate_limit_refill_per_sec),
            trust_proxy_headers: parsed("TRUST_PROXY_HEADERS")?.unwrap_or(defaults.trust_proxy_headers),
            admin_email: string("ADMIN_EMAIL"),
            admin_password: string("ADMIN_PASSWORD"),
        };

        if config.gateway_secret_key.is_some() && config.token_secret == DEV_TOKEN_SECRET {
            anyhow::bail!("TOKEN_SECRET must be set when a live payment gateway is configured");
        }

        config.log_summary();
        Ok(config)
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    fn log_summary(&self) {
        if self.token_secret == DEV_TOKEN_SECRET {
            tracing::warn!("TOKEN_SECRET not set, using development secret");
        }
        if self.gateway_secret_key.is_some() && self.gateway_webhook_secret.is_empty() {
            tracing::warn!("GATEWAY_WEBHOOK_SECRET not set, every webhook will be rejected");
        }

        tracing::info!(
            host = %self.host,
            port = self.port,
            store = if self.database_url.is_some() { "postgres" } else { "memory" },
            rate_limiter = if self.redis_url.is_some() { "redis" } else { "local" },
            gateway = if self.gateway_secret_key.is_some() { "stripe" } else { "fake" },
            mail = if self.mail_relay_url.is_some() { "http_relay" } else { "log" },
            currency = %self.currency,
            "configuration loaded"
        );
    }
}

fn string(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    string(key)
        .map(|raw| raw.parse::<T>().with_context(|| format!("invalid value for {key}: {raw:?}")))
        .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
