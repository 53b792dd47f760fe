use std::collections::HashMap;
use std::time::{Duration, Instant};

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::web;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Rate Limiting
// ============================================================================
//
// Token bucket per client key, kept in process. When Redis is configured a
// fixed-window counter shared by all instances is used instead, with the
// local bucket as fallback whenever Redis errors.
//
// ============================================================================

const REDIS_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
    /// Key on `Forwarded`/`X-Forwarded-For` instead of the socket peer.
    /// Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded: bool,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    redis: Option<redis::Client>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            redis: None,
            config,
        }
    }

    pub fn with_redis(mut self, url: &str) -> Result<Self, redis::RedisError> {
        self.redis = Some(redis::Client::open(url)?);
        Ok(self)
    }

    pub fn backend(&self) -> &'static str {
        if self.redis.is_some() {
            "redis"
        } else {
            "local"
        }
    }

    pub async fn allow(&self, key: &str) -> bool {
        if let Some(client) = &self.redis {
            match self.redis_allow(client, key).await {
                Ok(allowed) => return allowed,
                Err(e) => tracing::warn!(key, error = %e, "redis rate limit failed, using local bucket"),
            }
        }
        self.local_allow(key, Instant::now()).await
    }

    async fn redis_allow(&self, client: &redis::Client, key: &str) -> Result<bool, redis::RedisError> {
        let window = chrono::Utc::now().timestamp() as u64 / REDIS_WINDOW_SECS;
        let window_key = format!("storefront:rl:{key}:{window}");

        let mut conn = client.get_multiplexed_async_connection().await?;
        let count: i64 = conn.incr(&window_key, 1_i64).await?;
        if count == 1 {
            let _: bool = conn.expire(&window_key, REDIS_WINDOW_SECS as i64).await?;
        }

        Ok(count as f64 <= self.config.capacity)
    }

    async fn local_allow(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.config.capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.config.refill_per_sec).min(self.config.capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets that have refilled completely; they carry no state
    pub async fn prune_idle(&self, idle_for: Duration) {
        let now = Instant::now();
        self.buckets
            .lock()
            .await
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < idle_for);
    }
}

fn client_key(req: &ServiceRequest, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = req.connection_info().realip_remote_addr() {
            return ip.to_string();
        }
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `from_fn` middleware: 429 once the client's budget is spent
pub async fn limit_requests(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    if let Some(state) = req.app_data::<web::Data<AppState>>().cloned() {
        let scope = req
            .path()
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let client = client_key(&req, state.rate_limiter.config.trust_forwarded);

        if !state.rate_limiter.allow(&format!("{scope}:{client}")).await {
            state.metrics.record_rate_limited(&scope);
            tracing::warn!(scope = %scope, client = %client, "rate limit exceeded");
            return Err(ApiError::RateLimited.into());
        }
    }

    next.call(req).await
}
