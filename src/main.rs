use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storefront::auth::hash_password;
use storefront::config::AppConfig;
use storefront::domain::user::{Email, Role, User};
use storefront::http::rate_limit::{RateLimitConfig, RateLimiter};
use storefront::mail::{EmailTransport, HttpRelayTransport, LogTransport};
use storefront::metrics::Metrics;
use storefront::payments::{FakeGateway, PaymentGateway, StripeGateway};
use storefront::state::{AppState, Backends};
use storefront::storage::{LocalDiskStorage, ObjectStorage};
use storefront::store::{DocumentStore, Filter, InMemoryDocumentStore, PostgresDocumentStore};
use storefront::utils::RetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront=debug")),
        )
        .init();

    tracing::info!("🚀 Starting storefront");

    let config = AppConfig::from_env()?;

    // === 1. Backends ===
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres...");
            Arc::new(
                PostgresDocumentStore::connect(url)
                    .await
                    .context("failed to connect to Postgres")?,
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
            Arc::new(InMemoryDocumentStore::new())
        }
    };

    let gateway: Arc<dyn PaymentGateway> = match &config.gateway_secret_key {
        Some(key) => Arc::new(
            StripeGateway::new(&config.gateway_api_base, key, &config.gateway_webhook_secret)
                .context("failed to build payment gateway client")?,
        ),
        None => {
            tracing::warn!("GATEWAY_SECRET_KEY not set, using in-process fake gateway");
            Arc::new(FakeGateway::new(config.gateway_webhook_secret.clone()))
        }
    };

    let mail: Arc<dyn EmailTransport> = match &config.mail_relay_url {
        Some(url) => Arc::new(
            HttpRelayTransport::new(url, &config.mail_from)
                .context("failed to build mail relay client")?,
        ),
        None => Arc::new(LogTransport),
    };

    let storage: Arc<dyn ObjectStorage> = Arc::new(LocalDiskStorage::new(
        &config.upload_dir,
        &config.public_upload_url,
    ));

    let mut rate_limiter = RateLimiter::new(RateLimitConfig {
        capacity: config.rate_limit_capacity as f64,
        refill_per_sec: config.rate_limit_refill_per_sec,
        trust_forwarded: config.trust_proxy_headers,
    });
    if let Some(url) = &config.redis_url {
        rate_limiter = rate_limiter.with_redis(url).context("invalid REDIS_URL")?;
    }

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Application state ===
    let state = web::Data::new(AppState::build(
        &config,
        Backends {
            store,
            gateway,
            storage,
            mail,
            rate_limiter,
        },
        metrics,
        RetryConfig::default(),
    ));

    bootstrap_admin(&config, &state).await?;

    // Forget idle rate-limit buckets
    let pruning = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            pruning.rate_limiter.prune_idle(Duration::from_secs(600)).await;
        }
    });

    // === 4. HTTP server ===
    let bind = config.bind_address();
    tracing::info!("🌐 Listening on http://{}:{}", bind.0, bind.1);

    let cors_origins = config.cors_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&cors_origins))
            .app_data(state.clone())
            .configure(storefront::http::configure)
    })
    .bind(bind)?
    .run()
    .await?;

    tracing::info!("Storefront stopped");
    Ok(())
}

fn cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    if origins.is_empty() {
        cors.allow_any_origin()
    } else {
        origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}

/// Create (or promote) the admin account named in ADMIN_EMAIL / ADMIN_PASSWORD
async fn bootstrap_admin(config: &AppConfig, state: &AppState) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    let email = Email::parse(email).context("invalid ADMIN_EMAIL")?;
    let existing = state
        .users
        .find_one(vec![Filter::eq("email", email.as_str())])
        .await?;

    match existing {
        Some(mut user) if !user.is_admin() || !user.active => {
            user.role = Role::Admin;
            user.active = true;
            state.users.save(&mut user).await?;
            tracing::info!(user_id = %user.id, "existing account promoted to admin");
        }
        Some(_) => tracing::debug!("bootstrap admin already present"),
        None => {
            let hash = hash_password(password).context("failed to hash admin password")?;
            let mut admin = User::new("Administrator", email, hash, Role::Admin)?;
            state.users.insert(&mut admin).await?;
            tracing::info!(user_id = %admin.id, "bootstrap admin created");
        }
    }

    Ok(())
}
