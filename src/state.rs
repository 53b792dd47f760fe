use std::sync::Arc;

use actix::Actor;

use crate::actors::MailerActor;
use crate::auth::TokenSigner;
use crate::config::AppConfig;
use crate::domain::contact::ContactMessage;
use crate::domain::order::OrderCommandHandler;
use crate::domain::product::Product;
use crate::domain::user::User;
use crate::http::rate_limit::RateLimiter;
use crate::mail::{EmailTransport, Notifier};
use crate::metrics::Metrics;
use crate::payments::{PaymentGateway, PaymentService};
use crate::storage::ObjectStorage;
use crate::store::{Collection, DocumentStore};
use crate::utils::RetryConfig;

/// External collaborators, constructed by the caller (main or a test)
pub struct Backends {
    pub store: Arc<dyn DocumentStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub storage: Arc<dyn ObjectStorage>,
    pub mail: Arc<dyn EmailTransport>,
    pub rate_limiter: RateLimiter,
}

/// Shared by every request handler through `web::Data`
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub orders: OrderCommandHandler,
    pub products: Collection<Product>,
    pub users: Collection<User>,
    pub contacts: Collection<ContactMessage>,
    pub payments: PaymentService,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Notifier,
    pub tokens: TokenSigner,
    pub metrics: Arc<Metrics>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wire services together. Starts the mailer actor, so it must run inside
    /// an actix system.
    pub fn build(config: &AppConfig, backends: Backends, metrics: Arc<Metrics>, mail_retry: RetryConfig) -> Self {
        let Backends {
            store,
            gateway,
            storage,
            mail,
            rate_limiter,
        } = backends;

        let mailer = MailerActor::new(mail, mail_retry, metrics.clone()).start();
        let notifier = Notifier::new(mailer, config.shop_email.clone());
        let orders = OrderCommandHandler::new(store.clone());
        let payments = PaymentService::new(
            gateway,
            orders.clone(),
            notifier.clone(),
            metrics.clone(),
            config.currency.clone(),
        );

        Self {
            products: Collection::new(store.clone()),
            users: Collection::new(store.clone()),
            contacts: Collection::new(store.clone()),
            store,
            orders,
            payments,
            storage,
            notifier,
            tokens: TokenSigner::new(&config.token_secret, chrono::Duration::hours(config.token_ttl_hours)),
            metrics,
            rate_limiter,
        }
    }
}
