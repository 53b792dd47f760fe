use actix_web::middleware::from_fn;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::domain::contact::ContactMessage;
use crate::error::ApiError;
use crate::state::AppState;

use super::rate_limit::limit_requests;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/contact")
            .wrap(from_fn(limit_requests))
            .route("", web::post().to(submit)),
    );
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

async fn submit(
    state: web::Data<AppState>,
    body: web::Json<ContactRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut message = ContactMessage::new(
        &body.name,
        &body.email,
        body.subject.as_deref(),
        &body.message,
    )?;
    state.contacts.insert(&mut message).await?;
    state.notifier.contact_received(&message);

    tracing::info!(contact_id = %message.id, "contact message received");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Message received",
        "id": message.id,
    })))
}
