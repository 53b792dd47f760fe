use actix_web::middleware::from_fn;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, verify_password, AuthUser};
use crate::domain::user::{validate_password, Email, PublicUser, Role, User, UserError};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Filter;

use super::rate_limit::limit_requests;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .wrap(from_fn(limit_requests))
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/me", web::get().to(me)),
    );
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Hash off the async workers; argon2 is deliberately slow
pub(crate) async fn hash_blocking(password: String) -> Result<String, ApiError> {
    web::block(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

pub(crate) async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    web::block(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub(crate) async fn find_by_email(state: &AppState, email: &Email) -> Result<Option<User>, ApiError> {
    Ok(state
        .users
        .find_one(vec![Filter::eq("email", email.as_str())])
        .await?)
}

async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let RegisterRequest { name, email, password } = body.into_inner();

    let email = Email::parse(&email)?;
    validate_password(&password)?;
    if find_by_email(&state, &email).await?.is_some() {
        return Err(UserError::EmailTaken.into());
    }

    let hash = hash_blocking(password).await?;
    let mut user = User::new(&name, email, hash, Role::User)?;
    state.users.insert(&mut user).await?;

    tracing::info!(user_id = %user.id, "user registered");
    state.notifier.welcome(&user);

    Ok(HttpResponse::Created().json(AuthResponse {
        token: state.tokens.issue(&user)?,
        user: user.public(),
    }))
}

async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let LoginRequest { email, password } = body.into_inner();

    let email = Email::parse(&email).map_err(|_| UserError::InvalidCredentials)?;
    let user = find_by_email(&state, &email)
        .await?
        .ok_or(UserError::InvalidCredentials)?;

    if !verify_blocking(password, user.password_hash.clone()).await? {
        tracing::info!(user_id = %user.id, "login failed");
        return Err(UserError::InvalidCredentials.into());
    }
    if !user.active {
        return Err(UserError::Inactive.into());
    }

    Ok(HttpResponse::Ok().json(AuthResponse {
        token: state.tokens.issue(&user)?,
        user: user.public(),
    }))
}

async fn me(AuthUser(user): AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "user": user.public() }))
}
