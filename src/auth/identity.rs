use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::domain::user::{User, UserError};
use crate::error::ApiError;
use crate::state::AppState;

use super::AuthError;

// ============================================================================
// Request Identity Extractors
// ============================================================================
//
// Identity - optional auth: no Authorization header means Anonymous, a bad
//            or expired token is a 401 (never silently anonymous)
// AuthUser - requires a signed-in, active user
// AdminUser - requires the admin role (403 otherwise)
//
// ============================================================================

#[derive(Debug, Clone)]
pub enum Identity {
    Authenticated(User),
    Anonymous,
}

impl Identity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Authenticated(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user().map(|u| u.id)
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(User::is_admin)
    }
}

fn bearer_token(req: &HttpRequest) -> Option<Result<String, AuthError>> {
    let header = req.headers().get(AUTHORIZATION)?;
    Some(
        header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::InvalidToken),
    )
}

impl FromRequest for Identity {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let Some(token) = token else {
                return Ok(Identity::Anonymous);
            };
            let state = state.ok_or_else(|| ApiError::Internal("application state not configured".into()))?;

            let claims = state.tokens.verify(&token?)?;
            let user = state
                .users
                .get(claims.sub)
                .await?
                .ok_or(AuthError::InvalidToken)?;

            if !user.active {
                return Err(UserError::Inactive.into());
            }
            Ok(Identity::Authenticated(user))
        })
    }
}

/// A signed-in user
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let identity = Identity::from_request(req, payload);
        Box::pin(async move {
            match identity.await? {
                Identity::Authenticated(user) => Ok(AuthUser(user)),
                Identity::Anonymous => Err(AuthError::MissingToken.into()),
            }
        })
    }
}

/// A signed-in user with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequest for AdminUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let user = AuthUser::from_request(req, payload);
        Box::pin(async move {
            let AuthUser(user) = user.await?;
            if user.is_admin() {
                Ok(AdminUser(user))
            } else {
                Err(AuthError::Forbidden.into())
            }
        })
    }
}
