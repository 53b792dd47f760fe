use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::domain::user::{Role, User};

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub role: Role,
    /// Expiry, unix seconds
    pub exp: i64,
}

/// Issues and verifies bearer tokens of the form `hex(claims).hex(hmac)`
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.sign(&TokenClaims {
            sub: user.id,
            role: user.role,
            exp: (Utc::now() + self.ttl).timestamp(),
        })
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        let payload = serde_json::to_vec(claims).map_err(|_| AuthError::InvalidToken)?;
        let mac = self.mac(&payload)?;
        Ok(format!(
            "{}.{}",
            hex::encode(&payload),
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let (payload_hex, signature_hex) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let payload = hex::decode(payload_hex).map_err(|_| AuthError::InvalidToken)?;
        let signature = hex::decode(signature_hex).map_err(|_| AuthError::InvalidToken)?;

        self.mac(&payload)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidToken)?;
        mac.update(payload);
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Email;

    fn signer() -> TokenSigner {
        TokenSigner::new("secret", Duration::hours(1))
    }

    fn user() -> User {
        User::new("Ada", Email::parse("ada@example.com").unwrap(), "hash".into(), Role::Admin).unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let user = user();
        let claims = signer().verify(&signer().issue(&user).unwrap()).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn tampered_token_rejected() {
        let token = signer().issue(&user()).unwrap();
        let (payload, signature) = token.split_once('.').unwrap();

        let forged_claims = TokenClaims {
            sub: Uuid::new_v4(),
            role: Role::Admin,
            exp: Utc::now().timestamp() + 3600,
        };
        let forged_payload = hex::encode(serde_json::to_vec(&forged_claims).unwrap());

        assert_eq!(
            signer().verify(&format!("{forged_payload}.{signature}")),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            TokenSigner::new("other", Duration::hours(1)).verify(&token),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(signer().verify(payload), Err(AuthError::InvalidToken));
        assert_eq!(signer().verify("zz.zz"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn expired_token_rejected() {
        let token = signer()
            .sign(&TokenClaims {
                sub: Uuid::new_v4(),
                role: Role::User,
                exp: Utc::now().timestamp() - 1,
            })
            .unwrap();
        assert_eq!(signer().verify(&token), Err(AuthError::Expired));
    }
}
