use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::gateway::GatewayError;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verifies `t=<unix>,v1=<hex>` webhook signature headers.
///
/// The signed payload is `"{t}.{raw body}"`; any `v1` entry may match, which
/// allows the gateway to sign with both old and new secrets during rotation.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), GatewayError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), GatewayError> {
        if self.secret.is_empty() {
            return Err(GatewayError::InvalidSignature("webhook secret not configured"));
        }

        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(GatewayError::InvalidSignature("missing timestamp"))?;
        if signatures.is_empty() {
            return Err(GatewayError::InvalidSignature("missing signature"));
        }
        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(GatewayError::InvalidSignature("timestamp outside tolerance"));
        }

        let matched = signatures.iter().any(|candidate| {
            let Ok(expected) = hex::decode(candidate) else {
                return false;
            };
            self.mac(timestamp, payload)
                .map(|mac| mac.verify_slice(&expected).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(GatewayError::InvalidSignature("signature mismatch"))
        }
    }

    /// Produce a header the way the gateway would; used by the fake gateway and tests
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let signature = self
            .mac(timestamp, payload)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default();
        format!("t={timestamp},v1={signature}")
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Some(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_test")
    }

    #[test]
    fn accepts_valid_signature() {
        let now = Utc::now().timestamp();
        let header = verifier().sign(BODY, now);
        assert!(verifier().verify(BODY, &header).is_ok());
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now().timestamp();
        let header = WebhookVerifier::new("other").sign(BODY, now);
        assert!(matches!(
            verifier().verify(BODY, &header),
            Err(GatewayError::InvalidSignature("signature mismatch"))
        ));
    }

    #[test]
    fn rejects_modified_payload() {
        let now = Utc::now().timestamp();
        let header = verifier().sign(BODY, now);
        assert!(verifier().verify(b"{\"id\":\"evt_2\"}", &header).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let then = 1_700_000_000;
        let header = verifier().sign(BODY, then);
        assert!(matches!(
            verifier().verify_at(BODY, &header, then + DEFAULT_TOLERANCE_SECS + 1),
            Err(GatewayError::InvalidSignature("timestamp outside tolerance"))
        ));
        assert!(verifier().verify_at(BODY, &header, then + 10).is_ok());
    }

    #[test]
    fn rejects_malformed_headers() {
        for header in ["", "garbage", "t=123", "v1=abcd", "t=abc,v1=abcd"] {
            assert!(verifier().verify(BODY, header).is_err(), "{header:?} should fail");
        }
    }

    #[test]
    fn empty_secret_never_verifies() {
        let unsigned = WebhookVerifier::new("");
        let header = unsigned.sign(BODY, Utc::now().timestamp());
        assert!(unsigned.verify(BODY, &header).is_err());
    }

    #[test]
    fn any_v1_entry_may_match() {
        let now = Utc::now().timestamp();
        let good = verifier().sign(BODY, now);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={now},v1=deadbeef,v1={good_sig}");
        assert!(verifier().verify(BODY, &header).is_ok());
    }
}
