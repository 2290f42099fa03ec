//! Offline verification of vendor-signed license tokens (compact JWS, Ed25519).

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use ed25519_dalek::{Signature, VerifyingKey};
use serde::Deserialize;
use time::OffsetDateTime;

use super::{Denial, PlanType, Subscription};

/// Public half of the vendor's license signing key.
pub const VENDOR_PUBLIC_KEY: &str = "DFGJ9kEKDRRgAjafUZPWa+5GnOpTSOzj+hxUJgSJqsE=";

const ALLOWED_ALG: &str = "EdDSA";

/// What offline verification concluded about a key.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenVerdict {
    /// A vendor token with a good signature and claims.
    Valid(Subscription),
    /// Parsed as a vendor token but failed a check. Never retried online.
    Rejected(Denial),
    /// Not token-shaped at all; the key belongs to the online path.
    NotRecognized,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

#[derive(Deserialize)]
struct Claims {
    plan: Option<String>,
    exp: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct TokenVerifier {
    key: VerifyingKey,
}

impl TokenVerifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Builds a verifier from a standard-base64 encoded 32 byte public key.
    pub fn from_base64(encoded: &str) -> anyhow::Result<Self> {
        let raw = STANDARD
            .decode(encoded.trim())
            .context("license public key is not base64")?;
        let bytes: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| anyhow!("license public key must be 32 bytes, got {}", raw.len()))?;
        let key = VerifyingKey::from_bytes(&bytes).context("license public key is not a valid Ed25519 point")?;
        Ok(Self::new(key))
    }

    pub fn verify(&self, license_key: &str) -> TokenVerdict {
        self.verify_at(license_key, OffsetDateTime::now_utc())
    }

    pub fn verify_at(&self, license_key: &str, now: OffsetDateTime) -> TokenVerdict {
        let token = license_key.trim();
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return TokenVerdict::NotRecognized;
        };

        let Some(header) = URL_SAFE_NO_PAD
            .decode(header_b64)
            .ok()
            .and_then(|raw| serde_json::from_slice::<Header>(&raw).ok())
        else {
            return TokenVerdict::NotRecognized;
        };

        // Only the asymmetric algorithm is accepted; a token claiming HS256 or
        // "none" must never be checked against the public key as a secret.
        if header.alg != ALLOWED_ALG {
            return TokenVerdict::Rejected(Denial::AlgorithmNotAllowed(header.alg));
        }

        let signature = match URL_SAFE_NO_PAD
            .decode(sig_b64)
            .ok()
            .and_then(|raw| Signature::from_slice(&raw).ok())
        {
            Some(sig) => sig,
            None => return TokenVerdict::Rejected(Denial::InvalidSignature),
        };
        let signed = &token[..header_b64.len() + 1 + payload_b64.len()];
        if self.key.verify_strict(signed.as_bytes(), &signature).is_err() {
            return TokenVerdict::Rejected(Denial::InvalidSignature);
        }

        let claims: Claims = match URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_slice(&raw).map_err(|e| e.to_string()))
        {
            Ok(claims) => claims,
            Err(e) => return TokenVerdict::Rejected(Denial::MalformedClaims(e)),
        };

        let Some(plan_name) = claims.plan else {
            return TokenVerdict::Rejected(Denial::MalformedClaims("missing plan".into()));
        };
        let Some(plan) = PlanType::parse(&plan_name) else {
            return TokenVerdict::Rejected(Denial::UnknownPlan(plan_name));
        };

        let expires_at = match claims.exp.map(OffsetDateTime::from_unix_timestamp) {
            None => None,
            Some(Ok(at)) => Some(at),
            Some(Err(_)) => {
                return TokenVerdict::Rejected(Denial::MalformedClaims("exp out of range".into()))
            }
        };
        if expires_at.is_some_and(|at| at <= now) {
            return TokenVerdict::Rejected(Denial::TokenExpired);
        }

        TokenVerdict::Valid(Subscription::new(plan, expires_at))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use time::Duration;

    pub(crate) fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    pub(crate) fn mint(key: &SigningKey, header: serde_json::Value, claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(header.to_string());
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signing_input = format!("{header}.{payload}");
        let sig = key.sign(signing_input.as_bytes());
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig.to_bytes()))
    }

    pub(crate) fn pro_token(key: &SigningKey, exp: OffsetDateTime) -> String {
        mint(
            key,
            serde_json::json!({"alg": "EdDSA", "typ": "JWT"}),
            serde_json::json!({"plan": "PRO", "sub": "acme", "exp": exp.unix_timestamp()}),
        )
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(signing_key().verifying_key())
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_790_000_000).unwrap()
    }

    #[test]
    fn embedded_vendor_key_parses() {
        assert!(TokenVerifier::from_base64(VENDOR_PUBLIC_KEY).is_ok());
        assert!(TokenVerifier::from_base64("c2hvcnQ=").is_err());
    }

    #[test]
    fn accepts_signed_pro_token() {
        let exp = now() + Duration::days(30);
        let token = pro_token(&signing_key(), exp);
        assert_eq!(
            verifier().verify_at(&token, now()),
            TokenVerdict::Valid(Subscription::new(PlanType::Pro, Some(exp)))
        );
    }

    #[test]
    fn token_without_exp_never_expires() {
        let token = mint(
            &signing_key(),
            serde_json::json!({"alg": "EdDSA"}),
            serde_json::json!({"plan": "free"}),
        );
        assert_eq!(
            verifier().verify_at(&token, now()),
            TokenVerdict::Valid(Subscription::free())
        );
    }

    #[test]
    fn opaque_keys_are_not_recognized() {
        let v = verifier();
        assert_eq!(v.verify_at("6F0E4C97-B72A4E69-A11BF6C4-AF6517E7", now()), TokenVerdict::NotRecognized);
        assert_eq!(v.verify_at("", now()), TokenVerdict::NotRecognized);
        assert_eq!(v.verify_at("a.b.c", now()), TokenVerdict::NotRecognized);
        assert_eq!(v.verify_at("a.b.c.d", now()), TokenVerdict::NotRecognized);
    }

    #[test]
    fn symmetric_algorithm_is_rejected() {
        let token = mint(
            &signing_key(),
            serde_json::json!({"alg": "HS256"}),
            serde_json::json!({"plan": "PRO"}),
        );
        assert_eq!(
            verifier().verify_at(&token, now()),
            TokenVerdict::Rejected(Denial::AlgorithmNotAllowed("HS256".into()))
        );
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let forger = SigningKey::from_bytes(&[9u8; 32]);
        let token = pro_token(&forger, now() + Duration::days(1));
        assert_eq!(
            verifier().verify_at(&token, now()),
            TokenVerdict::Rejected(Denial::InvalidSignature)
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = pro_token(&signing_key(), now() + Duration::days(1));
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(r#"{"plan":"PRO"}"#);
        parts[1] = &forged;
        assert_eq!(
            verifier().verify_at(&parts.join("."), now()),
            TokenVerdict::Rejected(Denial::InvalidSignature)
        );
    }

    #[test]
    fn unknown_plan_is_a_hard_failure() {
        let token = mint(
            &signing_key(),
            serde_json::json!({"alg": "EdDSA"}),
            serde_json::json!({"plan": "ENTERPRISE"}),
        );
        assert_eq!(
            verifier().verify_at(&token, now()),
            TokenVerdict::Rejected(Denial::UnknownPlan("ENTERPRISE".into()))
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = pro_token(&signing_key(), now() - Duration::hours(1));
        assert_eq!(
            verifier().verify_at(&token, now()),
            TokenVerdict::Rejected(Denial::TokenExpired)
        );
    }
}
