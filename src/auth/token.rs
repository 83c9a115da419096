//! Compact HS256 tokens (header.payload.signature, base64url without
//! padding), signed with the configured service secret.

use super::Role;
use crate::error::AuthError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub sub: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone_model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
}

#[derive(Serialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
}

pub struct TokenSigner {
    key: hmac::Key,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Mint a token for `user_id` carrying the role and the device
    /// fingerprint reported at login.
    pub fn issue(&self, user_id: &str, role: Role, phone_model: &str, os: &str) -> String {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            role,
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            sub: user_id.to_string(),
            phone_model: phone_model.to_string(),
            os: os.to_string(),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> String {
        let header = Header {
            alg: "HS256",
            typ: "JWT",
        };
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).expect("header json"));
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims json"));
        let signing_input = format!("{}.{}", header, payload);
        let tag = hmac::sign(&self.key, signing_input.as_bytes());
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(tag.as_ref()))
    }

    /// Verify a raw `Authorization` header value (with or without the
    /// `Bearer` prefix) and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token = token.strip_prefix("Bearer").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let mut parts = token.split('.');
        let (header, payload, signature) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(AuthError::InvalidToken),
            };

        let header_json = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| AuthError::InvalidToken)?;
        let parsed: serde_json::Value =
            serde_json::from_slice(&header_json).map_err(|_| AuthError::InvalidToken)?;
        if parsed.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
            return Err(AuthError::InvalidToken);
        }

        let tag = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;
        let signing_input = format!("{}.{}", header, payload);
        hmac::verify(&self.key, signing_input.as_bytes(), &tag)
            .map_err(|_| AuthError::InvalidToken)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;

        let now = Utc::now().timestamp();
        if claims.exp < now {
            return Err(AuthError::Expired);
        }
        if claims.nbf > now {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}
