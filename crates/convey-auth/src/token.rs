//! Session tokens bound to an account id.
//!
//! A token is two URL-safe base64 segments, `payload.signature`, where the
//! payload is the JSON claims `{ id, iat, exp }` (unix seconds) and the
//! signature is HMAC-SHA256 over the raw payload bytes under a process-wide
//! secret configured once at startup.
//!
//! Verification fails closed: any parse failure, signature mismatch, expired
//! window or id mismatch yields `false`. There is no revocation; a token is
//! valid for its full lifetime once issued.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signing secret and token lifetime. Immutable after construction.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: Vec<u8>,
    pub ttl_seconds: i64,
}

impl TokenConfig {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_seconds: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_seconds,
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

/// Issuance-side errors. Verification never errors; it returns `false`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token lifetime must be positive, got {ttl_seconds}s")]
    NonPositiveLifetime { ttl_seconds: i64 },

    #[error("signing key rejected")]
    KeyRejected,

    #[error("claims encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: i64,
    iat: i64,
    exp: i64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionTokenService {
    mac: HmacSha256,
    ttl_seconds: i64,
}

impl SessionTokenService {
    pub fn new(config: TokenConfig) -> Result<Self, TokenError> {
        if config.ttl_seconds <= 0 {
            return Err(TokenError::NonPositiveLifetime {
                ttl_seconds: config.ttl_seconds,
            });
        }
        let mac =
            HmacSha256::new_from_slice(&config.secret).map_err(|_| TokenError::KeyRejected)?;
        Ok(Self {
            mac,
            ttl_seconds: config.ttl_seconds,
        })
    }

    /// Issue a token for `account_id`, valid from now for the configured
    /// lifetime.
    pub fn issue(&self, account_id: i64) -> Result<String, TokenError> {
        self.issue_at(Utc::now(), account_id)
    }

    /// Like [`issue`](Self::issue) but with an explicit `now`. Use this in
    /// tests to avoid flaky clock-dependent assertions.
    pub fn issue_at(&self, now: DateTime<Utc>, account_id: i64) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = Claims {
            id: account_id,
            iat,
            exp: iat + self.ttl_seconds,
        };
        let payload = serde_json::to_vec(&claims).map_err(|e| TokenError::Encode(e.to_string()))?;
        let mut mac = self.mac.clone();
        mac.update(&payload);
        let sig = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(sig)
        ))
    }

    /// True only if the signature verifies, the current time falls within
    /// `[iat, exp)` and the embedded id equals `claimed_id` exactly.
    pub fn verify(&self, token: &str, claimed_id: i64) -> bool {
        self.verify_at(Utc::now(), token, claimed_id)
    }

    /// Like [`verify`](Self::verify) but with an explicit `now`.
    pub fn verify_at(&self, now: DateTime<Utc>, token: &str, claimed_id: i64) -> bool {
        let Some(claims) = self.decode_verified(token) else {
            return false;
        };
        let now = now.timestamp();
        claims.iat <= now && now < claims.exp && claims.id == claimed_id
    }

    /// Decode the claims iff the signature verifies. Any malformed input is
    /// a `None`.
    fn decode_verified(&self, token: &str) -> Option<Claims> {
        let (payload_b64, sig_b64) = token.split_once('.')?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;
        let mut mac = self.mac.clone();
        mac.update(&payload);
        mac.verify_slice(&sig).ok()?;
        serde_json::from_slice(&payload).ok()
    }
}

impl fmt::Debug for SessionTokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokenService")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}
