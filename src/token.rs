//! Self-contained license tokens.
//!
//! A token carries its own claims (owner, display name, expiry, nonce) and a
//! truncated HMAC signature, so holders can be verified without a database
//! row. Format: `KW-<payload>-<signature>` where the payload is unpadded
//! url-safe base64 of compact JSON and the signature is the first 16 hex
//! characters of HMAC-SHA256(secret, payload).
//!
//! The base64url alphabet itself contains `-`, so the payload segment may
//! too; parsing takes the signature from the last delimiter rather than
//! splitting naively.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::util::{days_to_seconds, now};

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_PREFIX: &str = "KW-";

/// Hex characters kept from the full HMAC-SHA256 output.
const SIG_HEX_LEN: usize = 16;

/// Claims embedded in every token. Field order is the wire order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// External identity (numeric string).
    pub uid: String,
    /// Display name at issue time; informational only.
    pub name: String,
    /// Unix expiry in seconds. Valid while `now <= exp`.
    pub exp: i64,
    /// 8 random bytes, hex-encoded, so reissued tokens never collide.
    pub nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub av: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token does not match the expected format")]
    InvalidFormat,

    #[error("token signature does not verify")]
    InvalidSignature,

    #[error("token expired at {expired_at}")]
    Expired { expired_at: i64 },
}

/// Signs and verifies license tokens with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token valid for `days` from now. Returns the token and its
    /// expiry so callers can persist the same instant they signed.
    pub fn issue(
        &self,
        owner_id: &str,
        owner_name: &str,
        days: f64,
        avatar: Option<&str>,
    ) -> (String, i64) {
        let expires_at = now() + days_to_seconds(days);
        let token = self.issue_with_expiry(owner_id, owner_name, expires_at, avatar);
        (token, expires_at)
    }

    /// Issue a token with an exact expiry. Used wherever the token must
    /// match an already-computed stored expiry.
    pub fn issue_with_expiry(
        &self,
        owner_id: &str,
        owner_name: &str,
        expires_at: i64,
        avatar: Option<&str>,
    ) -> String {
        let claims = TokenClaims {
            uid: owner_id.to_string(),
            name: owner_name.to_string(),
            exp: expires_at,
            nonce: nonce(),
            av: avatar.map(|s| s.to_string()),
        };
        // TokenClaims serialization cannot fail: no maps, no non-string keys.
        let json = serde_json::to_string(&claims).expect("claims serialize to JSON");
        let payload = URL_SAFE_NO_PAD.encode(json.as_bytes());
        let sig = self.sign(&payload);
        format!("{TOKEN_PREFIX}{payload}-{sig}")
    }

    /// Verify a token against the current clock.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, now())
    }

    /// Verify signature first, then decode, then check expiry. Pure function
    /// of (secret, token, now).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
        let (payload, sig_hex) = split_token(token).ok_or(TokenError::InvalidFormat)?;

        let sig = hex::decode(sig_hex).map_err(|_| TokenError::InvalidSignature)?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        mac.verify_truncated_left(&sig)
            .map_err(|_| TokenError::InvalidSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::InvalidFormat)?;
        let claims: TokenClaims =
            serde_json::from_slice(&json).map_err(|_| TokenError::InvalidFormat)?;

        if now > claims.exp {
            return Err(TokenError::Expired {
                expired_at: claims.exp,
            });
        }
        Ok(claims)
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        let full = hex::encode(mac.finalize().into_bytes());
        full[..SIG_HEX_LEN].to_string()
    }
}

/// Cheap structural check so boundaries can reject garbage before any
/// crypto or database work.
pub fn has_token_shape(token: &str) -> bool {
    split_token(token).is_some()
}

fn split_token(token: &str) -> Option<(&str, &str)> {
    let rest = token.strip_prefix(TOKEN_PREFIX)?;
    let (payload, sig) = rest.rsplit_once('-')?;
    if payload.is_empty()
        || sig.len() != SIG_HEX_LEN
        || !sig.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    Some((payload, sig))
}

fn nonce() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
