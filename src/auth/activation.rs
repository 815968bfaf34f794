//! Account activation tokens.
//!
//! A token is `{timestamp_base36}-{hex_hmac}` where the MAC covers the
//! account id, its `is_active` flag, its password hash and the timestamp.
//! Activating the account (or changing the password) changes that state,
//! so an already-used token stops verifying without any server-side
//! bookkeeping. The timestamp bounds the token's lifetime.

use std::time::Duration;

use axum::extract::FromRef;
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::repo::User, state::AppState};

type HmacSha256 = Hmac<Sha256>;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Encodes a user id for use in an activation link path segment.
pub fn encode_uid(id: Uuid) -> String {
    Base64UrlUnpadded::encode_string(id.as_bytes())
}

/// Decodes a link path segment back into a user id. Returns `None` for
/// anything that is not url-safe base64 over exactly 16 bytes.
pub fn decode_uid(encoded: &str) -> Option<Uuid> {
    let bytes = Base64UrlUnpadded::decode_vec(encoded).ok()?;
    Uuid::from_slice(&bytes).ok()
}

#[derive(Clone)]
pub struct ActivationTokens {
    secret: String,
    ttl: Duration,
}

impl FromRef<AppState> for ActivationTokens {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.config.activation.secret.clone(),
            Duration::from_secs(state.config.activation.ttl_secs),
        )
    }
}

impl ActivationTokens {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn make_token(&self, user: &User) -> String {
        self.token_at(user, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Verifies a token against the account's current state. Any parse
    /// failure, expired timestamp or signature mismatch is just `false`;
    /// callers do not learn which check failed.
    pub fn check_token(&self, user: &User, token: &str) -> bool {
        self.check_token_at(user, token, OffsetDateTime::now_utc().unix_timestamp())
    }

    fn token_at(&self, user: &User, timestamp: i64) -> String {
        let sig = self.mac_for(user, timestamp).finalize().into_bytes();
        format!("{}-{}", to_base36(timestamp), hex::encode(sig))
    }

    fn check_token_at(&self, user: &User, token: &str, now: i64) -> bool {
        let Some((ts_part, sig_part)) = token.split_once('-') else {
            return false;
        };
        let Some(timestamp) = from_base36(ts_part) else {
            return false;
        };
        if now.saturating_sub(timestamp) > self.ttl.as_secs() as i64 {
            return false;
        }
        let Ok(sig) = hex::decode(sig_part) else {
            return false;
        };
        // Constant-time comparison via the MAC itself.
        self.mac_for(user, timestamp).verify_slice(&sig).is_ok()
    }

    fn mac_for(&self, user: &User, timestamp: i64) -> HmacSha256 {
        let state = format!(
            "{}:{}:{}:{}",
            user.id, user.is_active, user.password_hash, timestamp
        );
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any size");
        mac.update(state.as_bytes());
        mac
    }
}

fn to_base36(value: i64) -> String {
    let mut n = value.max(0) as u64;
    if n == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn from_base36(text: &str) -> Option<i64> {
    i64::from_str_radix(text, 36).ok()
}
