//! Signed bearer tokens
//!
//! Tokens are HS256 JWTs carrying [`Claims`]. Expiry is checked against a
//! caller-supplied clock so handlers and tests agree on "now".

use crate::db::{get_setting, set_setting, Role};
use crate::Result;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

/// Settings key holding the generated signing secret
const TOKEN_SECRET_KEY: &str = "api_token_secret";

/// Identity carried by a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub email: String,
    pub role: Role,
    /// Expiry, Unix seconds
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Issue a token for `claims` signed with `secret`
pub fn issue_token(claims: &Claims, secret: &str) -> Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| crate::Error::Internal(format!("Token signing failed: {}", e)))
}

/// Verify signature and expiry, returning the claims
pub fn verify_token(token: &str, secret: &str, now_unix: i64) -> std::result::Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is compared against `now_unix` below
    validation.validate_exp = false;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        })?;

    if data.claims.exp <= now_unix {
        return Err(TokenError::Expired);
    }

    Ok(data.claims)
}

/// Compare secrets without short-circuiting on the first differing byte
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Signing secret: the configured one, else the stored one, else a new
/// random secret persisted to the settings table
pub async fn load_or_create_token_secret(
    pool: &SqlitePool,
    configured: Option<&str>,
) -> Result<String> {
    if let Some(secret) = configured.filter(|s| !s.is_empty()) {
        return Ok(secret.to_string());
    }

    if let Some(secret) = get_setting(pool, TOKEN_SECRET_KEY).await? {
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    set_setting(pool, TOKEN_SECRET_KEY, &secret).await?;
    info!("Generated new API token secret");

    Ok(secret)
}
