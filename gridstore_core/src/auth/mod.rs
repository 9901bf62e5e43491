use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::{GridError, Result};
use crate::models::User;
use crate::TOKEN_TTL_SECS;

const PBKDF2_ITERATIONS: u32 = 200_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub name: String,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &User) -> Claims {
        Claims {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            exp: Utc::now().timestamp() + TOKEN_TTL_SECS,
        }
    }

    pub fn user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// PBKDF2-HMAC-SHA256 hash, stored as `base64(salt)$base64(key)`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    encode_hash(&salt, password)
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_part, _)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = B64.decode(salt_part) else {
        return false;
    };
    // Recompute with the stored salt and compare the full encoding.
    encode_hash(&salt, password) == stored
}

fn encode_hash(salt: &[u8], password: &str) -> String {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    format!("{}${}", B64.encode(salt), B64.encode(key))
}

/// Sign claims into a `payload.signature` token: base64url JSON claims,
/// HMAC-SHA256 signature over the payload bytes.
pub fn sign_token(claims: &Claims, secret: &str) -> Result<String> {
    let payload = B64.encode(serde_json::to_vec(claims)?);
    let signature = B64.encode(hmac_sha256(secret, payload.as_bytes())?);
    Ok(format!("{}.{}", payload, signature))
}

/// Verify signature and expiry, returning the embedded claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    let (payload, signature) = token.split_once('.').ok_or(GridError::InvalidToken)?;

    let expected = hmac_sha256(secret, payload.as_bytes())?;
    let provided = B64.decode(signature).map_err(|_| GridError::InvalidToken)?;
    if !constant_time_eq(&expected, &provided) {
        return Err(GridError::InvalidToken);
    }

    let raw = B64.decode(payload).map_err(|_| GridError::InvalidToken)?;
    let claims: Claims = serde_json::from_slice(&raw).map_err(|_| GridError::InvalidToken)?;

    if claims.exp <= Utc::now().timestamp() {
        return Err(GridError::TokenExpired);
    }

    Ok(claims)
}

fn hmac_sha256(secret: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| GridError::Internal(format!("hmac init failed: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Registration-time input validation, mirroring the login form rules.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> Result<()> {
    if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(GridError::validation("All fields are required"));
    }
    if !is_valid_email(email) {
        return Err(GridError::validation("Please enter a valid email address"));
    }
    if password != confirm {
        return Err(GridError::validation("Passwords do not match"));
    }
    if password.len() < 6 {
        return Err(GridError::validation(
            "Password must be at least 6 characters long",
        ));
    }
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !local.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains(char::is_whitespace)
}
