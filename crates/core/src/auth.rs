//! Password hashing and bearer tokens.
//!
//! Passwords are stored as Argon2 PHC strings. Access tokens are compact
//! HS256 JWTs carrying the username, the admin flag and an expiry.

use crate::error::AuthError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SALT_SIZE: usize = 16;
const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| AuthError::Hashing(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// False for a wrong password and for a hash that doesn't parse.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    match PasswordHash::new(hashed) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub is_admin: bool,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, username: &str, is_admin: bool) -> Result<String, AuthError> {
        self.issue_at(username, is_admin, Utc::now())
    }

    fn issue_at(
        &self,
        username: &str,
        is_admin: bool,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: username.to_string(),
            is_admin,
            exp: (now + self.ttl).timestamp(),
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.mac(&signing_input)?.finalize().into_bytes();

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidToken("malformed token".to_string()));
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken("bad signature encoding".to_string()))?;
        self.mac(&format!("{header}.{payload}"))?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken("signature mismatch".to_string()))?;

        let header = decode_segment::<serde_json::Value>(header)?;
        if header.get("alg").and_then(|alg| alg.as_str()) != Some("HS256") {
            return Err(AuthError::InvalidToken("unsupported algorithm".to_string()));
        }

        let claims = decode_segment::<Claims>(payload)?;
        if claims.exp <= now.timestamp() {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidToken("bad segment encoding".to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::InvalidToken(e.to_string()))
}
