// auth/mod.rs — Password hashing and JWT issuance/verification.
//
// Access and refresh tokens are HS256, signed with the configured secret.
// Refresh tokens carry `typ = "refresh"` and are rejected by the access-token
// verifier (and vice versa).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const ISSUER: &str = "taskd-api";
pub const AUDIENCE: &str = "taskd-frontend";

/// bcrypt ignores input past 72 bytes; truncate explicitly (on a char
/// boundary) so hashing and verification agree on the effective input.
fn truncate_72(password: &str) -> &str {
    if password.len() <= 72 {
        return password;
    }
    let mut end = 72;
    while !password.is_char_boundary(end) {
        end -= 1;
    }
    &password[..end]
}

pub fn hash_password(password: &str, cost: u32) -> anyhow::Result<String> {
    Ok(bcrypt::hash(truncate_72(password), cost)?)
}

pub fn verify_password(password: &str, hashed: &str) -> bool {
    bcrypt::verify(truncate_72(password), hashed).unwrap_or(false)
}

/// Signup validation: minimal shape check, not full RFC 5322.
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Signup validation: length plus upper/lower/digit complexity.
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters long");
    }
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err("Password must contain uppercase, lowercase, and numeric characters");
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub user_id: i64,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    /// `"refresh"` on refresh tokens; absent on access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    fn issue(&self, user_id: i64, email: &str, ttl: Duration, typ: Option<&str>) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            user_id,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
            typ: typ.map(str::to_string),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn issue_access(&self, user_id: i64, email: &str) -> anyhow::Result<String> {
        self.issue(user_id, email, self.access_ttl, None)
    }

    pub fn issue_refresh(&self, user_id: i64, email: &str) -> anyhow::Result<String> {
        self.issue(user_id, email, self.refresh_ttl, Some("refresh"))
    }

    fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        decode::<Claims>(token, &self.decoding, &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Verify an access token. Refresh tokens are rejected.
    pub fn verify_access(&self, token: &str) -> Option<Claims> {
        let claims = self.verify(token)?;
        if claims.typ.is_some() {
            return None;
        }
        Some(claims)
    }

    /// Verify a refresh token. Access tokens are rejected.
    pub fn verify_refresh(&self, token: &str) -> Option<Claims> {
        let claims = self.verify(token)?;
        if claims.typ.as_deref() != Some("refresh") {
            return None;
        }
        Some(claims)
    }
}
