use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub company_id: i64,
    pub subdomain: String,
    pub database: String,
    pub employee_id: i64,
    pub username: String,
    pub role: String,
    /// Platform operator token for /api/root
    #[serde(default)]
    pub root: bool,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(
        company_id: i64,
        subdomain: String,
        database: String,
        employee_id: i64,
        username: String,
        role: String,
    ) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            company_id,
            subdomain,
            database,
            employee_id,
            username,
            role,
            root: false,
            exp,
            iat: now.timestamp(),
        }
    }

    /// Claims for a platform operator, not bound to any company
    pub fn root(username: String, hours: i64) -> Self {
        let now = Utc::now();
        Self {
            company_id: 0,
            subdomain: String::new(),
            database: String::new(),
            employee_id: 0,
            username,
            role: "root".to_string(),
            root: true,
            exp: (now + Duration::hours(hours)).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn expires_in(&self) -> i64 {
        self.exp - self.iat
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidToken(String),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
            JwtError::InvalidSecret => write!(f, "JWT secret not configured"),
        }
    }
}

impl std::error::Error for JwtError {}

fn secret() -> Result<&'static str, JwtError> {
    let secret = config::config().security.jwt_secret.as_str();
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    Ok(secret)
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let encoding_key = EncodingKey::from_secret(secret()?.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn decode_jwt(token: &str) -> Result<Claims, JwtError> {
    let decoding_key = DecodingKey::from_secret(secret()?.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

/// Argon2id hash in PHC string format
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| e.to_string())
}

/// False for a wrong password and for a hash that does not parse
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

/// Staff number shown on badges: "EMP" + 6 digits
pub fn new_employee_code() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 1_000_000;
    format!("EMP{:06}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("s3cret!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret!", &hash));
        assert!(!verify_password("s3cret?", &hash));
        assert!(!verify_password("s3cret!", "not-a-hash"));
    }

    #[test]
    fn jwt_round_trips_claims() {
        let claims = Claims::new(4, "acme".into(), "fleet_acme".into(), 12, "jdoe".into(), "manager".into());
        let token = generate_jwt(&claims).unwrap();
        let decoded = decode_jwt(&token).unwrap();
        assert_eq!(decoded.company_id, 4);
        assert_eq!(decoded.database, "fleet_acme");
        assert_eq!(decoded.role, "manager");
        assert!(!decoded.root);
        assert!(decode_jwt("garbage.token.value").is_err());
    }

    #[test]
    fn employee_codes_have_fixed_shape() {
        let code = new_employee_code();
        assert_eq!(code.len(), 9);
        assert!(code.starts_with("EMP"));
        assert!(code[3..].chars().all(|c| c.is_ascii_digit()));
    }
}
