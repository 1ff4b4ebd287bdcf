use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::env;
use uuid::Uuid;

use super::model::Claims;

const DEFAULT_JWT_SECRET: &str = "certificate-server-jwt-secret-change-in-production";
const TOKEN_EXPIRY_SECONDS: i64 = 60 * 60; // 1 hour

fn get_jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| {
        log::warn!("JWT_SECRET not set, using default secret. SET THIS IN PRODUCTION!");
        DEFAULT_JWT_SECRET.to_string()
    })
}

/// Mint a session token. The host platform normally does this; the helper
/// here exists for local development and integration tests.
pub fn generate_token(
    user_id: Uuid,
    full_name: &str,
    email: &str,
    caps: Vec<String>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        full_name: full_name.to_string(),
        email: email.to_string(),
        caps,
        exp: now + TOKEN_EXPIRY_SECONDS as usize,
        iat: now,
    };

    let secret = get_jwt_secret();
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate and decode a token.
pub fn validate_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = get_jwt_secret();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
