use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult, AuthError};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
    pub jti: Uuid,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Session,
    Confirmation,
}

fn create_token(
    user_id: Uuid,
    email: &str,
    token_type: TokenType,
    ttl_secs: i64,
    config: &Config,
) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        iat: now.timestamp(),
        token_type,
        jti: Uuid::new_v4(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create {:?} token: {}", token_type, e)))
}

pub fn create_session_token(user_id: Uuid, email: &str, config: &Config) -> AppResult<String> {
    create_token(user_id, email, TokenType::Session, config.session_ttl_secs, config)
}

pub fn create_confirmation_token(user_id: Uuid, email: &str, config: &Config) -> AppResult<String> {
    create_token(
        user_id,
        email,
        TokenType::Confirmation,
        config.confirmation_ttl_secs,
        config,
    )
}

/// Compute SHA-256 hash of a raw token string, returned as lowercase hex.
pub fn hash_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Decodes `token` and checks its signature, expiry and type.
pub fn verify_token(token: &str, expected: TokenType, config: &Config) -> AppResult<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthError::InvalidToken)?
    .claims;

    if claims.token_type != expected {
        return Err(AuthError::InvalidToken.into());
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            jwt_secret: "test-secret-with-enough-length".into(),
            ..Config::default()
        }
    }

    #[test]
    fn test_session_token_round_trip() {
        let config = config();
        let user_id = Uuid::new_v4();
        let token = create_session_token(user_id, "a@b.com", &config).unwrap();

        let claims = verify_token(&token, TokenType::Session, &config).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "a@b.com");
        assert!(claims.expires_at() > Utc::now());
    }

    #[test]
    fn test_token_type_is_enforced() {
        let config = config();
        let token = create_confirmation_token(Uuid::new_v4(), "a@b.com", &config).unwrap();
        assert!(verify_token(&token, TokenType::Session, &config).is_err());
        assert!(verify_token(&token, TokenType::Confirmation, &config).is_ok());
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = Config {
            session_ttl_secs: -60,
            ..config()
        };
        let token = create_session_token(Uuid::new_v4(), "a@b.com", &config).unwrap();
        assert!(verify_token(&token, TokenType::Session, &config).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_session_token(Uuid::new_v4(), "a@b.com", &config()).unwrap();
        let other = Config {
            jwt_secret: "a-different-secret-entirely".into(),
            ..Config::default()
        };
        assert!(verify_token(&token, TokenType::Session, &other).is_err());
    }

    #[test]
    fn test_hash_token_deterministic() {
        let h1 = hash_token("test-session-token-value");
        let h2 = hash_token("test-session-token-value");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64); // SHA-256 hex = 64 chars
        assert_ne!(h1, hash_token("token-b"));
    }
}
