//!
//! # Token Issuer
//!
//! Mints access tokens, rotates the persisted refresh token that pairs with
//! them, and verifies tokens of either kind.
//!
//! The design is stateless JWT plus an append-only revocation table: a valid
//! signature is necessary but never sufficient. `verify_access_token` always
//! cross-checks the refresh-token store, so a structurally valid, unexpired
//! JWT whose paired row was revoked (or never written) is unauthorized. "No
//! matching active row" and "revoked" are deliberately indistinguishable.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::HeaderVerdict;
use crate::error::AppError;
use crate::models::{RefreshToken, User};
use crate::stores::{CredentialStore, RefreshTokenStore};

/// Claims encoded within an issued JWT.
///
/// Issuer and audience are neither set nor validated; identity is carried by
/// the subject username and the email claim, which the verifier resolves back
/// to a user record.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user's username.
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
}

/// Signing configuration, injected rather than read from ambient state.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_minutes: i64,
}

/// Builds a signed HMAC-SHA-256 token for the user with a fixed expiry from
/// the configured duration.
pub fn encode_jwt(config: &JwtConfig, user: &User) -> Result<String, AppError> {
    let expires_at = Utc::now() + Duration::minutes(config.expiration_minutes);
    let claims = Claims {
        sub: user.username.clone(),
        email: user.email.clone(),
        roles: user.roles.iter().map(|r| r.to_string()).collect(),
        exp: expires_at.timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(Into::into)
}

/// Parses a token and checks its signature. The lifetime claim is checked
/// only when `validate_lifetime` is set; the refresh path deliberately skips
/// it so an expired token's email claim can still be read. No clock skew is
/// allowed.
pub fn decode_jwt(secret: &str, token: &str, validate_lifetime: bool) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = validate_lifetime;
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(Into::into)
}

/// Strips the conventional `"Bearer "` prefix from an `Authorization` header
/// value, if present.
pub fn strip_bearer(header_value: &str) -> &str {
    header_value
        .strip_prefix("Bearer ")
        .unwrap_or(header_value)
        .trim()
}

pub struct TokenIssuer {
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    jwt: JwtConfig,
}

impl TokenIssuer {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        jwt: JwtConfig,
    ) -> Self {
        Self {
            credentials,
            refresh_tokens,
            jwt,
        }
    }

    /// Verifies the credentials and mints a signed access token.
    pub async fn issue_access_token(
        &self,
        username: &str,
        password: &str,
    ) -> Result<String, AppError> {
        let user = match self.credentials.find_by_username(username).await? {
            Some(user) => user,
            None => {
                warn!("token requested for unknown username");
                return Err(AppError::InvalidCredentials("Username is incorrect".into()));
            }
        };

        if !self.credentials.check_password(&user, password).await? {
            warn!("token requested with incorrect password for {}", username);
            return Err(AppError::InvalidCredentials("Username is incorrect".into()));
        }

        let token = encode_jwt(&self.jwt, &user)?;
        info!("access token issued for {}", username);
        Ok(token)
    }

    /// Signs a token for an already-resolved user, without a password check.
    /// Used by the refresh flow after the presented token has been verified.
    pub fn sign_for(&self, user: &User) -> Result<String, AppError> {
        encode_jwt(&self.jwt, user)
    }

    /// Rotates the user's refresh token: every currently-active row is revoked
    /// and a fresh one carrying `token` is inserted. A new login therefore
    /// invalidates older sessions' refresh capability, though access tokens
    /// they already hold stay valid until their own expiry.
    ///
    /// The revoke+insert pair is not serialized against concurrent calls for
    /// the same user; last write wins.
    pub async fn issue_refresh_token(
        &self,
        user: &User,
        token: &str,
    ) -> Result<RefreshToken, AppError> {
        let now = Utc::now();
        let revoked = self.refresh_tokens.revoke_all_for_user(user.id, now).await?;
        if revoked > 0 {
            info!("revoked {} prior refresh token(s) for {}", revoked, user.username);
        }

        let row = RefreshToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token: token.to_owned(),
            expires_at: now + Duration::minutes(self.jwt.expiration_minutes),
            revoked: None,
            created_at: now,
        };
        self.refresh_tokens.insert(&row).await?;
        info!("refresh token saved for {}", user.username);
        Ok(row)
    }

    /// The per-request decode-and-check routine behind the auth gate.
    ///
    /// Signature and lifetime are validated, the email claim must resolve to
    /// a user, and the verdict's `authorized` flag is exactly "an active
    /// refresh row with this token string exists for this user".
    pub async fn verify_access_token(
        &self,
        header_value: &str,
    ) -> Result<HeaderVerdict, AppError> {
        let token = strip_bearer(header_value);
        if token.is_empty() {
            return Err(AppError::Unauthenticated(
                "Please log in and pass the token".into(),
            ));
        }

        let claims = decode_jwt(&self.jwt.secret, token, true)?;

        let user = self
            .credentials
            .find_by_email(&claims.email)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".into()))?;

        let active_row = self.refresh_tokens.find_active(token, user.id).await?;

        Ok(HeaderVerdict {
            authorized: active_row.is_some(),
            user_id: user.id,
        })
    }

    /// Resolves a (possibly expired) token back to its user so a new token
    /// pair can be issued. Signature is still enforced; the lifetime claim is
    /// not, by design.
    pub async fn verify_refresh_token(
        &self,
        expired_token: &str,
    ) -> Result<HeaderVerdict, AppError> {
        let token = strip_bearer(expired_token);
        if token.is_empty() {
            return Err(AppError::Unauthenticated("Token not found".into()));
        }

        let claims = decode_jwt(&self.jwt.secret, token, false)?;

        let user = self
            .credentials
            .find_by_email(&claims.email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        Ok(HeaderVerdict {
            authorized: true,
            user_id: user.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test_secret_for_gen_verify".to_string(),
            expiration_minutes: 30,
        }
    }

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            email: "testuser@example.com".to_string(),
            password_hash: "hash".to_string(),
            email_confirmed: true,
            roles: vec![Role::User],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_encode_and_decode_round_trip() {
        let config = test_config();
        let user = test_user();

        let token = encode_jwt(&config, &user).unwrap();
        let claims = decode_jwt(&config.secret, &token, true).unwrap();

        assert_eq!(claims.sub, "testuser");
        assert_eq!(claims.email, "testuser@example.com");
        assert_eq!(claims.roles, vec!["user".to_string()]);
    }

    #[test]
    fn test_expired_token_rejected_only_when_lifetime_validated() {
        let config = JwtConfig {
            expiration_minutes: -5, // already expired at issuance
            ..test_config()
        };
        let user = test_user();
        let token = encode_jwt(&config, &user).unwrap();

        match decode_jwt(&config.secret, &token, true) {
            Err(AppError::TokenInvalid(msg)) => assert!(msg.contains("ExpiredSignature")),
            Ok(_) => panic!("Token should have been invalid due to expiration"),
            Err(e) => panic!("Unexpected error type for expired token: {:?}", e),
        }

        // The refresh path reads the same token with lifetime validation off.
        let claims = decode_jwt(&config.secret, &token, false).unwrap();
        assert_eq!(claims.email, "testuser@example.com");
    }

    #[test]
    fn test_wrong_secret_rejected_even_without_lifetime_validation() {
        let config = test_config();
        let token = encode_jwt(&config, &test_user()).unwrap();

        for validate_lifetime in [true, false] {
            match decode_jwt("a_completely_different_secret", &token, validate_lifetime) {
                Err(AppError::TokenInvalid(msg)) => {
                    assert!(
                        msg.contains("InvalidSignature") || msg.contains("InvalidToken"),
                        "Unexpected message: {}",
                        msg
                    );
                }
                Ok(_) => panic!("Token should have been invalid due to signature mismatch"),
                Err(e) => panic!("Unexpected error type for invalid signature: {:?}", e),
            }
        }
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc.def.ghi"), "abc.def.ghi");
        assert_eq!(strip_bearer("abc.def.ghi"), "abc.def.ghi");
        assert_eq!(strip_bearer("Bearer "), "");
        assert_eq!(strip_bearer(""), "");
    }
}
