//!
//! # Auth Gate
//!
//! The per-request check every protected operation runs before doing its
//! work. There is no session cache: each call re-derives the verdict from
//! the refresh-token table, so revocation takes effect on the very next
//! request.

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::token::TokenIssuer;
use crate::auth::HeaderVerdict;
use crate::error::AppError;

#[derive(Clone)]
pub struct AuthGate {
    issuer: Arc<TokenIssuer>,
}

impl AuthGate {
    pub fn new(issuer: Arc<TokenIssuer>) -> Self {
        Self { issuer }
    }

    /// Resolves a bearer header value to a verdict without short-circuiting,
    /// for callers that want to inspect the `authorized` flag themselves.
    pub async fn check(&self, header_value: &str) -> Result<HeaderVerdict, AppError> {
        self.issuer.verify_access_token(header_value).await
    }

    /// Gate for protected operations: returns the caller's user id, or
    /// rejects with a 401-kind error when the token's paired refresh row has
    /// been revoked or never existed.
    pub async fn require(&self, header_value: &str) -> Result<Uuid, AppError> {
        let verdict = self.check(header_value).await?;
        if !verdict.authorized {
            return Err(AppError::Revoked(
                "Please log in again and pass the token".into(),
            ));
        }
        Ok(verdict.user_id)
    }
}
