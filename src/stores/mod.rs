//!
//! # Collaborator Interfaces
//!
//! The token lifecycle core talks to the outside world through three narrow
//! traits: the credential store (user records, password checks, one-time
//! confirmation/reset tokens), the refresh-token store (the append-only
//! revocation table) and the email sender. Production implementations live in
//! [`postgres`] and [`mailgun`]; tests substitute in-memory fakes.
//!
//! These are injected into the services as `Arc<dyn ...>` constructor
//! parameters, never reached through process-wide singletons.

pub mod mailgun;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{RefreshToken, Role, User};

/// User records and the identity-management capabilities built on them.
///
/// Password hashing and one-time token generation/verification (email
/// confirmation, two-factor OTP, password reset) are capabilities of this
/// collaborator; the core only transports the opaque strings it hands out.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Checks a plaintext password against the stored hash. No lockout policy.
    async fn check_password(&self, user: &User, password: &str) -> Result<bool, AppError>;

    /// Creates a user with the `user` role and an unconfirmed email.
    /// The store hashes the password.
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError>;

    async fn generate_email_confirmation_token(&self, user: &User) -> Result<String, AppError>;

    /// Consumes a confirmation token and marks the email confirmed.
    /// Returns `false` when the token does not verify.
    async fn confirm_email(&self, user: &User, token: &str) -> Result<bool, AppError>;

    /// Generates a time-limited one-time code for the forgot-password flow.
    async fn generate_two_factor_token(&self, user: &User) -> Result<String, AppError>;

    async fn verify_two_factor_token(&self, user: &User, token: &str) -> Result<bool, AppError>;

    async fn generate_password_reset_token(&self, user: &User) -> Result<String, AppError>;

    /// Consumes a reset token and replaces the stored password hash.
    /// Returns `false` when the token does not verify.
    async fn reset_password(
        &self,
        user: &User,
        token: &str,
        new_password: &str,
    ) -> Result<bool, AppError>;

    async fn is_in_role(&self, user: &User, role: Role) -> Result<bool, AppError>;

    async fn delete_user(&self, user: &User) -> Result<(), AppError>;
}

/// The append-only table of issued refresh tokens.
///
/// "Active" means the revocation timestamp is unset; rows are never deleted.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Active row matching this exact token string owned by this user.
    async fn find_active(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<RefreshToken>, AppError>;

    /// Active row matching this exact token string, regardless of owner.
    async fn find_active_by_token(&self, token: &str) -> Result<Option<RefreshToken>, AppError>;

    async fn insert(&self, row: &RefreshToken) -> Result<(), AppError>;

    /// Sets the revocation timestamp on every active row owned by `user_id`.
    /// Returns the number of rows revoked.
    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError>;
}

/// Outbound email delivery. The provider behind it is interchangeable.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError>;
}
