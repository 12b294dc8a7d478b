pub mod gate;
pub mod password;
pub mod session;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// Re-export necessary items
pub use gate::AuthGate;
pub use password::{hash_password, verify_password};
pub use session::SessionService;
pub use token::{decode_jwt, encode_jwt, Claims, JwtConfig, TokenIssuer};

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// The per-request authorization verdict produced by the auth gate.
///
/// `authorized` is not "the signature checked out": it is true only when an
/// active (non-revoked) refresh-token row exists for this exact token string
/// and user. Never persisted.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HeaderVerdict {
    pub authorized: bool,
    pub user_id: Uuid,
}

/// Payload for a login request. The `username` field accepts either a
/// username or an email address; anything containing `@` is looked up by
/// email.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    /// Must be at least 6 characters long.
    #[validate(length(min = 6))]
    pub password: String,
}

/// Payload for a new user registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Between 3 and 32 characters, alphanumeric, underscores or hyphens.
    #[validate(
        length(min = 3, max = 32),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    /// Must equal `password`; the mismatch check itself is a service rule,
    /// not a field validation.
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email)]
    pub email: String,
}

/// Query parameters of the emailed verification link.
#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub email: String,
    /// base64url-encoded (no padding) confirmation token.
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub otp: String,
    #[validate(length(min = 6))]
    pub new_password: String,
    pub confirm_password: String,
}

/// Payload for the token-refresh endpoint: the (possibly expired) token last
/// issued to the caller, plus the email it was issued to.
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub token: String,
}

/// Response after a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The signed JWT, also persisted server-side as the active refresh token.
    pub token: String,
}

/// Response after a successful token refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub email: String,
    pub token: String,
}
