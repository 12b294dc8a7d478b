//!
//! # Session/Account Service
//!
//! Orchestrates login, registration, email verification, the OTP-based
//! forgot-password flow, token refresh and account deletion by composing the
//! token issuer with the injected credential store and email sender.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use log::{error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::gate::AuthGate;
use crate::auth::token::TokenIssuer;
use crate::auth::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
    ResendVerificationRequest, ResetPasswordRequest, TokenResponse, VerifyEmailQuery,
};
use crate::error::AppError;
use crate::models::{Role, User};
use crate::stores::{CredentialStore, EmailSender, RefreshTokenStore};

pub struct SessionService {
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    email: Arc<dyn EmailSender>,
    issuer: Arc<TokenIssuer>,
    gate: AuthGate,
    /// Public base URL embedded in emailed verification links.
    base_url: String,
}

impl SessionService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        email: Arc<dyn EmailSender>,
        issuer: Arc<TokenIssuer>,
        gate: AuthGate,
        base_url: String,
    ) -> Self {
        Self {
            credentials,
            refresh_tokens,
            email,
            issuer,
            gate,
            base_url,
        }
    }

    /// Anything containing `@` is treated as an email address, otherwise as a
    /// username.
    async fn find_by_email_or_username(&self, name: &str) -> Result<Option<User>, AppError> {
        if name.contains('@') {
            self.credentials.find_by_email(name).await
        } else {
            self.credentials.find_by_username(name).await
        }
    }

    /// Verifies the credentials, mints an access token and persists it as the
    /// user's (single) active refresh token.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AppError> {
        info!("user {} is logging in", request.username);

        let user = match self.find_by_email_or_username(&request.username).await? {
            Some(user) => user,
            None => {
                warn!("login attempt for non-existent user: {}", request.username);
                return Err(AppError::InvalidCredentials(
                    "Invalid username or email".into(),
                ));
            }
        };

        if !self.credentials.check_password(&user, &request.password).await? {
            warn!("invalid password for {}", user.username);
            return Err(AppError::InvalidCredentials("Invalid password".into()));
        }

        let token = self
            .issuer
            .issue_access_token(&user.username, &request.password)
            .await?;
        self.issuer.issue_refresh_token(&user, &token).await?;

        info!("user {} has successfully logged in", user.username);
        Ok(AuthResponse { token })
    }

    /// Creates an account and sends the email-confirmation link. Success is
    /// reported only once the email has been dispatched.
    pub async fn register(&self, request: &RegisterRequest) -> Result<String, AppError> {
        info!("user {} is registering", request.username);

        if request.password != request.confirm_password {
            warn!("password and confirm password do not match");
            return Err(AppError::BadRequest(
                "Password and confirm password do not match".into(),
            ));
        }

        if let Some(existing) = self.credentials.find_by_email(&request.email).await? {
            warn!("user with the same email already exists");
            return Err(AppError::BadRequest(format!(
                "User {} with the same email {} already exists",
                existing.username, existing.email
            )));
        }

        let user = self
            .credentials
            .create_user(&request.username, &request.email, &request.password)
            .await
            .map_err(|e| {
                error!("user registration failed for {}: {}", request.username, e);
                AppError::InternalServerError(format!("Failed to register user: {}", e))
            })?;

        self.send_verification_email(&user).await.map_err(|e| {
            error!("failed to send verification email: {}", e);
            AppError::InternalServerError(format!("Failed to send email: {}", e))
        })?;

        info!("user {} registered, verification pending", user.username);
        Ok("Email sent successfully, please check your email to verify".into())
    }

    async fn send_verification_email(&self, user: &User) -> Result<(), AppError> {
        let token = self
            .credentials
            .generate_email_confirmation_token(user)
            .await?;
        let encoded_token = URL_SAFE_NO_PAD.encode(token.as_bytes());
        let verification_link = format!(
            "{}/api/auth/verify-email?email={}&token={}",
            self.base_url, user.email, encoded_token
        );
        let body = format!(
            "<html><body><p>Thank you for registering! Click here \
             <a href='{}'>Verification Link</a> to verify your email.</p></body></html>",
            verification_link
        );

        self.email.send(&user.email, "Confirm Email", &body).await
    }

    /// No-op success when the email is already confirmed; `NotFound` when the
    /// email is unknown.
    pub async fn resend_verification_link(
        &self,
        request: &ResendVerificationRequest,
    ) -> Result<String, AppError> {
        info!("resending verification link");

        let user = self
            .credentials
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".into()))?;

        if user.email_confirmed {
            info!("user {} is already verified", user.username);
            return Ok("User is already verified".into());
        }

        self.send_verification_email(&user).await.map_err(|e| {
            error!("failed to resend verification email: {}", e);
            AppError::InternalServerError("Failed to resend verification email".into())
        })?;

        Ok(format!(
            "Verification email has been resent successfully for user {}",
            user.username
        ))
    }

    /// Consumes the base64url-encoded token from the emailed link and marks
    /// the email confirmed.
    pub async fn verify_email(&self, query: &VerifyEmailQuery) -> Result<String, AppError> {
        info!("verifying email {}", query.email);

        let decoded = URL_SAFE_NO_PAD
            .decode(query.token.as_bytes())
            .map_err(|_| AppError::BadRequest("Malformed verification token".into()))?;
        let token = String::from_utf8(decoded)
            .map_err(|_| AppError::BadRequest("Malformed verification token".into()))?;

        let user = self
            .credentials
            .find_by_email(&query.email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        if !self.credentials.confirm_email(&user, &token).await? {
            error!("email verification failed for {}", query.email);
            return Err(AppError::BadRequest("Invalid email or token".into()));
        }

        info!("user {} verified successfully", user.username);
        Ok("Email verified successfully".into())
    }

    /// Emails a time-limited one-time code. Unknown or unconfirmed emails are
    /// rejected alike, without revealing which.
    pub async fn forgot_password_generate_otp(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<String, AppError> {
        info!("generating forgot-password OTP");

        let user = self
            .credentials
            .find_by_email(&request.email)
            .await?
            .filter(|u| u.email_confirmed)
            .ok_or_else(|| AppError::NotFound("Invalid email".into()))?;

        let otp = self.credentials.generate_two_factor_token(&user).await?;
        let body = format!(
            "<html><body><p>Your OTP for password reset is: {}</p></body></html>",
            otp
        );

        self.email
            .send(&request.email, "Password Reset OTP", &body)
            .await
            .map_err(|e| {
                warn!("failed to send OTP email: {}", e);
                AppError::InternalServerError(format!("Failed to send OTP email: {}", e))
            })?;

        info!("OTP sent to user {}", user.username);
        Ok("OTP sent successfully to your registered email".into())
    }

    /// Verifies the OTP, then generates and immediately consumes a
    /// password-reset token to set the new password.
    pub async fn reset_password_with_otp(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<String, AppError> {
        info!("resetting password");

        if request.new_password != request.confirm_password {
            return Err(AppError::BadRequest(
                "Password and confirm password do not match".into(),
            ));
        }

        let user = self
            .credentials
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid email".into()))?;

        if !self
            .credentials
            .verify_two_factor_token(&user, &request.otp)
            .await?
        {
            warn!("invalid OTP for {}", user.username);
            return Err(AppError::NotFound("Invalid OTP".into()));
        }

        let reset_token = self.credentials.generate_password_reset_token(&user).await?;
        if !self
            .credentials
            .reset_password(&user, &reset_token, &request.new_password)
            .await?
        {
            error!("failed to reset password for {}", user.username);
            return Err(AppError::InternalServerError(
                "Failed to reset password".into(),
            ));
        }

        info!("password has been reset for {}", user.username);
        Ok("Password has been reset successfully".into())
    }

    /// Exchanges a stored, unrevoked token for a fresh one. A token that was
    /// revoked and a token that was never issued are rejected identically.
    pub async fn refresh_token(
        &self,
        request: &RefreshTokenRequest,
    ) -> Result<TokenResponse, AppError> {
        info!("generating new refresh token");

        if self
            .refresh_tokens
            .find_active_by_token(&request.token)
            .await?
            .is_none()
        {
            warn!("refresh rejected, token is revoked or unknown");
            return Err(AppError::Revoked("Token is revoked".into()));
        }

        // The presented token may be past its lifetime; only its signature and
        // email claim matter here.
        let verdict = self
            .issuer
            .verify_refresh_token(&request.token)
            .await
            .map_err(|e| {
                warn!("failed to decode token for refresh: {}", e);
                AppError::NotFound("Failed to decode token".into())
            })?;

        let user = self
            .credentials
            .find_by_id(verdict.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User cannot be found".into()))?;

        if user.email != request.email {
            warn!("refresh rejected, email does not match decoded token");
            return Err(AppError::NotFound("Invalid user, cannot find email".into()));
        }

        let token = self.issuer.sign_for(&user)?;
        self.issuer.issue_refresh_token(&user, &token).await?;

        info!("token refreshed for {}", user.username);
        Ok(TokenResponse {
            email: user.email,
            token,
        })
    }

    /// Deletes an account. The caller must pass the auth gate and be either
    /// an admin or the target themself.
    pub async fn delete_user(
        &self,
        target_id: Uuid,
        caller_token: &str,
    ) -> Result<String, AppError> {
        let caller_id = self.gate.require(caller_token).await?;

        let caller = self
            .credentials
            .find_by_id(caller_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Requesting user not found".into()))?;

        let target = self
            .credentials
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let caller_is_admin = self.credentials.is_in_role(&caller, Role::Admin).await?;
        if !(caller_is_admin || target_id == caller_id) {
            return Err(AppError::Forbidden(
                "You are not authorized to delete this user".into(),
            ));
        }

        self.credentials.delete_user(&target).await.map_err(|e| {
            error!("failed to delete user {}: {}", target.username, e);
            AppError::InternalServerError("Failed to delete user".into())
        })?;

        info!("user {} deleted successfully", target.username);
        Ok(format!("User {} deleted successfully", target.username))
    }
}
