//! Thin HTTP handlers for the session/account operations. Each validates the
//! DTO and delegates to [`SessionService`]; status codes come from the
//! `AppError` mapping.

use crate::{
    auth::{
        ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
        ResendVerificationRequest, ResetPasswordRequest, SessionService, VerifyEmailQuery,
    },
    error::AppError,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

/// Log in with a username or email plus password, returning a signed token.
#[post("/login")]
pub async fn login(
    service: web::Data<SessionService>,
    body: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let response = service.login(&body).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Register a new account and send the email-confirmation link.
#[post("/register")]
pub async fn register(
    service: web::Data<SessionService>,
    body: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let message = service.register(&body).await?;
    Ok(HttpResponse::Created().json(json!({ "message": message })))
}

#[post("/resend-verification")]
pub async fn resend_verification(
    service: web::Data<SessionService>,
    body: web::Json<ResendVerificationRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let message = service.resend_verification_link(&body).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": message })))
}

/// Target of the emailed verification link.
#[get("/verify-email")]
pub async fn verify_email(
    service: web::Data<SessionService>,
    query: web::Query<VerifyEmailQuery>,
) -> Result<impl Responder, AppError> {
    let message = service.verify_email(&query).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": message })))
}

#[post("/forgot-password")]
pub async fn forgot_password(
    service: web::Data<SessionService>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let message = service.forgot_password_generate_otp(&body).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": message })))
}

#[post("/reset-password")]
pub async fn reset_password(
    service: web::Data<SessionService>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let message = service.reset_password_with_otp(&body).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": message })))
}

/// Exchange a stored (possibly expired) token for a fresh one.
#[post("/refresh")]
pub async fn refresh(
    service: web::Data<SessionService>,
    body: web::Json<RefreshTokenRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let response = service.refresh_token(&body).await?;
    Ok(HttpResponse::Ok().json(response))
}
