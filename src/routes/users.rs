use crate::{auth::SessionService, error::AppError};
use actix_web::{delete, http::header, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;

/// Delete a user account.
///
/// The bearer token from the `Authorization` header is handed to the service
/// verbatim; the auth gate and the admin-or-self check run there.
#[delete("/{id}")]
pub async fn delete_user(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let message = service.delete_user(path.into_inner(), token).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": message })))
}
