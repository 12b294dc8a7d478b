pub mod auth;
pub mod health;
pub mod users;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::login)
            .service(auth::register)
            .service(auth::resend_verification)
            .service(auth::verify_email)
            .service(auth::forgot_password)
            .service(auth::reset_password)
            .service(auth::refresh),
    )
    .service(web::scope("/users").service(users::delete_user));
}
