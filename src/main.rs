use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::sync::Arc;

use taskpilot::auth::{AuthGate, JwtConfig, SessionService, TokenIssuer};
use taskpilot::config::Config;
use taskpilot::routes;
use taskpilot::stores::mailgun::MailgunSender;
use taskpilot::stores::postgres::{PgCredentialStore, PgRefreshTokenStore};
use taskpilot::stores::{CredentialStore, EmailSender, RefreshTokenStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let credentials: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool.clone()));
    let refresh_tokens: Arc<dyn RefreshTokenStore> = Arc::new(PgRefreshTokenStore::new(pool));
    let email: Arc<dyn EmailSender> = Arc::new(MailgunSender::new(&config));

    let issuer = Arc::new(TokenIssuer::new(
        credentials.clone(),
        refresh_tokens.clone(),
        JwtConfig {
            secret: config.jwt_secret.clone(),
            expiration_minutes: config.jwt_expiration_minutes,
        },
    ));
    let gate = AuthGate::new(issuer.clone());
    let service = web::Data::new(SessionService::new(
        credentials,
        refresh_tokens,
        email,
        issuer,
        gate,
        config.base_url.clone(),
    ));

    log::info!("Starting TaskPilot server at {}", config.server_url());

    let host = config.server_host.clone();
    let port = config.server_port;

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(routes::health::health)
            .service(web::scope("/api").configure(routes::config))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
