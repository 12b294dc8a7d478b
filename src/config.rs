use std::env;

/// Application configuration, loaded once at startup from the environment.
///
/// `DATABASE_URL` and `JWT_SECRET` are mandatory; everything else has a
/// development-friendly default. The JWT secret and expiry duration are inputs
/// to the token issuer, never hardcoded.
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Shared HMAC-SHA-256 signing secret, known only to the issuer.
    pub jwt_secret: String,
    /// Lifetime of issued access tokens and their paired refresh rows.
    pub jwt_expiration_minutes: i64,
    /// Public base URL used when building email verification links.
    pub base_url: String,
    pub mailgun_api_base: String,
    pub mailgun_domain: String,
    pub mailgun_api_key: String,
    pub email_from: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            jwt_expiration_minutes: env::var("JWT_EXPIRATION_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("JWT_EXPIRATION_MINUTES must be a number"),
            base_url: env::var("BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            mailgun_api_base: env::var("MAILGUN_API_BASE")
                .unwrap_or_else(|_| "https://api.mailgun.net/v3".to_string()),
            mailgun_domain: env::var("MAILGUN_DOMAIN").unwrap_or_default(),
            mailgun_api_key: env::var("MAILGUN_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "TaskPilot <no-reply@taskpilot.local>".to_string()),
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}
