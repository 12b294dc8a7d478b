//! Mailgun HTTP implementation of [`EmailSender`]. The original system
//! shipped with interchangeable providers; the trait is the seam, so a
//! different provider only needs its own `EmailSender` impl.

use async_trait::async_trait;
use log::{error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::stores::EmailSender;

pub struct MailgunSender {
    http: reqwest::Client,
    api_base: String,
    domain: String,
    api_key: String,
    from: String,
}

impl MailgunSender {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.mailgun_api_base.clone(),
            domain: config.mailgun_domain.clone(),
            api_key: config.mailgun_api_key.clone(),
            from: config.email_from.clone(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.domain)
    }
}

#[async_trait]
impl EmailSender for MailgunSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.messages_url())
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.from.as_str()),
                ("to", to),
                ("subject", subject),
                ("html", html_body),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("mailgun rejected message to {}: {} {}", to, status, body);
            return Err(AppError::InternalServerError(format!(
                "Failed to send email: {} {}",
                status, body
            )));
        }

        info!("email sent to {}", to);
        Ok(())
    }
}
