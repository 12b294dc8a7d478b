//! In-memory implementations of the collaborator traits, so the token
//! lifecycle can be exercised end-to-end without Postgres or an email
//! provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use taskpilot::auth::{AuthGate, JwtConfig, SessionService, TokenIssuer};
use taskpilot::error::AppError;
use taskpilot::models::{RefreshToken, Role, User};
use taskpilot::stores::{CredentialStore, EmailSender, RefreshTokenStore};

pub const TEST_SECRET: &str = "test-secret";

/// Fake passwords are stored with a marker prefix instead of bcrypt, keeping
/// the tests fast; hashing is the credential store's own concern.
fn fake_hash(password: &str) -> String {
    format!("plain:{}", password)
}

#[derive(Debug, Clone)]
struct OneTimeToken {
    user_id: Uuid,
    purpose: String,
    token: String,
    consumed: bool,
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    users: Mutex<Vec<User>>,
    tokens: Mutex<Vec<OneTimeToken>>,
    email_lookups: AtomicUsize,
    username_lookups: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn add_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        email_confirmed: bool,
        roles: Vec<Role>,
    ) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: fake_hash(password),
            email_confirmed,
            roles,
            created_at: Utc::now(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn email_lookup_count(&self) -> usize {
        self.email_lookups.load(Ordering::SeqCst)
    }

    pub fn username_lookup_count(&self) -> usize {
        self.username_lookups.load(Ordering::SeqCst)
    }

    /// Most recently issued unconsumed token for the user and purpose.
    pub fn latest_token(&self, user_id: Uuid, purpose: &str) -> Option<String> {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|t| t.user_id == user_id && t.purpose == purpose && !t.consumed)
            .map(|t| t.token.clone())
    }

    fn issue(&self, user: &User, purpose: &str, token: String) -> String {
        self.tokens.lock().unwrap().push(OneTimeToken {
            user_id: user.id,
            purpose: purpose.to_string(),
            token: token.clone(),
            consumed: false,
        });
        token
    }

    fn consume(&self, user: &User, purpose: &str, token: &str) -> bool {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens
            .iter_mut()
            .find(|t| t.user_id == user.id && t.purpose == purpose && t.token == token && !t.consumed)
        {
            Some(entry) => {
                entry.consumed = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.username_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.email_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool, AppError> {
        Ok(user.password_hash == fake_hash(password))
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        Ok(self.add_user(username, email, password, false, vec![Role::User]))
    }

    async fn generate_email_confirmation_token(&self, user: &User) -> Result<String, AppError> {
        Ok(self.issue(user, "email_confirm", Uuid::new_v4().simple().to_string()))
    }

    async fn confirm_email(&self, user: &User, token: &str) -> Result<bool, AppError> {
        if !self.consume(user, "email_confirm", token) {
            return Ok(false);
        }
        let mut users = self.users.lock().unwrap();
        if let Some(stored) = users.iter_mut().find(|u| u.id == user.id) {
            stored.email_confirmed = true;
        }
        Ok(true)
    }

    async fn generate_two_factor_token(&self, user: &User) -> Result<String, AppError> {
        let otp = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        Ok(self.issue(user, "two_factor", otp))
    }

    async fn verify_two_factor_token(&self, user: &User, token: &str) -> Result<bool, AppError> {
        Ok(self.consume(user, "two_factor", token))
    }

    async fn generate_password_reset_token(&self, user: &User) -> Result<String, AppError> {
        Ok(self.issue(user, "password_reset", Uuid::new_v4().simple().to_string()))
    }

    async fn reset_password(
        &self,
        user: &User,
        token: &str,
        new_password: &str,
    ) -> Result<bool, AppError> {
        if !self.consume(user, "password_reset", token) {
            return Ok(false);
        }
        let mut users = self.users.lock().unwrap();
        if let Some(stored) = users.iter_mut().find(|u| u.id == user.id) {
            stored.password_hash = fake_hash(new_password);
        }
        Ok(true)
    }

    async fn is_in_role(&self, user: &User, role: Role) -> Result<bool, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user.id)
            .map(|u| u.roles.contains(&role))
            .unwrap_or(false))
    }

    async fn delete_user(&self, user: &User) -> Result<(), AppError> {
        self.users.lock().unwrap().retain(|u| u.id != user.id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    rows: Mutex<Vec<RefreshToken>>,
}

impl MemoryRefreshTokenStore {
    pub fn active_count(&self, user_id: Uuid) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id && r.is_active())
            .count()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn find_active(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<RefreshToken>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.token == token && r.user_id == user_id && r.is_active())
            .cloned())
    }

    async fn find_active_by_token(&self, token: &str) -> Result<Option<RefreshToken>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.token == token && r.is_active())
            .cloned())
    }

    async fn insert(&self, row: &RefreshToken) -> Result<(), AppError> {
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let mut revoked = 0;
        for row in rows.iter_mut().filter(|r| r.user_id == user_id && r.is_active()) {
            row.revoked = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct MemoryEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
}

impl MemoryEmailSender {
    pub fn fail_next_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for MemoryEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(
                "simulated email provider outage".into(),
            ));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        });
        Ok(())
    }
}

/// Fully wired backend over the in-memory fakes.
pub struct TestBackend {
    pub credentials: Arc<MemoryCredentialStore>,
    pub refresh_tokens: Arc<MemoryRefreshTokenStore>,
    pub email: Arc<MemoryEmailSender>,
    pub issuer: Arc<TokenIssuer>,
    pub gate: AuthGate,
    pub service: SessionService,
}

pub fn backend() -> TestBackend {
    backend_with_expiration(30)
}

/// A negative expiration produces tokens that are already expired when
/// issued, which the refresh path must still accept.
pub fn backend_with_expiration(expiration_minutes: i64) -> TestBackend {
    let credentials = Arc::new(MemoryCredentialStore::default());
    let refresh_tokens = Arc::new(MemoryRefreshTokenStore::default());
    let email = Arc::new(MemoryEmailSender::default());

    let issuer = Arc::new(TokenIssuer::new(
        credentials.clone(),
        refresh_tokens.clone(),
        JwtConfig {
            secret: TEST_SECRET.to_string(),
            expiration_minutes,
        },
    ));
    let gate = AuthGate::new(issuer.clone());
    let service = SessionService::new(
        credentials.clone(),
        refresh_tokens.clone(),
        email.clone(),
        issuer.clone(),
        gate.clone(),
        "http://127.0.0.1:8080".to_string(),
    );

    TestBackend {
        credentials,
        refresh_tokens,
        email,
        issuer,
        gate,
        service,
    }
}
