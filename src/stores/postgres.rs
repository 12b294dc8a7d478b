//! Postgres-backed implementations of the collaborator traits, built on
//! `sqlx` runtime queries. The schema is in `schema.sql` at the crate root.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::models::{RefreshToken, Role, User};
use crate::stores::{CredentialStore, RefreshTokenStore};

/// Purpose tags for one-time tokens in the `user_tokens` table.
const PURPOSE_EMAIL_CONFIRM: &str = "email_confirm";
const PURPOSE_TWO_FACTOR: &str = "two_factor";
const PURPOSE_PASSWORD_RESET: &str = "password_reset";

/// Validity windows per purpose.
const EMAIL_CONFIRM_TTL_HOURS: i64 = 24;
const TWO_FACTOR_TTL_MINUTES: i64 = 10;
const PASSWORD_RESET_TTL_MINUTES: i64 = 15;

const USER_COLUMNS: &str = "id, username, email, password_hash, email_confirmed, roles, created_at";

/// Raw row shape; roles come back as a `text[]` column.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    email_confirmed: bool,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> User {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            email_confirmed: row.email_confirmed,
            roles: row.roles.iter().filter_map(|r| Role::parse(r)).collect(),
            created_at: row.created_at,
        }
    }
}

/// Six-digit numeric one-time code for the forgot-password flow.
fn generate_otp() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_where(&self, predicate: &str, value: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, predicate
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Stores a fresh one-time token for the user under the given purpose.
    async fn issue_token(
        &self,
        user: &User,
        purpose: &str,
        token: String,
        ttl: Duration,
    ) -> Result<String, AppError> {
        sqlx::query(
            "INSERT INTO user_tokens (id, user_id, purpose, token, expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(purpose)
        .bind(&token)
        .bind(Utc::now() + ttl)
        .execute(&self.pool)
        .await?;
        Ok(token)
    }

    /// Atomically consumes a matching, unexpired, unconsumed token.
    /// Returns whether one existed.
    async fn consume_token(
        &self,
        user: &User,
        purpose: &str,
        token: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE user_tokens SET consumed_at = NOW() \
             WHERE user_id = $1 AND purpose = $2 AND token = $3 \
               AND consumed_at IS NULL AND expires_at > NOW()",
        )
        .bind(user.id)
        .bind(purpose)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.find_where("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_where("email", email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool, AppError> {
        verify_password(password, &user.password_hash)
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let password_hash = hash_password(password)?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, username, email, password_hash, roles) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(vec![Role::User.as_str().to_string()])
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn generate_email_confirmation_token(&self, user: &User) -> Result<String, AppError> {
        self.issue_token(
            user,
            PURPOSE_EMAIL_CONFIRM,
            Uuid::new_v4().simple().to_string(),
            Duration::hours(EMAIL_CONFIRM_TTL_HOURS),
        )
        .await
    }

    async fn confirm_email(&self, user: &User, token: &str) -> Result<bool, AppError> {
        if !self.consume_token(user, PURPOSE_EMAIL_CONFIRM, token).await? {
            return Ok(false);
        }
        sqlx::query("UPDATE users SET email_confirmed = TRUE WHERE id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    async fn generate_two_factor_token(&self, user: &User) -> Result<String, AppError> {
        self.issue_token(
            user,
            PURPOSE_TWO_FACTOR,
            generate_otp(),
            Duration::minutes(TWO_FACTOR_TTL_MINUTES),
        )
        .await
    }

    async fn verify_two_factor_token(&self, user: &User, token: &str) -> Result<bool, AppError> {
        self.consume_token(user, PURPOSE_TWO_FACTOR, token).await
    }

    async fn generate_password_reset_token(&self, user: &User) -> Result<String, AppError> {
        self.issue_token(
            user,
            PURPOSE_PASSWORD_RESET,
            Uuid::new_v4().simple().to_string(),
            Duration::minutes(PASSWORD_RESET_TTL_MINUTES),
        )
        .await
    }

    async fn reset_password(
        &self,
        user: &User,
        token: &str,
        new_password: &str,
    ) -> Result<bool, AppError> {
        if !self
            .consume_token(user, PURPOSE_PASSWORD_RESET, token)
            .await?
        {
            return Ok(false);
        }
        let password_hash = hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    async fn is_in_role(&self, user: &User, role: Role) -> Result<bool, AppError> {
        let in_role = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND $2 = ANY(roles))",
        )
        .bind(user.id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(in_role)
    }

    async fn delete_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn find_active(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<RefreshToken>, AppError> {
        let row = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token, expires_at, revoked, created_at FROM refresh_tokens \
             WHERE token = $1 AND user_id = $2 AND revoked IS NULL",
        )
        .bind(token)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_active_by_token(&self, token: &str) -> Result<Option<RefreshToken>, AppError> {
        let row = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token, expires_at, revoked, created_at FROM refresh_tokens \
             WHERE token = $1 AND revoked IS NULL",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert(&self, row: &RefreshToken) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token, expires_at, revoked, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(row.id)
        .bind(row.user_id)
        .bind(&row.token)
        .bind(row.expires_at)
        .bind(row.revoked)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = $1 WHERE user_id = $2 AND revoked IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
