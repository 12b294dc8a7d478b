use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted refresh-token record.
///
/// The token string is the issued JWT itself, reused as the refresh artifact.
/// Rows are append-only: revocation sets `revoked`, nothing is ever deleted,
/// leaving an audit trail of every token issued for a user. At most one row
/// per user is active at a time; rotation revokes all prior active rows.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// A token counts as active while its revocation timestamp is unset.
    /// Expiry of the embedded JWT is enforced separately by signature-level
    /// lifetime validation, so it is not re-checked here.
    pub fn is_active(&self) -> bool {
        self.revoked.is_none()
    }
}
