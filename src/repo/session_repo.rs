use sqlx::PgPool;

use crate::models::{Session, User};
use crate::utils::error::AppError;

/// Read/delete access to login sessions. Session rows are created by the
/// external OAuth callback, never here.
pub struct SessionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn resolve(&self, token: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.username, u.email, u.created_at \
             FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Removes the session and reports which one was terminated.
    pub async fn delete(&self, token: &str) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            "DELETE FROM sessions WHERE token = $1 RETURNING token, user_id, created_at",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(session)
    }
}
