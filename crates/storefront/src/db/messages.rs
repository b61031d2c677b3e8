//! Contact message repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use animart_core::ContactMessageId;

use super::{Page, RepositoryError};
use crate::models::message::ContactMessage;

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: ContactMessageId,
    name: String,
    email: String,
    subject: Option<String>,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for ContactMessage {
    fn from(r: MessageRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            subject: r.subject,
            message: r.message,
            is_read: r.is_read,
            created_at: r.created_at,
        }
    }
}

/// Repository for contact form messages.
pub struct MessageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new message repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a submitted message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        subject: Option<&str>,
        message: &str,
    ) -> Result<ContactMessage, RepositoryError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r"
            INSERT INTO shop.contact_message (name, email, subject, message)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, subject, message, is_read, created_at
            ",
        )
        .bind(name)
        .bind(email)
        .bind(subject)
        .bind(message)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Messages newest first, optionally only unread ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        unread_only: bool,
        page: Page,
    ) -> Result<Vec<ContactMessage>, RepositoryError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r"
            SELECT id, name, email, subject, message, is_read, created_at
            FROM shop.contact_message
            WHERE NOT ($1 AND is_read)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(unread_only)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(ContactMessage::from).collect())
    }

    /// Number of unread messages.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_unread(&self) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.contact_message WHERE NOT is_read")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Mark a message read or unread.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the message doesn't exist.
    pub async fn set_read(&self, id: ContactMessageId, read: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE shop.contact_message SET is_read = $2 WHERE id = $1")
            .bind(id)
            .bind(read)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the message doesn't exist.
    pub async fn delete(&self, id: ContactMessageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.contact_message WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
