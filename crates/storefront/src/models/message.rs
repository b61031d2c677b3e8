//! Contact form messages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use animart_core::ContactMessageId;

/// A message submitted through the contact form.
#[derive(Debug, Clone, Serialize)]
pub struct ContactMessage {
    pub id: ContactMessageId,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
