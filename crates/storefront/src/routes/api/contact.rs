//! Contact form.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use animart_core::Email;

use crate::db::MessageRepository;
use crate::error::AppError;
use crate::routes::ApiOk;
use crate::state::AppState;

const MAX_NAME_LEN: usize = 100;
const MAX_SUBJECT_LEN: usize = 200;
const MIN_MESSAGE_LEN: usize = 10;
const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

/// A contact submission after validation.
#[derive(Debug, PartialEq, Eq)]
pub struct ValidContact {
    pub name: String,
    pub email: Email,
    pub subject: Option<String>,
    pub message: String,
}

impl ContactRequest {
    /// Trim fields and enforce length limits.
    ///
    /// # Errors
    ///
    /// Returns the message to show for the first invalid field.
    pub fn validate(self) -> Result<ValidContact, &'static str> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err("Please enter your name (up to 100 characters)");
        }
        let email = Email::parse(&self.email).map_err(|_| "Please enter a valid email address")?;
        let subject = self
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        if subject
            .as_deref()
            .is_some_and(|s| s.chars().count() > MAX_SUBJECT_LEN)
        {
            return Err("Subject must be at most 200 characters");
        }
        let message = self.message.trim();
        let len = message.chars().count();
        if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&len) {
            return Err("Message must be between 10 and 5000 characters");
        }

        Ok(ValidContact {
            name: name.to_owned(),
            email,
            subject,
            message: message.to_owned(),
        })
    }
}

/// Store a contact form submission.
///
/// POST /api/contact
///
/// # Errors
///
/// 400 for invalid fields.
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<impl IntoResponse, AppError> {
    let contact = req.validate().map_err(|m| AppError::BadRequest(m.into()))?;

    let message = MessageRepository::new(state.pool())
        .create(
            &contact.name,
            contact.email.as_str(),
            contact.subject.as_deref(),
            &contact.message,
        )
        .await?;
    tracing::info!(message_id = %message.id, "Contact message received");

    Ok((StatusCode::CREATED, ApiOk(serde_json::json!({ "id": message.id }))))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.into(),
            email: email.into(),
            subject: Some("   ".into()),
            message: message.into(),
        }
    }

    #[test]
    fn test_valid_contact_is_trimmed() {
        let c = request("  Rei ", "rei@nerv.jp", "  Where is my order #AM-1042?  ")
            .validate()
            .unwrap();
        assert_eq!(c.name, "Rei");
        assert_eq!(c.subject, None);
        assert_eq!(c.message, "Where is my order #AM-1042?");
    }

    #[test]
    fn test_rejects_blank_name_and_bad_email() {
        assert!(request(" ", "rei@nerv.jp", "long enough message").validate().is_err());
        assert!(request("Rei", "nope", "long enough message").validate().is_err());
    }

    #[test]
    fn test_message_length_bounds() {
        assert!(request("Rei", "rei@nerv.jp", "too short").validate().is_err());
        assert!(
            request("Rei", "rei@nerv.jp", &"x".repeat(MAX_MESSAGE_LEN + 1))
                .validate()
                .is_err()
        );
        assert!(request("Rei", "rei@nerv.jp", &"x".repeat(MAX_MESSAGE_LEN)).validate().is_ok());
    }
}
