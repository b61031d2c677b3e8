//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Make an existing account an admin
//! animart-cli user promote -e owner@animart.dev
//!
//! # Block or unblock an account
//! animart-cli user block -e spammer@example.com
//! animart-cli user unblock -e spammer@example.com
//! ```
//!
//! Changes take effect on the account's next sign-in; open sessions keep
//! their claims until a role check falls back to the database.

use animart_core::{Email, UserRole};
use animart_storefront::db::UserRepository;
use animart_storefront::models::user::User;

use super::{CliError, connect};

/// Give an account the admin role.
///
/// # Errors
///
/// Returns `CliError::UserNotFound` if no account has this email.
pub async fn promote(email: &str) -> Result<(), CliError> {
    let email = parse_email(email)?;
    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = find(&users, &email).await?;
    if user.role == UserRole::Admin {
        tracing::info!("{email} is already an admin");
        return Ok(());
    }

    let user = users.set_role(user.id, UserRole::Admin).await?;
    tracing::info!("Promoted {} (ID {}) to {}", user.email, user.id, user.role);
    Ok(())
}

/// Block or unblock an account.
///
/// # Errors
///
/// Returns `CliError::UserNotFound` if no account has this email.
pub async fn set_blocked(email: &str, blocked: bool) -> Result<(), CliError> {
    let email = parse_email(email)?;
    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = find(&users, &email).await?;
    let user = users.set_blocked(user.id, blocked).await?;
    if user.is_blocked {
        tracing::info!("Blocked {} (ID {})", user.email, user.id);
    } else {
        tracing::info!("Unblocked {} (ID {})", user.email, user.id);
    }
    Ok(())
}

fn parse_email(email: &str) -> Result<Email, CliError> {
    Email::parse(email).map_err(|_| CliError::InvalidEmail(email.to_owned()))
}

async fn find(users: &UserRepository<'_>, email: &Email) -> Result<User, CliError> {
    users
        .get_by_email(email)
        .await?
        .ok_or_else(|| CliError::UserNotFound(email.to_string()))
}
