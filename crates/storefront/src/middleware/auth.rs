//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a signed-in user or an admin in route
//! handlers. Rejections are JSON `AppError` responses (401 or 403).

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::session::{CurrentUser, keys};
use crate::services::authorization::{self, Authorized};
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

/// Extractor that optionally gets the current user.
///
/// Never rejects; handlers use it to personalize public responses.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await))
    }
}

/// Extractor that requires an unblocked admin.
///
/// Trusts the session claims when they grant access and re-reads the user
/// from the database when they don't. A successful re-read is written back
/// to the session.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = current_user(parts).await;
        let users = UserRepository::new(state.pool());

        let authorized = authorization::require_admin(&users, claims.as_ref()).await?;
        if let Authorized::Refreshed(user) = &authorized
            && let Some(session) = parts.extensions.get::<Session>()
        {
            tracing::debug!(user_id = %user.id, "refreshing session claims");
            set_current_user(session, user).await?;
        }

        Ok(Self(authorized.into_user()))
    }
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<CurrentUser>(keys::CURRENT_USER).await?;
    Ok(())
}
