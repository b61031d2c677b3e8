//! Password authentication routes.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::UserRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::session::CurrentUser;
use crate::models::user::User;
use crate::routes::ApiOk;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create a customer account and sign it in.
///
/// POST /api/auth/register
///
/// # Errors
///
/// 400 for invalid input, 409 if the email is registered.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = AuthService::new(state.pool())
        .register(&form.email, &form.name, &form.password)
        .await
        .inspect_err(|e| tracing::warn!("Registration failed: {e}"))?;

    let current = start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "Account registered");

    Ok((StatusCode::CREATED, ApiOk(current)))
}

/// Sign in with email and password.
///
/// POST /api/auth/login
///
/// # Errors
///
/// 401 for bad credentials, 403 for blocked accounts.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginRequest>,
) -> Result<ApiOk<CurrentUser>, AppError> {
    let user = AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
        .inspect_err(|e| tracing::warn!("Login failed: {e}"))?;

    let current = start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "Signed in");

    Ok(ApiOk(current))
}

/// Sign out.
///
/// POST /api/auth/logout
///
/// # Errors
///
/// 500 if the session store fails.
pub async fn logout(session: Session) -> Result<ApiOk<()>, AppError> {
    clear_current_user(&session).await?;
    session.flush().await?;
    clear_sentry_user();
    Ok(ApiOk(()))
}

/// The signed-in account, read fresh from the database.
///
/// GET /api/auth/me
///
/// # Errors
///
/// 401 if not signed in or the account no longer exists.
pub async fn me(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
) -> Result<ApiOk<User>, AppError> {
    let Some(user) = UserRepository::new(state.pool()).get_by_id(current.id).await? else {
        session.flush().await?;
        return Err(AppError::Unauthorized("Authentication required".into()));
    };

    let fresh = CurrentUser::from(&user);
    if fresh != current {
        set_current_user(&session, &fresh).await?;
    }
    Ok(ApiOk(user))
}

/// Rotate the session ID and store the user's claims.
async fn start_session(session: &Session, user: &User) -> Result<CurrentUser, AppError> {
    session.cycle_id().await?;
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(current)
}
