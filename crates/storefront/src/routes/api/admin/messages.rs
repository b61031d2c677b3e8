//! Contact form inbox.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use animart_core::ContactMessageId;

use crate::db::{MessageRepository, Page};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::message::ContactMessage;
use crate::routes::{ApiOk, not_found};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MessageListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReadUpdate {
    pub is_read: bool,
}

/// GET /api/admin/messages?unread=true
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<MessageListQuery>,
) -> Result<ApiOk<Vec<ContactMessage>>, AppError> {
    let messages = MessageRepository::new(state.pool())
        .list(query.unread, Page::new(query.page, query.per_page))
        .await?;
    Ok(ApiOk(messages))
}

/// Mark a message read or unread.
///
/// PUT /api/admin/messages/{id}
///
/// # Errors
///
/// 404 if the message doesn't exist.
pub async fn mark(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ContactMessageId>,
    Json(update): Json<ReadUpdate>,
) -> Result<StatusCode, AppError> {
    MessageRepository::new(state.pool())
        .set_read(id, update.is_read)
        .await
        .map_err(not_found("Message not found"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/admin/messages/{id}
///
/// # Errors
///
/// 404 if the message doesn't exist.
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ContactMessageId>,
) -> Result<StatusCode, AppError> {
    MessageRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found("Message not found"))?;
    tracing::info!(admin_id = %admin.id, message_id = %id, "Contact message deleted");
    Ok(StatusCode::NO_CONTENT)
}
