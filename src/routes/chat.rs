// ============================================================================
// Chat HTTP Routes
// ============================================================================
//
// Endpoints (all require a token):
// - GET   /api/v1/chat/conversations                          - conversation list
// - GET   /api/v1/chat/conversations/:conversation_id/messages - merged history
// - GET   /api/v1/chat/messages/:peer_id                      - history with a peer
// - PATCH /api/v1/chat/conversations/:conversation_id/read    - mark as read
// - POST  /api/v1/chat/images                                 - upload an image
//
// ============================================================================

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use pairchat_error::{AppError, AppResult};
use pairchat_types::{ConversationPage, MessagePage, ReadReceipt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::AppContext;
use crate::pagination::normalize_page;
use crate::routes::extractors::AuthenticatedUser;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<u32>,
}

impl PageQuery {
    fn resolve(&self, default_limit: u32) -> (u32, u32) {
        (
            normalize_page(self.page),
            self.limit.unwrap_or(default_limit),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

/// GET /api/v1/chat/conversations
pub async fn list_conversations(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ConversationPage>> {
    let (page, limit) = query.resolve(ctx.config.cache.default_page_limit);
    let result = ctx.history.conversation_list(user_id, page, limit).await?;
    Ok(Json(result))
}

/// GET /api/v1/chat/conversations/:conversation_id/messages
pub async fn conversation_messages(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<MessagePage>> {
    let (page, limit) = query.resolve(ctx.config.cache.default_page_limit);
    let result = ctx
        .history
        .merged_messages(conversation_id, user_id, page, limit)
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/chat/messages/:peer_id
pub async fn direct_messages(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(peer_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<MessagePage>> {
    let (page, limit) = query.resolve(ctx.config.cache.default_page_limit);
    let result = ctx
        .history
        .direct_messages(user_id, peer_id, page, limit)
        .await?;
    Ok(Json(result))
}

/// PATCH /api/v1/chat/conversations/:conversation_id/read
pub async fn mark_as_read(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<ReadReceipt>> {
    let receipt = ctx.history.mark_as_read(conversation_id, user_id).await?;
    Ok(Json(receipt))
}

/// POST /api/v1/chat/images
/// Multipart upload; the file is taken from the `image` (or `file`) field
pub async fn upload_image(
    State(ctx): State<Arc<AppContext>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::upload(e.body_text()))?
    {
        if !matches!(field.name(), Some("image") | Some("file")) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::upload(e.body_text()))?;

        let url = ctx
            .media
            .store_image(file_name.as_deref(), content_type.as_deref(), &bytes)
            .await?;
        tracing::debug!(user_id = %user_id, "Image uploaded");
        return Ok(Json(UploadResponse { url }));
    }

    Err(AppError::upload("missing image field"))
}
