// ============================================================================
// Socket event dispatch
// ============================================================================
//
// One inbound text frame -> one client event -> at most one direct reply.
// Every failure is answered with a `Failure` frame; the socket stays open.
//
// ============================================================================

use pairchat_config::MAX_MESSAGE_SIZE;
use pairchat_error::AppResult;
use pairchat_types::{ClientMessage, ConversationListRequest, ServerMessage};

use super::connection::ConnectionHandler;
use crate::context::AppContext;
use crate::pagination::normalize_page;

pub async fn dispatch(handler: &mut ConnectionHandler, ctx: &AppContext, raw: &str) {
    let event = match serde_json::from_str::<ClientMessage>(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(addr = %handler.addr(), error = %e, "Failed to parse client event");
            handler
                .send_failure(&format!("Invalid message format: {}", e))
                .await;
            return;
        }
    };

    if let Err(reason) = event.validate(MAX_MESSAGE_SIZE) {
        handler.send_failure(&reason).await;
        return;
    }

    let kind = event.kind();
    if let Err(e) = handle_event(handler, ctx, event).await {
        e.log();
        tracing::debug!(event = kind, "Client event rejected");
        handler.send_failure(&e.user_message()).await;
    }
}

async fn handle_event(
    handler: &mut ConnectionHandler,
    ctx: &AppContext,
    event: ClientMessage,
) -> AppResult<()> {
    match event {
        ClientMessage::JoinApp => {
            let reply = ctx.router.join_app(handler.session()).await;
            send(handler, &reply).await;
        }
        ClientMessage::JoinPrivateChat(request) => {
            let conversation_id = ctx
                .router
                .join_private_chat(handler.session(), request)
                .await?;
            send(handler, &ServerMessage::JoinPrivateChat { conversation_id }).await;
        }
        ClientMessage::SendPrivateMessage(request) => {
            // Bookkeeping keeps running after the reply path returns
            let _sent = ctx
                .router
                .send_private_message(handler.user_id(), request)
                .await?;
        }
        ClientMessage::ConversationList(ConversationListRequest { page, limit }) => {
            let page = normalize_page(page.map(i64::from));
            let limit = limit.unwrap_or(ctx.config.cache.default_page_limit);
            let result = ctx
                .history
                .conversation_list(handler.user_id(), page, limit)
                .await?;
            send(handler, &ServerMessage::ConversationList { result }).await;
        }
    }
    Ok(())
}

async fn send(handler: &mut ConnectionHandler, reply: &ServerMessage) {
    if let Err(e) = handler.send_json(reply).await {
        tracing::debug!(addr = %handler.addr(), error = %e, "Reply not delivered");
    }
}
