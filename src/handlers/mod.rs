mod connection;
mod events;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use connection::ConnectionHandler;
use futures_util::StreamExt;
use pairchat_config::MAX_FRAME_SIZE;
use pairchat_metrics::CONNECTIONS_TOTAL;
use pairchat_types::ServerMessage;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::authenticate;
use crate::context::AppContext;
use crate::registry::SessionHandle;
use crate::utils::log_user;

#[derive(Debug, Default, Deserialize)]
pub struct UpgradeQuery {
    pub token: Option<String>,
}

/// GET /ws
/// Authenticate the upgrade request, then hand the socket to the session loop
pub async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<AppContext>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<UpgradeQuery>,
) -> Response {
    let user_id = match authenticate(ctx.validator.as_ref(), &headers, query.token.as_deref()).await
    {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::warn!(addr = %addr, error = %e, "Rejected websocket upgrade");
            return e.into_response();
        }
    };

    ws.max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| handle_websocket(socket, addr, user_id, ctx))
}

pub async fn handle_websocket(
    socket: WebSocket,
    addr: SocketAddr,
    user_id: Uuid,
    ctx: Arc<AppContext>,
) {
    CONNECTIONS_TOTAL.inc();
    let span = tracing::info_span!(
        "websocket_connection",
        addr = %addr,
        user = %log_user(user_id, &ctx.config.logging)
    );
    run_session(socket, addr, user_id, ctx).instrument(span).await;
}

async fn run_session(socket: WebSocket, addr: SocketAddr, user_id: Uuid, ctx: Arc<AppContext>) {
    tracing::info!("New connection from: {}", addr);

    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let session = SessionHandle::new(user_id, tx);
    let mut handler = ConnectionHandler::new(ws_sender, session.clone(), addr);

    ctx.router.connect(&session).await;
    if handler
        .send_json(&ServerMessage::AuthSuccess { user_id })
        .await
        .is_err()
    {
        ctx.router.disconnect(&session).await;
        return;
    }

    let heartbeat_timeout = Duration::from_secs(ctx.config.heartbeat_timeout_secs);
    let mut heartbeat = interval(Duration::from_secs(ctx.config.heartbeat_interval_secs));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        last_seen = Instant::now();
                        tracing::debug!("Received {} bytes from {}", text.len(), addr);
                        events::dispatch(&mut handler, &ctx, &text).await;
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        last_seen = Instant::now();
                        handler.send_failure("Binary frames are not supported").await;
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        last_seen = Instant::now();
                        let _ = handler.pong(data).await;
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tracing::info!("Connection closed by client: {}", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                }
            }

            Some(server_msg) = rx.recv() => {
                if handler.send_json(&server_msg).await.is_err() {
                    break;
                }
            }

            _ = heartbeat.tick() => {
                if last_seen.elapsed() > heartbeat_timeout {
                    tracing::info!("Closing unresponsive connection: {}", addr);
                    handler.close().await;
                    break;
                }
                if handler.ping().await.is_err() {
                    break;
                }
            }
        }
    }

    ctx.router.disconnect(&session).await;
    tracing::info!("Connection closed: {}", addr);
}
