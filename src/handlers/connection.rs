use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use pairchat_types::ServerMessage;
use std::net::SocketAddr;

use crate::registry::SessionHandle;

/// Write half of one websocket plus the session it was registered under
pub struct ConnectionHandler {
    ws_sender: SplitSink<WebSocket, WsMessage>,
    session: SessionHandle,
    addr: SocketAddr,
}

impl ConnectionHandler {
    pub fn new(
        ws_sender: SplitSink<WebSocket, WsMessage>,
        session: SessionHandle,
        addr: SocketAddr,
    ) -> Self {
        Self {
            ws_sender,
            session,
            addr,
        }
    }

    /// Serialize and write one frame
    pub async fn send_json(&mut self, msg: &ServerMessage) -> Result<(), String> {
        let text = serde_json::to_string(msg)
            .map_err(|e| format!("Failed to serialize message: {}", e))?;

        self.ws_sender
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| format!("Failed to send message: {}", e))?;

        Ok(())
    }

    pub async fn send_failure(&mut self, message: &str) {
        if self.send_json(&ServerMessage::failure(message)).await.is_err() {
            tracing::debug!("Failed to send failure to disconnected client {}", self.addr);
        }
    }

    pub async fn ping(&mut self) -> Result<(), axum::Error> {
        self.ws_sender.send(WsMessage::Ping(Vec::new())).await
    }

    pub async fn pong(&mut self, payload: Vec<u8>) -> Result<(), axum::Error> {
        self.ws_sender.send(WsMessage::Pong(payload)).await
    }

    pub async fn close(&mut self) {
        let _ = self.ws_sender.send(WsMessage::Close(None)).await;
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn user_id(&self) -> uuid::Uuid {
        self.session.user_id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}
