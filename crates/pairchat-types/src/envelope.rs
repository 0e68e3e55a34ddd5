// ============================================================================
// Socket envelopes
// ============================================================================
//
// Every frame is a JSON object with a `type` discriminator. Unknown types and
// frames missing required fields fail to deserialize and never reach a
// handler.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, Profile};
use crate::page::ConversationPage;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinApp,
    JoinPrivateChat(JoinPrivateChat),
    SendPrivateMessage(SendPrivateMessage),
    ConversationList(ConversationListRequest),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPrivateChat {
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub user2_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPrivateMessage {
    pub conversation_id: Uuid,
    pub receiver_id: Uuid,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "mediaUrl")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListRequest {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinApp => "joinApp",
            ClientMessage::JoinPrivateChat(_) => "joinPrivateChat",
            ClientMessage::SendPrivateMessage(_) => "sendPrivateMessage",
            ClientMessage::ConversationList(_) => "conversationList",
        }
    }

    /// Field-level checks that serde cannot express
    pub fn validate(&self, max_content_bytes: usize) -> Result<(), String> {
        match self {
            ClientMessage::JoinApp => Ok(()),
            ClientMessage::JoinPrivateChat(join) => {
                if join.conversation_id.is_none() && join.user2_id.is_none() {
                    return Err("conversationId or user2Id is required".to_string());
                }
                Ok(())
            }
            ClientMessage::SendPrivateMessage(send) => {
                let has_image = send
                    .image_url
                    .as_deref()
                    .is_some_and(|url| !url.trim().is_empty());
                if send.content.trim().is_empty() && !has_image {
                    return Err("message needs content or an image".to_string());
                }
                if send.content.len() > max_content_bytes {
                    return Err(format!("content exceeds {} bytes", max_content_bytes));
                }
                Ok(())
            }
            ClientMessage::ConversationList(request) => {
                if request.limit == Some(0) {
                    return Err("limit must be greater than 0".to_string());
                }
                Ok(())
            }
        }
    }
}

/// A message as delivered to one socket: the record plus the counterpart
/// relative to that socket's user.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeliveredMessage {
    #[serde(flatten)]
    pub message: Message,
    pub receiver: Profile,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    AuthSuccess { user_id: Uuid },
    JoinApp { message: String },
    #[serde(rename_all = "camelCase")]
    JoinPrivateChat { conversation_id: Uuid },
    ReceivePrivateMessage(DeliveredMessage),
    ConversationList { result: ConversationPage },
    #[serde(rename = "Failure")]
    Failure { message: String },
}

impl ServerMessage {
    pub fn failure(message: impl Into<String>) -> Self {
        ServerMessage::Failure {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageMeta;

    #[test]
    fn test_parse_send_private_message() {
        let conversation_id = Uuid::new_v4();
        let receiver_id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"sendPrivateMessage","conversationId":"{}","receiverId":"{}","content":"hi"}}"#,
            conversation_id, receiver_id
        );
        let parsed: ClientMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::SendPrivateMessage(SendPrivateMessage {
                conversation_id,
                receiver_id,
                content: "hi".to_string(),
                image_url: None,
            })
        );
        assert!(parsed.validate(1024).is_ok());
    }

    #[test]
    fn test_parse_unit_and_optional_variants() {
        let parsed: ClientMessage = serde_json::from_str(r#"{"type":"joinApp"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::JoinApp);

        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type":"conversationList"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMessage::ConversationList(ConversationListRequest::default())
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"deleteEverything"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"content":"no type"}"#).is_err());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let raw = r#"{"type":"sendPrivateMessage","content":"hi"}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
    }

    #[test]
    fn test_validate_empty_message() {
        let send = ClientMessage::SendPrivateMessage(SendPrivateMessage {
            conversation_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            content: "   ".to_string(),
            image_url: Some(String::new()),
        });
        assert!(send.validate(1024).is_err());

        let join = ClientMessage::JoinPrivateChat(JoinPrivateChat {
            conversation_id: None,
            user2_id: None,
        });
        assert!(join.validate(1024).is_err());
    }

    #[test]
    fn test_validate_oversized_content() {
        let send = ClientMessage::SendPrivateMessage(SendPrivateMessage {
            conversation_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            content: "x".repeat(33),
            image_url: None,
        });
        assert!(send.validate(32).is_err());
    }

    #[test]
    fn test_server_message_wire_names() {
        let failure = serde_json::to_value(ServerMessage::failure("boom")).unwrap();
        assert_eq!(failure["type"], "Failure");
        assert_eq!(failure["message"], "boom");

        let list = serde_json::to_value(ServerMessage::ConversationList {
            result: ConversationPage {
                data: vec![],
                meta: PageMeta::new(1, 10, 0),
            },
        })
        .unwrap();
        assert_eq!(list["type"], "conversationList");
        assert_eq!(list["result"]["meta"]["limit"], 10);
    }

    #[test]
    fn test_delivered_message_is_flattened() {
        let message = Message::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "hi".to_string(),
            None,
        );
        let frame = ServerMessage::ReceivePrivateMessage(DeliveredMessage {
            message: message.clone(),
            receiver: Profile::unknown(message.sender_id),
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "receivePrivateMessage");
        assert_eq!(json["conversationId"], message.conversation_id.to_string());
        assert_eq!(json["receiver"]["id"], message.sender_id.to_string());
    }
}
