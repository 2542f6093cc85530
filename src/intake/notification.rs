//! Host notifications consumed by the intake
//!
//! The host emits loosely typed events (`message_sent`, `message_edit`,
//! `messages_deleted`) with JSON payloads. They are parsed into
//! [`HostNotification`] before touching the store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::IntakeError;
use crate::types::MessageSnapshot;

/// Untyped notification as emitted on the host event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNotification {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RawNotification {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Lifecycle notification with its required fields validated
#[derive(Debug, Clone, PartialEq)]
pub enum HostNotification {
    MessageSent {
        message: MessageSnapshot,
    },
    MessageEdited {
        message: MessageSnapshot,
    },
    MessagesDeleted {
        conversation_id: i64,
        message_ids: Vec<i64>,
        revoked: bool,
    },
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    message: MessageSnapshot,
}

#[derive(Debug, Deserialize)]
struct DeletedPayload {
    #[serde(rename = "peerId")]
    conversation_id: i64,
    #[serde(alias = "ids")]
    mids: Vec<i64>,
    #[serde(default, rename = "isRevoked", alias = "revoked")]
    is_revoked: Option<bool>,
}

impl HostNotification {
    /// Parse a raw notification.
    ///
    /// Returns `Ok(None)` for events this engine does not consume.
    pub fn parse(raw: &RawNotification) -> Result<Option<Self>, IntakeError> {
        let notification = match raw.event.as_str() {
            "message_sent" | "message-sent" => {
                let payload: MessagePayload = decode(raw)?;
                HostNotification::MessageSent {
                    message: payload.message,
                }
            }
            "message_edit" | "message-edited" => {
                let payload: MessagePayload = decode(raw)?;
                HostNotification::MessageEdited {
                    message: payload.message,
                }
            }
            "messages_deleted" | "messages-deleted" => {
                let payload: DeletedPayload = decode(raw)?;
                HostNotification::MessagesDeleted {
                    conversation_id: payload.conversation_id,
                    message_ids: payload.mids,
                    revoked: payload.is_revoked.unwrap_or(false),
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(notification))
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            HostNotification::MessageSent { .. } => "message_sent",
            HostNotification::MessageEdited { .. } => "message_edit",
            HostNotification::MessagesDeleted { .. } => "messages_deleted",
        }
    }
}

fn decode<T: DeserializeOwned>(raw: &RawNotification) -> Result<T, IntakeError> {
    T::deserialize(&raw.payload).map_err(|e| IntakeError::MalformedNotification {
        event: raw.event.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sent() {
        let raw = RawNotification::new(
            "message_sent",
            json!({"message": {"_": "message", "peerId": 1, "mid": 2, "date": 0, "message": "hi"}}),
        );

        match HostNotification::parse(&raw).unwrap() {
            Some(HostNotification::MessageSent { message }) => assert_eq!(message.text(), Some("hi")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_deleted_aliases() {
        let raw = RawNotification::new("messages-deleted", json!({"peerId": 7, "ids": [1, 2], "revoked": true}));

        assert_eq!(
            HostNotification::parse(&raw).unwrap(),
            Some(HostNotification::MessagesDeleted {
                conversation_id: 7,
                message_ids: vec![1, 2],
                revoked: true,
            })
        );

        let raw = RawNotification::new("messages_deleted", json!({"peerId": 7, "mids": [3]}));
        match HostNotification::parse(&raw).unwrap() {
            Some(HostNotification::MessagesDeleted { revoked, .. }) => assert!(!revoked),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let raw = RawNotification::new("message_edit", json!({"storageKey": "x"}));
        let err = HostNotification::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("message_edit"));

        let raw = RawNotification::new("messages_deleted", json!({"mids": [1]}));
        assert!(HostNotification::parse(&raw).is_err());
    }

    #[test]
    fn test_unknown_event_ignored() {
        let raw = RawNotification::new("dialog_pinned", json!({}));
        assert_eq!(HostNotification::parse(&raw).unwrap(), None);
    }
}
