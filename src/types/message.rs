//! Message snapshots
//!
//! A snapshot is a full, owned copy of a message at one point in time.
//! Content-bearing messages and service messages are distinct variants so
//! that diffing and searching can match on the shape exhaustively.
//!
//! Only the fields the engine works with are typed. Every other host field
//! is kept in `extra`, and attached media is kept as the raw host value, so
//! a stored snapshot round-trips the message it was taken from.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::EntityKey;

/// Full copy of a message as delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_")]
pub enum MessageSnapshot {
    /// Regular message with text, formatting and optional media
    #[serde(rename = "message")]
    Content(ContentMessage),
    /// Service message (joins, pins, title changes, ...)
    #[serde(rename = "messageService")]
    Service(ServiceMessage),
}

impl MessageSnapshot {
    pub fn key(&self) -> EntityKey {
        match self {
            MessageSnapshot::Content(m) => EntityKey::new(m.conversation_id, m.message_id),
            MessageSnapshot::Service(m) => EntityKey::new(m.conversation_id, m.message_id),
        }
    }

    /// Text body, only for content messages
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageSnapshot::Content(m) => Some(&m.text),
            MessageSnapshot::Service(_) => None,
        }
    }

    /// Media payload exactly as delivered by the host
    pub fn media(&self) -> Option<&Value> {
        match self {
            MessageSnapshot::Content(m) => m.media.as_ref(),
            MessageSnapshot::Service(_) => None,
        }
    }

    /// Whether the host marked this message as edited
    pub fn is_edited(&self) -> bool {
        match self {
            MessageSnapshot::Content(m) => m.edit_date.is_some(),
            MessageSnapshot::Service(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMessage {
    #[serde(rename = "peerId")]
    pub conversation_id: i64,
    #[serde(rename = "mid")]
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<i64>,
    pub date: i64,
    #[serde(default, rename = "edit_date", skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<i64>,
    #[serde(default, rename = "message")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<TextEntity>,
    /// Raw media payload; see [`MessageMedia`] for the typed view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Value>,
    /// Host fields without a typed counterpart (`fwd_from`, `reply_to`, `views`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentMessage {
    pub fn new(conversation_id: i64, message_id: i64, date: i64, text: impl Into<String>) -> Self {
        Self {
            conversation_id,
            message_id,
            from_id: None,
            date,
            edit_date: None,
            text: text.into(),
            entities: Vec::new(),
            media: None,
            extra: Map::new(),
        }
    }

    pub fn with_media(mut self, media: MessageMedia) -> Self {
        self.media = serde_json::to_value(media).ok();
        self
    }

    /// Attach a media payload in host form
    pub fn with_raw_media(mut self, media: Value) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_entities(mut self, entities: Vec<TextEntity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn edited_at(mut self, edit_date: i64) -> Self {
        self.edit_date = Some(edit_date);
        self
    }

    /// Set an untyped host field
    pub fn with_extra(mut self, field: impl Into<String>, value: Value) -> Self {
        self.extra.insert(field.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMessage {
    #[serde(rename = "peerId")]
    pub conversation_id: i64,
    #[serde(rename = "mid")]
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<i64>,
    pub date: i64,
    /// Host-defined action payload, kept opaque
    #[serde(default)]
    pub action: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceMessage {
    pub fn new(conversation_id: i64, message_id: i64, date: i64, action: Value) -> Self {
        Self {
            conversation_id,
            message_id,
            from_id: None,
            date,
            action,
            extra: Map::new(),
        }
    }
}

/// Rich-text formatting span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntity {
    #[serde(rename = "_")]
    pub kind: String,
    pub offset: u32,
    pub length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TextEntity {
    pub fn new(kind: impl Into<String>, offset: u32, length: u32) -> Self {
        Self {
            kind: kind.into(),
            offset,
            length,
            url: None,
        }
    }
}

/// Typed view of the media attached to a content message.
///
/// Parsed on demand from the raw payload. Fields the engine does not need
/// are ignored and every sub-field is optional, so host variants such as
/// stripped photo sizes still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_")]
pub enum MessageMedia {
    #[serde(rename = "messageMediaPhoto")]
    Photo {
        #[serde(default)]
        photo: Option<Photo>,
    },
    #[serde(rename = "messageMediaDocument")]
    Document {
        #[serde(default)]
        document: Option<Document>,
    },
    #[serde(rename = "messageMediaWebPage")]
    WebPage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// Any media shape this engine does not track (geo, poll, dice, ...)
    #[serde(other)]
    Other,
}

impl MessageMedia {
    pub fn from_value(raw: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(raw)
    }
}

pub const PHOTO_TAG: &str = "photo";
pub const DOCUMENT_TAG: &str = "document";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    /// Host constructor name; `photoEmpty` carries no file
    #[serde(rename = "_", default)]
    pub kind: String,
    #[serde(deserialize_with = "host_id")]
    pub id: i64,
    #[serde(default)]
    pub sizes: Vec<PhotoSize>,
}

impl Photo {
    pub fn new(id: i64, sizes: Vec<PhotoSize>) -> Self {
        Self {
            kind: PHOTO_TAG.to_string(),
            id,
            sizes,
        }
    }
}

/// One rendition of a photo. Stripped and cached variants have no
/// dimensions and report zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub w: u32,
    #[serde(default)]
    pub h: u32,
    #[serde(default)]
    pub size: u64,
}

impl PhotoSize {
    pub fn new(kind: impl Into<String>, w: u32, h: u32, size: u64) -> Self {
        Self {
            kind: kind.into(),
            w,
            h,
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Host constructor name; `documentEmpty` carries no file
    #[serde(rename = "_", default)]
    pub kind: String,
    #[serde(deserialize_with = "host_id")]
    pub id: i64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, deserialize_with = "host_size")]
    pub size: u64,
    #[serde(default)]
    pub attributes: Vec<DocumentAttribute>,
}

impl Document {
    pub fn new(id: i64, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            kind: DOCUMENT_TAG.to_string(),
            id,
            mime_type: mime_type.into(),
            size,
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<DocumentAttribute>) -> Self {
        self.attributes = attributes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_")]
pub enum DocumentAttribute {
    #[serde(rename = "documentAttributeFilename")]
    Filename {
        #[serde(default)]
        file_name: String,
    },
    #[serde(rename = "documentAttributeVideo")]
    Video {
        #[serde(default)]
        round_message: bool,
        #[serde(default)]
        duration: f64,
    },
    #[serde(rename = "documentAttributeAudio")]
    Audio {
        #[serde(default)]
        voice: bool,
        #[serde(default)]
        duration: f64,
    },
    #[serde(rename = "documentAttributeAnimated")]
    Animated,
    #[serde(rename = "documentAttributeSticker")]
    Sticker,
    #[serde(other)]
    Other,
}

/// 64-bit ids arrive as strings from the host; numbers are accepted too
#[derive(Deserialize)]
#[serde(untagged)]
enum HostNumber {
    Int(i64),
    Text(String),
}

impl HostNumber {
    fn parse<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            HostNumber::Int(n) => Ok(n),
            HostNumber::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid numeric id {:?}", s))),
        }
    }
}

fn host_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    HostNumber::deserialize(deserializer)?.parse()
}

fn host_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let n = HostNumber::deserialize(deserializer)?.parse::<D::Error>()?;
    u64::try_from(n).map_err(|_| serde::de::Error::custom(format!("negative size {}", n)))
}
