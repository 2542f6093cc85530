//! Entity key: the partition key of the change log

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::KeyParseError;

/// Identifies one message across its whole lifetime.
///
/// The string form is `"<conversationId>_<messageId>"`. Conversation ids
/// may be negative (groups and channels), so parsing splits on the last `_`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub conversation_id: i64,
    pub message_id: i64,
}

impl EntityKey {
    pub fn new(conversation_id: i64, message_id: i64) -> Self {
        Self {
            conversation_id,
            message_id,
        }
    }

    /// Whether this key belongs to the given conversation
    pub fn in_conversation(&self, conversation_id: i64) -> bool {
        self.conversation_id == conversation_id
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.conversation_id, self.message_id)
    }
}

impl FromStr for EntityKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (conversation, message) = s
            .rsplit_once('_')
            .ok_or_else(|| KeyParseError::MissingSeparator(s.to_string()))?;

        let conversation_id = conversation
            .parse::<i64>()
            .map_err(|_| KeyParseError::InvalidId(s.to_string()))?;
        let message_id = message
            .parse::<i64>()
            .map_err(|_| KeyParseError::InvalidId(s.to_string()))?;

        Ok(Self::new(conversation_id, message_id))
    }
}

impl Serialize for EntityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct EntityKeyVisitor;

impl<'de> Visitor<'de> for EntityKeyVisitor {
    type Value = EntityKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string of the form \"<conversationId>_<messageId>\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for EntityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(EntityKeyVisitor)
    }
}
