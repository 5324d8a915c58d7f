use serde::{Deserialize, Serialize};

pub const TYPE_CREATE_ROOM: &str = "CREATE-ROOM";
pub const TYPE_JOIN_ROOM: &str = "JOIN-ROOM";
pub const TYPE_GROUP_CHAT: &str = "GROUP-CHAT";
/// Emitted by the server, e.g. for a join against a missing room.
pub const TYPE_ERROR: &str = "ERROR";

/// Structured envelope exchanged over the wire.
///
/// Everything is optional except that `messageType` drives dispatch: the
/// recognized control values above, a non-empty `receiverId` for direct
/// addressing, `groupId` for room fan-out, anything else is a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_name: Option<String>,

    #[serde(rename = "groupId", skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChatMessage {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
