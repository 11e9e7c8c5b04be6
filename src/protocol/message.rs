//! Message types for the chat protocol

use serde::{Deserialize, Serialize};

/// Picture shown when a user never uploaded one
pub const DEFAULT_PICTURE_URL: &str = "https://storage.googleapis.com/chatapp-profile/pfp/default";

/// Pictures hosted here come in pre-rendered sizes
const PICTURE_CDN_PREFIX: &str = "https://storage.googleapis.com/";

/// Events sent from client to the live channel server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Authenticate the connection with a session token
    Authenticate { jwt: String },

    /// Join a room; replaces the previous room membership server-side.
    /// Carries the session token so the server can check membership.
    JoinChat {
        chat_id: String,
        kind: RoomKind,
        jwt: String,
    },

    /// Send a message to the joined room
    SendMessage { body: String },
}

impl ClientEvent {
    /// Event name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Authenticate { .. } => "authenticate",
            ClientEvent::JoinChat { .. } => "join-chat",
            ClientEvent::SendMessage { .. } => "send-message",
        }
    }
}

/// Events sent from the live channel server to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Result of an `authenticate` request
    Authenticated(bool),

    /// A message was posted to a room
    EmitMessage(ChatMessage),
}

/// Room membership kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    #[default]
    Public,
    Private,
}

/// A conversation room as listed by `chat.publicChats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: RoomKind,
}

impl Room {
    pub fn public(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: RoomKind::Public,
        }
    }
}

/// Author of a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub uid: String,
    pub username: String,
    #[serde(default)]
    pub pfp_url: String,
}

/// Where a message entered the feed from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Loaded by a `chat.chatHistory` call
    #[default]
    History,
    /// Delivered over the live channel
    Live,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned identifier, when the server provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Room the message belongs to, when the server provides it
    #[serde(default, rename = "chatId", skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,

    pub content: String,

    pub sender: Sender,

    #[serde(skip)]
    pub origin: MessageOrigin,
}

impl ChatMessage {
    pub fn with_origin(mut self, origin: MessageOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Whether the message can be shown in `room_id`.
    ///
    /// Messages that do not name a room are accepted anywhere.
    pub fn belongs_to(&self, room_id: &str) -> bool {
        self.chat_id.as_deref().map_or(true, |id| id == room_id)
    }
}

/// Public profile data of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub uid: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, alias = "pfpUrl")]
    pub pfp_url: String,
    #[serde(default)]
    pub about: String,
}

/// Rendition of a hosted picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureSize {
    Small,
    Large,
}

impl PictureSize {
    fn suffix(self) -> &'static str {
        match self {
            PictureSize::Small => "-small.png",
            PictureSize::Large => "-large.png",
        }
    }
}

/// Resolve a stored picture reference into a displayable URL
pub fn resolve_picture_url(reference: &str, size: PictureSize) -> String {
    let url = if reference.is_empty() {
        DEFAULT_PICTURE_URL
    } else {
        reference
    };

    if url.starts_with(PICTURE_CDN_PREFIX) {
        format!("{}{}", url, size.suffix())
    } else {
        url.to_string()
    }
}
