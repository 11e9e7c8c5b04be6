//! Session lifecycle states and the updates observers receive

use crate::protocol::{ChatMessage, Room};
use std::fmt;

/// Lifecycle of one live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No live channel
    Disconnected,
    /// Live channel opening
    Connecting,
    /// `authenticate` sent, waiting for the result
    Authenticating,
    /// Authenticated, no room joined yet
    Authenticated,
    /// `join-chat` sent, history for the room still loading
    JoiningRoom,
    /// Room active and its history loaded
    InRoom,
}

impl SessionState {
    /// Whether authentication succeeded on the current connection
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            SessionState::Authenticated | SessionState::JoiningRoom | SessionState::InRoom
        )
    }

    /// Whether a room is active
    pub fn in_room(&self) -> bool {
        matches!(self, SessionState::JoiningRoom | SessionState::InRoom)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::JoiningRoom => "joining room",
            SessionState::InRoom => "in room",
        };
        f.write_str(name)
    }
}

/// A request for the most recent messages of a room
///
/// The generation identifies the request; results carrying an older
/// generation than the pending one are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub generation: u64,
    pub room_id: String,
    pub length: u32,
}

/// Notifications delivered to session observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    StateChanged(SessionState),
    RoomsUpdated(Vec<Room>),
    /// A room was joined; its feed is empty until `FeedReplaced` delivers the history
    ActiveRoomChanged(Room),
    /// A live message was prepended to the feed
    MessageAdded(ChatMessage),
    /// History for the active room finished loading; carries the whole feed, newest first
    FeedReplaced(Vec<ChatMessage>),
    /// Credentials are missing or were rejected
    RedirectToLogin,
    ConnectionLost(String),
}
