//! Live channel - the persistent real-time connection to the chat server

mod client;

pub use client::LiveChannelClient;

use crate::protocol::{ChatMessage, ClientEvent};

/// Events delivered by a live channel, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The server accepted the connection; events may be emitted
    ConnectionEstablished,

    /// Server answered an `authenticate` request
    AuthenticationResult(bool),

    /// A message was posted to a room
    MessageReceived(ChatMessage),

    /// The connection failed or the server went silent
    ConnectionError(String),

    /// The server closed the connection
    Closed,
}

impl ChannelEvent {
    /// Whether the event ends the connection
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelEvent::ConnectionError(_) | ChannelEvent::Closed)
    }
}

/// Outbound half of a live channel as seen by the session controller
pub trait LiveChannel: Send {
    /// Send a named event. Events emitted while not connected are dropped.
    fn emit(&self, event: ClientEvent);

    /// Whether the connection is established and not yet lost
    fn is_connected(&self) -> bool;

    /// Tear down the transport and stop event delivery
    fn close(&mut self);
}
