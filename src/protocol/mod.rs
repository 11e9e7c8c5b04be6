//! Protocol definitions for the live channel
//!
//! The live channel speaks socket.io (Engine.IO v4) over a WebSocket. Each text frame is
//! an Engine.IO packet (see [`packet`]); events travel as socket.io event
//! packets whose payload is a JSON array `["<event-name>", <payload>]`.

mod message;
pub mod packet;

pub use message::{
    resolve_picture_url, ChatMessage, ClientEvent, MessageOrigin, PictureSize, Profile, Room,
    RoomKind, Sender, ServerEvent, DEFAULT_PICTURE_URL,
};
pub use packet::{decode_packet, socket_url, Handshake, Packet};

use anyhow::{bail, Result};
use serde_json::{json, Value};
use thiserror::Error;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Malformed payload for '{event}': {reason}")]
    MalformedPayload { event: String, reason: String },

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Invalid live channel URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Maximum accepted inbound frame size (1 MB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Encode an outbound event into a socket.io event frame
pub fn encode_event(event: &ClientEvent) -> Result<String> {
    let payload = match event {
        ClientEvent::Authenticate { jwt } => json!({ "jwt": jwt }),
        ClientEvent::JoinChat { chat_id, kind, jwt } => {
            json!({ "chatId": chat_id, "type": kind, "jwt": jwt })
        }
        ClientEvent::SendMessage { body } => Value::String(body.clone()),
    };
    Ok(format!(
        "{}{}",
        packet::EVENT_PREFIX,
        serde_json::to_string(&json!([event.name(), payload]))?
    ))
}

/// Decode the JSON array carried by an event packet
///
/// Returns `Ok(None)` for well-formed arrays naming an event this client
/// does not consume.
pub fn decode_event(frame: &str) -> Result<Option<ServerEvent>> {
    if frame.len() > MAX_FRAME_SIZE {
        bail!(ProtocolError::FrameTooLarge {
            size: frame.len(),
            max: MAX_FRAME_SIZE
        });
    }

    let parts: Vec<Value> = serde_json::from_str(frame)
        .map_err(|e| ProtocolError::InvalidFrame(format!("not a JSON array: {}", e)))?;

    let mut parts = parts.into_iter();
    let name = match parts.next() {
        Some(Value::String(name)) => name,
        Some(_) => bail!(ProtocolError::InvalidFrame("event name is not a string".into())),
        None => bail!(ProtocolError::InvalidFrame("empty frame".into())),
    };
    let payload = parts.next().unwrap_or(Value::Null);

    let malformed = |reason: String| ProtocolError::MalformedPayload {
        event: name.clone(),
        reason,
    };

    let event = match name.as_str() {
        "authenticated" => match payload {
            Value::Bool(ok) => ServerEvent::Authenticated(ok),
            other => bail!(malformed(format!("expected bool, got {}", other))),
        },
        "emit-message" => {
            let msg: ChatMessage =
                serde_json::from_value(payload).map_err(|e| malformed(e.to_string()))?;
            ServerEvent::EmitMessage(msg.with_origin(MessageOrigin::Live))
        }
        other => {
            tracing::debug!("Ignoring unknown event '{}'", other);
            return Ok(None);
        }
    };

    Ok(Some(event))
}
