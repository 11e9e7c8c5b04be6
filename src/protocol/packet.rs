//! Engine.IO v4 / socket.io v5 framing
//!
//! Every WebSocket text frame starts with an Engine.IO packet type digit:
//! `0` open, `1` close, `2` ping, `3` pong, `4` message, `5` upgrade, `6` noop.
//! A `4` message carries a socket.io packet, again led by a type digit:
//! `0` connect, `1` disconnect, `2` event, `3` ack, `4` connect error.
//! Only the default namespace is used.

use super::{decode_event, ProtocolError, ServerEvent, MAX_FRAME_SIZE};
use anyhow::{bail, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Joins the default namespace; sent after the open packet
pub const CONNECT_FRAME: &str = "40";

/// Leaves the default namespace
pub const DISCONNECT_FRAME: &str = "41";

/// Answer to a server ping
pub const PONG_FRAME: &str = "3";

/// Prefix of an event packet in the default namespace
pub const EVENT_PREFIX: &str = "42";

/// Parameters from the Engine.IO open packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

impl Handshake {
    /// How long the connection may stay silent before the server counts as gone
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Transport opened
    Open(Handshake),
    /// Transport closed by the server
    Close,
    Ping,
    Pong,
    /// Namespace joined; events may flow
    Connected,
    /// Namespace left by the server
    Disconnected,
    /// Namespace join refused
    ConnectRefused(String),
    Event(ServerEvent),
    /// Well-formed but of no interest: noops, acks, other namespaces, unknown events
    Ignored,
}

/// Decode one inbound text frame
pub fn decode_packet(frame: &str) -> Result<Packet> {
    if frame.len() > MAX_FRAME_SIZE {
        bail!(ProtocolError::FrameTooLarge {
            size: frame.len(),
            max: MAX_FRAME_SIZE
        });
    }

    let (kind, rest) = split_type(frame)?;
    let packet = match kind {
        '0' => {
            let handshake: Handshake = serde_json::from_str(rest)
                .map_err(|e| ProtocolError::InvalidFrame(format!("bad open packet: {}", e)))?;
            Packet::Open(handshake)
        }
        '1' => Packet::Close,
        '2' => Packet::Ping,
        '3' => Packet::Pong,
        '4' => decode_socket_packet(rest)?,
        '5' | '6' => Packet::Ignored,
        other => bail!(ProtocolError::InvalidFrame(format!(
            "unknown packet type '{}'",
            other
        ))),
    };
    Ok(packet)
}

fn decode_socket_packet(frame: &str) -> Result<Packet> {
    let (kind, rest) = split_type(frame)?;
    let Some(rest) = strip_default_namespace(rest) else {
        return Ok(Packet::Ignored);
    };

    let packet = match kind {
        '0' => Packet::Connected,
        '1' => Packet::Disconnected,
        '2' => {
            // An ack id may sit between the type and the array
            let array = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            match decode_event(array)? {
                Some(event) => Packet::Event(event),
                None => Packet::Ignored,
            }
        }
        '4' => Packet::ConnectRefused(refusal_reason(rest)),
        '3' | '5' | '6' => Packet::Ignored,
        other => bail!(ProtocolError::InvalidFrame(format!(
            "unknown socket.io packet type '{}'",
            other
        ))),
    };
    Ok(packet)
}

fn split_type(frame: &str) -> Result<(char, &str)> {
    match frame.chars().next() {
        Some(kind) => Ok((kind, &frame[kind.len_utf8()..])),
        None => bail!(ProtocolError::InvalidFrame("empty frame".into())),
    }
}

/// Strip a `/,` namespace prefix; `None` when the packet names another namespace
fn strip_default_namespace(rest: &str) -> Option<&str> {
    if !rest.starts_with('/') {
        return Some(rest);
    }
    let (namespace, tail) = rest.split_once(',').unwrap_or((rest, ""));
    (namespace == "/").then_some(tail)
}

fn refusal_reason(payload: &str) -> String {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => payload.to_string(),
        },
        Ok(Value::String(message)) => message,
        _ if payload.is_empty() => "connection refused".to_string(),
        _ => payload.to_string(),
    }
}

/// Build the WebSocket endpoint for a socket.io server at `base`.
///
/// `http`/`https` map to `ws`/`wss`. A bare host gets the default
/// `/socket.io/` path; the Engine.IO query is always set.
pub fn socket_url(base: &str) -> Result<Url, ProtocolError> {
    let invalid = |reason: &str| ProtocolError::InvalidUrl {
        url: base.to_string(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(base).map_err(|e| invalid(&e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid("expected a ws, wss, http or https URL")),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot switch to a WebSocket scheme"))?;

    if url.path() == "/" {
        url.set_path("/socket.io/");
    }
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}
