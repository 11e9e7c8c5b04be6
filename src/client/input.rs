//! Input handling - parse user input and commands

use crate::protocol::Room;
use anyhow::Result;

/// Parsed user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    /// Nothing to do
    Empty,

    /// Message for the active room
    Text(String),

    /// Switch active room: @room
    SwitchRoom(String),

    /// Control command: :command args
    ControlCommand { command: String, args: Vec<String> },
}

/// Parse a line of user input
pub fn parse_input(line: &str) -> Result<ParsedInput> {
    let line = line.trim();

    if line.is_empty() {
        return Ok(ParsedInput::Empty);
    }

    // Control command: :command
    if let Some(rest) = line.strip_prefix(':') {
        let parts: Vec<&str> = rest.splitn(2, ' ').collect();
        let command = parts[0].to_string();
        let args = parts
            .get(1)
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        return Ok(ParsedInput::ControlCommand { command, args });
    }

    // Room switch: @room
    if let Some(rest) = line.strip_prefix('@') {
        let room = rest.split_whitespace().next().unwrap_or(rest).to_string();
        if !room.is_empty() {
            return Ok(ParsedInput::SwitchRoom(room));
        }
    }

    // Regular text
    Ok(ParsedInput::Text(line.to_string()))
}

/// Find a room by id, falling back to a case-insensitive name match
pub fn resolve_room<'a>(rooms: &'a [Room], target: &str) -> Option<&'a Room> {
    let target = target.trim_start_matches('#');
    rooms
        .iter()
        .find(|r| r.id == target)
        .or_else(|| rooms.iter().find(|r| r.name.eq_ignore_ascii_case(target)))
}
