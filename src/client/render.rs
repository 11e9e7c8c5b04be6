//! Plain-text rendering of feed entries, rooms and profiles

use crate::protocol::{resolve_picture_url, ChatMessage, PictureSize, Profile, Room};
use crate::session::SessionUpdate;
use chrono::{DateTime, Local};

pub const HELP_TEXT: &str = "\
Type a message and press Enter to send it to the active room.

  @<room>        switch room (by id or name)
  :join <room>   same as @<room>
  :rooms         list rooms
  :status        show session state
  :help          show this help
  :quit          leave the chat";

/// One feed line: `[time] name: content`
pub fn format_message(
    message: &ChatMessage,
    own_uid: Option<&str>,
    received_at: Option<DateTime<Local>>,
) -> String {
    let mut line = String::new();
    if let Some(time) = received_at {
        line.push_str(&format!("[{}] ", time.format("%H:%M:%S")));
    }
    line.push_str(&message.sender.username);
    if own_uid == Some(message.sender.uid.as_str()) {
        line.push_str(" (you)");
    }
    line.push_str(": ");
    line.push_str(&message.content);
    line
}

/// Turns session updates into transcript lines, oldest at the top.
///
/// Live messages arriving while a room's history loads are held back and
/// printed with the history, below it.
#[derive(Debug)]
pub struct Transcript {
    own_uid: Option<String>,
    show_timestamps: bool,
    loading: bool,
}

impl Transcript {
    pub fn new(own_uid: Option<String>, show_timestamps: bool) -> Self {
        Self {
            own_uid,
            show_timestamps,
            loading: false,
        }
    }

    /// Lines to print for `update`
    pub fn lines(&mut self, update: &SessionUpdate) -> Vec<String> {
        match update {
            SessionUpdate::ActiveRoomChanged(room) => {
                self.loading = true;
                vec![format!("-- #{} --", room.name)]
            }
            SessionUpdate::MessageAdded(_) if self.loading => Vec::new(),
            SessionUpdate::MessageAdded(message) => {
                let time = self.show_timestamps.then(Local::now);
                vec![format_message(message, self.own_uid.as_deref(), time)]
            }
            SessionUpdate::FeedReplaced(messages) => {
                self.loading = false;
                messages
                    .iter()
                    .rev()
                    .map(|m| format_message(m, self.own_uid.as_deref(), None))
                    .collect()
            }
            SessionUpdate::RoomsUpdated(rooms) => {
                vec![format!("{} rooms available (:rooms to list)", rooms.len())]
            }
            _ => Vec::new(),
        }
    }
}

/// Room list with the active room marked
pub fn format_room_list(rooms: &[Room], active: Option<&str>) -> String {
    if rooms.is_empty() {
        return "No rooms available.".to_string();
    }
    rooms
        .iter()
        .map(|room| {
            let marker = if active == Some(room.id.as_str()) {
                "*"
            } else {
                " "
            };
            format!("{} #{} ({})", marker, room.name, room.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_profile(profile: &Profile) -> String {
    let about = if profile.about.is_empty() {
        "(no about text)"
    } else {
        profile.about.as_str()
    };
    format!(
        "{} ({})\npicture: {}\n\n{}",
        profile.username,
        profile.uid,
        resolve_picture_url(&profile.pfp_url, PictureSize::Large),
        about
    )
}
