//! Command handling for chat control commands (prefixed with `:`)

use crate::client::input::resolve_room;
use crate::client::render::{format_room_list, HELP_TEXT};
use crate::session::SessionController;

pub enum CommandResult {
    Continue,
    Exit,
}

/// Handle a parsed control command and return whether to continue or exit.
pub fn handle_control_command(
    command: &str,
    args: Vec<String>,
    controller: &mut SessionController,
) -> CommandResult {
    match command {
        "rooms" | "list" => {
            let active = controller.active_room().map(|r| r.id.as_str());
            println!("{}", format_room_list(controller.rooms(), active));
        }
        "join" => {
            let Some(target) = args.first() else {
                println!("Usage: :join <room>");
                return CommandResult::Continue;
            };
            switch_room(controller, target);
        }
        "status" => {
            let room = controller
                .active_room()
                .map(|r| format!("#{}", r.name))
                .unwrap_or_else(|| "no room".to_string());
            println!(
                "Session {}, {}, {} messages",
                controller.state(),
                room,
                controller.feed().len()
            );
        }
        "help" | "?" => println!("{}", HELP_TEXT),
        "quit" | "exit" => return CommandResult::Exit,
        _ => println!("Unknown command: {}", command),
    }

    CommandResult::Continue
}

/// Switch to a room named by id or display name
pub fn switch_room(controller: &mut SessionController, target: &str) {
    let Some(room_id) = resolve_room(controller.rooms(), target).map(|r| r.id.clone()) else {
        println!("Unknown room: {}", target);
        return;
    };
    if !controller.switch_room(&room_id) {
        println!("Not connected; cannot switch rooms right now.");
    }
}
