//! Integration tests for the session controller, driven through a recording channel

use chatbox::api::ApiError;
use chatbox::channel::{ChannelEvent, LiveChannel};
use chatbox::credentials::StoredSession;
use chatbox::protocol::{
    ChatMessage, ClientEvent, MessageOrigin, Profile, Room, RoomKind, Sender,
};
use chatbox::session::{SessionController, SessionState, SessionUpdate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Records emitted events instead of writing to a socket
#[derive(Clone, Default)]
struct RecordingChannel {
    sent: Arc<Mutex<Vec<ClientEvent>>>,
    connected: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl RecordingChannel {
    fn new() -> Self {
        let channel = Self::default();
        channel.connected.store(true, Ordering::SeqCst);
        channel
    }

    fn sent(&self) -> Vec<ClientEvent> {
        self.sent.lock().unwrap().clone()
    }

    fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl LiveChannel for RecordingChannel {
    fn emit(&self, event: ClientEvent) {
        if self.is_connected() {
            self.sent.lock().unwrap().push(event);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn stored_session() -> StoredSession {
    StoredSession {
        jwt: Some("jwt-1".into()),
        refresh_token: Some("refresh-1".into()),
        user: Some(Profile {
            uid: "u1".into(),
            username: "ann".into(),
            pfp_url: String::new(),
            about: String::new(),
        }),
        uid: Some("u1".into()),
    }
}

fn rooms() -> Vec<Room> {
    vec![Room::public("r1", "general"), Room::public("r2", "random")]
}

fn message(id: &str, room: Option<&str>, content: &str) -> ChatMessage {
    ChatMessage {
        id: Some(id.into()),
        chat_id: room.map(String::from),
        content: content.into(),
        sender: Sender {
            uid: "u2".into(),
            username: "bob".into(),
            pfp_url: String::new(),
        },
        origin: MessageOrigin::Live,
    }
}

fn contents(controller: &SessionController) -> Vec<String> {
    controller.feed().iter().map(|m| m.content.clone()).collect()
}

fn mounted() -> (SessionController, RecordingChannel) {
    let mut controller = SessionController::new(40);
    let channel = RecordingChannel::new();
    let handle = channel.clone();
    assert!(controller.mount(&stored_session(), move || Box::new(handle) as Box<dyn LiveChannel>));
    (controller, channel)
}

/// Mount, connect, authenticate and load the room list
fn in_room() -> (SessionController, RecordingChannel) {
    let (mut controller, channel) = mounted();
    controller.handle_channel_event(ChannelEvent::ConnectionEstablished);
    controller.handle_channel_event(ChannelEvent::AuthenticationResult(true));
    controller.set_rooms(rooms());
    (controller, channel)
}

#[test]
fn test_mount_without_credentials_redirects() {
    let mut controller = SessionController::new(40);
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    controller.subscribe(Box::new(move |u: &SessionUpdate| {
        sink.lock().unwrap().push(u.clone())
    }));

    let mut connected = false;
    let mounted = controller.mount(&StoredSession::default(), || {
        connected = true;
        Box::new(RecordingChannel::new()) as Box<dyn LiveChannel>
    });

    assert!(!mounted);
    assert!(!connected, "no connection may be opened without credentials");
    assert!(controller.redirect_requested());
    assert_eq!(controller.state(), SessionState::Disconnected);
    assert_eq!(*updates.lock().unwrap(), vec![SessionUpdate::RedirectToLogin]);
}

#[test]
fn test_mount_with_partial_credentials_redirects() {
    let mut controller = SessionController::new(40);
    let mut stored = stored_session();
    stored.refresh_token = None;

    assert!(!controller.mount(&stored, || Box::new(RecordingChannel::new()) as Box<dyn LiveChannel>));
    assert!(controller.redirect_requested());
}

#[test]
fn test_authenticate_sent_once_connected() {
    let (mut controller, channel) = mounted();
    assert_eq!(controller.state(), SessionState::Connecting);
    assert!(channel.sent().is_empty());

    controller.handle_channel_event(ChannelEvent::ConnectionEstablished);
    assert_eq!(controller.state(), SessionState::Authenticating);
    assert_eq!(
        channel.sent(),
        vec![ClientEvent::Authenticate {
            jwt: "jwt-1".into()
        }]
    );

    // A duplicate connect notification must not re-authenticate
    controller.handle_channel_event(ChannelEvent::ConnectionEstablished);
    assert_eq!(channel.sent().len(), 1);
}

#[test]
fn test_rejected_authentication_clears_session_and_redirects() {
    let (mut controller, channel) = mounted();
    controller.handle_channel_event(ChannelEvent::ConnectionEstablished);
    controller.handle_channel_event(ChannelEvent::AuthenticationResult(false));

    assert!(channel.was_closed());
    assert!(controller.redirect_requested());
    assert!(controller.credentials().is_none());
    assert!(!controller.can_reconnect());
    assert_eq!(controller.state(), SessionState::Disconnected);
}

#[test]
fn test_default_room_joined_after_rooms_and_auth() {
    let (controller, channel) = in_room();

    assert_eq!(controller.state(), SessionState::JoiningRoom);
    assert_eq!(controller.active_room().map(|r| r.id.as_str()), Some("r1"));
    assert_eq!(
        channel.sent().last(),
        Some(&ClientEvent::JoinChat {
            chat_id: "r1".into(),
            kind: RoomKind::Public,
            jwt: "jwt-1".into(),
        })
    );
}

#[test]
fn test_rooms_before_auth_join_on_authentication() {
    let (mut controller, channel) = mounted();
    controller.set_rooms(rooms());
    assert!(controller.active_room().is_none());

    controller.handle_channel_event(ChannelEvent::ConnectionEstablished);
    controller.handle_channel_event(ChannelEvent::AuthenticationResult(true));

    assert_eq!(controller.active_room().map(|r| r.id.as_str()), Some("r1"));
    let joins = channel
        .sent()
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::JoinChat { .. }))
        .count();
    assert_eq!(joins, 1);
}

#[test]
fn test_empty_room_list_joins_nothing() {
    let (mut controller, channel) = mounted();
    controller.handle_channel_event(ChannelEvent::ConnectionEstablished);
    controller.handle_channel_event(ChannelEvent::AuthenticationResult(true));
    controller.set_rooms(Vec::new());

    assert_eq!(controller.state(), SessionState::Authenticated);
    assert!(controller.active_room().is_none());
    assert!(controller.drain_history_requests().is_empty());
    assert_eq!(channel.sent().len(), 1);
}

#[test]
fn test_history_loads_into_feed() {
    let (mut controller, _channel) = in_room();
    let requests = controller.drain_history_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].room_id, "r1");
    assert_eq!(requests[0].length, 40);
    assert!(controller.feed().is_loading());

    let batch = vec![message("m2", Some("r1"), "second"), message("m1", Some("r1"), "first")];
    assert!(controller.apply_history(&requests[0], Ok(batch)));

    assert_eq!(controller.state(), SessionState::InRoom);
    assert!(!controller.feed().is_loading());
    assert_eq!(contents(&controller), vec!["second", "first"]);
    assert!(controller
        .feed()
        .iter()
        .all(|m| m.origin == MessageOrigin::History));
}

#[test]
fn test_live_messages_prepend_newest_first() {
    let (mut controller, _channel) = in_room();
    let request = controller.drain_history_requests().remove(0);
    controller.apply_history(&request, Ok(vec![message("m1", Some("r1"), "old")]));

    controller.handle_channel_event(ChannelEvent::MessageReceived(message("m2", None, "a")));
    controller.handle_channel_event(ChannelEvent::MessageReceived(message("m3", Some("r1"), "b")));

    assert_eq!(contents(&controller), vec!["b", "a", "old"]);
    assert_eq!(controller.feed().newest().map(|m| m.origin), Some(MessageOrigin::Live));
}

#[test]
fn test_message_for_other_room_dropped() {
    let (mut controller, _channel) = in_room();
    controller.handle_channel_event(ChannelEvent::MessageReceived(message("m1", Some("r2"), "elsewhere")));
    assert!(controller.feed().is_empty());
}

#[test]
fn test_message_before_room_dropped() {
    let (mut controller, _channel) = mounted();
    controller.handle_channel_event(ChannelEvent::ConnectionEstablished);
    controller.handle_channel_event(ChannelEvent::AuthenticationResult(true));
    controller.handle_channel_event(ChannelEvent::MessageReceived(message("m1", None, "early")));
    assert!(controller.feed().is_empty());
}

#[test]
fn test_live_message_during_history_load_stays_in_front() {
    let (mut controller, _channel) = in_room();
    let request = controller.drain_history_requests().remove(0);

    controller.handle_channel_event(ChannelEvent::MessageReceived(message("m3", Some("r1"), "live")));
    let batch = vec![
        message("m3", Some("r1"), "live"),
        message("m2", Some("r1"), "two"),
        message("m1", Some("r1"), "one"),
    ];
    controller.apply_history(&request, Ok(batch));

    assert_eq!(contents(&controller), vec!["live", "two", "one"]);
}

#[test]
fn test_switch_room_discards_stale_history() {
    let (mut controller, channel) = in_room();
    let first = controller.drain_history_requests().remove(0);

    assert!(controller.switch_room("r2"));
    let second = controller.drain_history_requests().remove(0);
    assert_eq!(second.room_id, "r2");
    assert!(second.generation > first.generation);
    assert_eq!(
        channel.sent().last(),
        Some(&ClientEvent::JoinChat {
            chat_id: "r2".into(),
            kind: RoomKind::Public,
            jwt: "jwt-1".into(),
        })
    );

    assert!(!controller.apply_history(&first, Ok(vec![message("a", Some("r1"), "stale")])));
    assert!(controller.feed().is_empty());
    assert_eq!(controller.state(), SessionState::JoiningRoom);

    assert!(controller.apply_history(&second, Ok(vec![message("b", Some("r2"), "fresh")])));
    assert_eq!(contents(&controller), vec!["fresh"]);
    assert_eq!(controller.state(), SessionState::InRoom);
}

#[test]
fn test_switch_to_unknown_room_ignored() {
    let (mut controller, channel) = in_room();
    let before = channel.sent().len();
    assert!(!controller.switch_room("nope"));
    assert_eq!(channel.sent().len(), before);
    assert_eq!(controller.active_room().map(|r| r.id.as_str()), Some("r1"));
}

#[test]
fn test_switch_room_clears_feed() {
    let (mut controller, _channel) = in_room();
    let request = controller.drain_history_requests().remove(0);
    controller.apply_history(&request, Ok(vec![message("m1", Some("r1"), "hello")]));
    assert_eq!(controller.feed().len(), 1);

    controller.switch_room("r2");
    assert!(controller.feed().is_empty());
    assert!(controller.feed().is_loading());
}

#[test]
fn test_history_failure_leaves_room_usable() {
    let (mut controller, channel) = in_room();
    let request = controller.drain_history_requests().remove(0);
    let failure = ApiError::Remote {
        path: "chat.chatHistory".into(),
        message: "boom".into(),
    };

    assert!(controller.apply_history(&request, Err(failure)));
    assert_eq!(controller.state(), SessionState::InRoom);
    assert!(controller.feed().is_empty());
    assert!(!controller.feed().is_loading());

    assert!(controller.send_message("still here"));
    assert_eq!(
        channel.sent().last(),
        Some(&ClientEvent::SendMessage {
            body: "still here".into()
        })
    );
}

#[test]
fn test_send_message_does_not_touch_feed() {
    let (mut controller, channel) = in_room();
    assert!(controller.send_message("hi"));
    assert!(controller.feed().is_empty());
    assert_eq!(
        channel.sent().last(),
        Some(&ClientEvent::SendMessage { body: "hi".into() })
    );
}

#[test]
fn test_send_message_dropped_when_not_ready() {
    let (mut controller, channel) = mounted();
    assert!(!controller.send_message("too early"));
    assert!(channel.sent().is_empty());

    let (mut controller, channel) = in_room();
    channel.connected.store(false, Ordering::SeqCst);
    assert!(!controller.send_message("offline"));
    assert!(!channel
        .sent()
        .iter()
        .any(|e| matches!(e, ClientEvent::SendMessage { .. })));
}

#[test]
fn test_connection_loss_allows_reconnect_to_previous_room() {
    let (mut controller, _first) = in_room();
    controller.switch_room("r2");
    let pending = controller.drain_history_requests().remove(0);

    controller.handle_channel_event(ChannelEvent::Closed);
    assert_eq!(controller.state(), SessionState::Disconnected);
    assert!(controller.can_reconnect());
    assert!(!controller.apply_history(&pending, Ok(Vec::new())));

    let second = RecordingChannel::new();
    let handle = second.clone();
    assert!(controller.reconnect(move || Box::new(handle) as Box<dyn LiveChannel>));
    controller.handle_channel_event(ChannelEvent::ConnectionEstablished);
    controller.handle_channel_event(ChannelEvent::AuthenticationResult(true));

    assert_eq!(controller.active_room().map(|r| r.id.as_str()), Some("r2"));
    assert_eq!(
        second.sent(),
        vec![
            ClientEvent::Authenticate {
                jwt: "jwt-1".into()
            },
            ClientEvent::JoinChat {
                chat_id: "r2".into(),
                kind: RoomKind::Public,
                jwt: "jwt-1".into(),
            },
        ]
    );
}

#[test]
fn test_reconnect_refused_while_connected() {
    let (mut controller, _channel) = in_room();
    assert!(!controller.reconnect(|| Box::new(RecordingChannel::new()) as Box<dyn LiveChannel>));
}

#[test]
fn test_observers_receive_updates_until_unsubscribed() {
    let (mut controller, _channel) = in_room();
    let request = controller.drain_history_requests().remove(0);
    controller.apply_history(&request, Ok(Vec::new()));

    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    let id = controller.subscribe(Box::new(move |u: &SessionUpdate| {
        sink.lock().unwrap().push(u.clone())
    }));

    controller.handle_channel_event(ChannelEvent::MessageReceived(message("m1", None, "one")));
    assert!(controller.unsubscribe(id));
    controller.handle_channel_event(ChannelEvent::MessageReceived(message("m2", None, "two")));

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert!(matches!(&updates[0], SessionUpdate::MessageAdded(m) if m.content == "one"));
    assert!(!controller.unsubscribe(id));
}

#[test]
fn test_switch_room_notifies_observers() {
    let (mut controller, _channel) = in_room();
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    controller.subscribe(Box::new(move |u: &SessionUpdate| {
        sink.lock().unwrap().push(u.clone())
    }));

    controller.switch_room("r2");
    controller.handle_channel_event(ChannelEvent::MessageReceived(message("m3", None, "live")));
    {
        let seen = updates.lock().unwrap();
        assert!(seen.contains(&SessionUpdate::ActiveRoomChanged(Room::public("r2", "random"))));
        // The feed is only handed out once history arrives
        assert!(!seen
            .iter()
            .any(|u| matches!(u, SessionUpdate::FeedReplaced(_))));
    }

    let request = controller
        .drain_history_requests()
        .into_iter()
        .find(|r| r.room_id == "r2")
        .unwrap();
    controller.apply_history(&request, Ok(vec![message("m1", Some("r2"), "old")]));

    let seen = updates.lock().unwrap();
    match seen.last() {
        Some(SessionUpdate::FeedReplaced(feed)) => {
            let contents: Vec<&str> = feed.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, vec!["live", "old"]);
        }
        other => panic!("Expected FeedReplaced, got {:?}", other),
    }
}

#[test]
fn test_teardown_closes_channel_and_ignores_late_results() {
    let (mut controller, channel) = in_room();
    let request = controller.drain_history_requests().remove(0);

    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    controller.subscribe(Box::new(move |u: &SessionUpdate| {
        sink.lock().unwrap().push(u.clone())
    }));

    controller.teardown();
    assert!(channel.was_closed());
    assert_eq!(controller.state(), SessionState::Disconnected);
    let seen = updates.lock().unwrap().len();

    assert!(!controller.apply_history(&request, Ok(vec![message("m1", None, "late")])));
    controller.handle_channel_event(ChannelEvent::MessageReceived(message("m2", None, "late")));
    assert!(controller.feed().is_empty());
    assert_eq!(updates.lock().unwrap().len(), seen);
    assert!(!controller.can_reconnect());
}
