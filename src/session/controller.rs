//! Session controller - drives one live session from mount to teardown

use super::observer::{Observer, Observers, SubscriptionId};
use super::{Feed, HistoryRequest, SessionState, SessionUpdate};
use crate::api::ApiError;
use crate::channel::{ChannelEvent, LiveChannel};
use crate::credentials::{SessionCredentials, StoredSession};
use crate::protocol::{ChatMessage, ClientEvent, MessageOrigin, Room};

/// Owns the live channel, the room set, the active room and its feed.
///
/// The controller performs no I/O of its own: the live channel is created
/// through the closure handed to `mount`/`reconnect`, inbound events are fed
/// in through `handle_channel_event`, and history requests are queued for the
/// caller to run and report back through `apply_history`.
pub struct SessionController {
    state: SessionState,

    credentials: Option<SessionCredentials>,

    channel: Option<Box<dyn LiveChannel>>,

    /// Rooms known from the room list
    rooms: Vec<Room>,

    active_room: Option<Room>,

    feed: Feed,

    /// Messages requested per history fetch
    history_length: u32,

    /// Incremented for every history request and on teardown
    generation: u64,

    pending_history: Option<HistoryRequest>,

    /// Requests not yet picked up by the caller
    outbox: Vec<HistoryRequest>,

    redirect_requested: bool,

    observers: Observers,
}

impl SessionController {
    pub fn new(history_length: u32) -> Self {
        Self {
            state: SessionState::Disconnected,
            credentials: None,
            channel: None,
            rooms: Vec::new(),
            active_room: None,
            feed: Feed::new(),
            history_length,
            generation: 0,
            pending_history: None,
            outbox: Vec::new(),
            redirect_requested: false,
            observers: Observers::default(),
        }
    }

    /// Start a session from stored credentials.
    ///
    /// With complete credentials the live channel is opened through `connect`
    /// and the session enters `Connecting`. Otherwise observers get
    /// `RedirectToLogin` and no connection is made.
    pub fn mount<F>(&mut self, stored: &StoredSession, connect: F) -> bool
    where
        F: FnOnce() -> Box<dyn LiveChannel>,
    {
        if self.channel.is_some() {
            tracing::warn!("Session already mounted, ignoring mount");
            return false;
        }

        let Some(credentials) = stored.session_credentials() else {
            tracing::info!("No stored credentials, redirecting to login");
            self.request_redirect();
            return false;
        };

        tracing::info!("Mounting session for {}", credentials.profile.uid);
        self.credentials = Some(credentials);
        self.redirect_requested = false;
        self.channel = Some(connect());
        self.set_state(SessionState::Connecting);
        true
    }

    /// Open a new live channel after the previous one was lost
    pub fn reconnect<F>(&mut self, connect: F) -> bool
    where
        F: FnOnce() -> Box<dyn LiveChannel>,
    {
        if self.state != SessionState::Disconnected || self.credentials.is_none() {
            return false;
        }

        tracing::info!("Reconnecting live channel");
        self.close_channel();
        self.channel = Some(connect());
        self.set_state(SessionState::Connecting);
        true
    }

    /// Process one event from the live channel
    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::ConnectionEstablished => {
                if self.state != SessionState::Connecting {
                    tracing::debug!("Ignoring connection event in state {}", self.state);
                    return;
                }
                let Some(jwt) = self.credentials.as_ref().map(|c| c.jwt.clone()) else {
                    return;
                };
                self.set_state(SessionState::Authenticating);
                self.emit(ClientEvent::Authenticate { jwt });
            }

            ChannelEvent::AuthenticationResult(accepted) => {
                if self.state != SessionState::Authenticating {
                    tracing::debug!("Ignoring authentication result in state {}", self.state);
                    return;
                }
                if accepted {
                    tracing::info!("Live channel authenticated");
                    self.set_state(SessionState::Authenticated);
                    self.join_default_room();
                } else {
                    tracing::warn!("Live channel authentication rejected");
                    self.close_channel();
                    self.invalidate_history();
                    self.credentials = None;
                    self.set_state(SessionState::Disconnected);
                    self.request_redirect();
                }
            }

            ChannelEvent::MessageReceived(message) => self.receive_message(message),

            ChannelEvent::ConnectionError(reason) => self.connection_lost(reason),

            ChannelEvent::Closed => self.connection_lost("connection closed by server".into()),
        }
    }

    /// Install the room list; joins the default room once authenticated
    pub fn set_rooms(&mut self, rooms: Vec<Room>) {
        tracing::debug!("Room list updated: {} rooms", rooms.len());
        self.rooms = rooms;
        self.observers
            .notify(&SessionUpdate::RoomsUpdated(self.rooms.clone()));
        self.join_default_room();
    }

    /// Switch to the room with `room_id`; unknown ids are ignored
    pub fn switch_room(&mut self, room_id: &str) -> bool {
        let Some(room) = self.rooms.iter().find(|r| r.id == room_id).cloned() else {
            tracing::debug!("Unknown room '{}', not switching", room_id);
            return false;
        };
        if !self.state.is_authenticated() {
            tracing::debug!("Cannot switch rooms in state {}", self.state);
            return false;
        }
        self.join(room);
        true
    }

    /// Send a message to the active room.
    ///
    /// Dropped unless the channel is connected and a room is active; the
    /// feed is only updated when the server echoes the message back.
    pub fn send_message(&mut self, body: impl Into<String>) -> bool {
        let ready = self.state.in_room()
            && self.active_room.is_some()
            && self.channel.as_ref().is_some_and(|c| c.is_connected());
        if !ready {
            tracing::debug!("Not in a connected room, dropping outgoing message");
            return false;
        }
        self.emit(ClientEvent::SendMessage { body: body.into() });
        true
    }

    /// Take the history requests issued since the last call
    pub fn drain_history_requests(&mut self) -> Vec<HistoryRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Report the outcome of a history request.
    ///
    /// Returns false when the request is no longer pending (the room was
    /// switched again or the session was torn down); the outcome is ignored.
    pub fn apply_history(
        &mut self,
        request: &HistoryRequest,
        outcome: Result<Vec<ChatMessage>, ApiError>,
    ) -> bool {
        match &self.pending_history {
            Some(pending) if pending.generation == request.generation => {}
            _ => {
                tracing::debug!(
                    "Discarding stale history for room '{}' (generation {})",
                    request.room_id,
                    request.generation
                );
                return false;
            }
        }
        self.pending_history = None;

        match outcome {
            Ok(batch) => {
                tracing::debug!(
                    "Loaded {} messages for room '{}'",
                    batch.len(),
                    request.room_id
                );
                self.feed.apply_history(
                    batch
                        .into_iter()
                        .map(|m| m.with_origin(MessageOrigin::History))
                        .collect(),
                );
            }
            Err(e) => {
                tracing::warn!("Failed to load history for '{}': {}", request.room_id, e);
                self.feed.finish_loading();
            }
        }

        if self.state == SessionState::JoiningRoom {
            self.set_state(SessionState::InRoom);
        }
        self.observers
            .notify(&SessionUpdate::FeedReplaced(self.feed.to_vec()));
        true
    }

    /// Close the channel, drop observers and forget the session
    pub fn teardown(&mut self) {
        tracing::info!("Tearing down session");
        self.close_channel();
        self.invalidate_history();
        self.feed.clear();
        self.credentials = None;
        self.set_state(SessionState::Disconnected);
        self.observers.clear();
    }

    /// Register an observer for session updates
    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn active_room(&self) -> Option<&Room> {
        self.active_room.as_ref()
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn credentials(&self) -> Option<&SessionCredentials> {
        self.credentials.as_ref()
    }

    /// Whether the session ended because credentials are missing or rejected
    pub fn redirect_requested(&self) -> bool {
        self.redirect_requested
    }

    /// Whether a lost connection may be re-established
    pub fn can_reconnect(&self) -> bool {
        self.state == SessionState::Disconnected
            && self.credentials.is_some()
            && !self.redirect_requested
    }

    fn join_default_room(&mut self) {
        if self.state != SessionState::Authenticated {
            return;
        }
        // After a reconnect the previously active room wins over the default.
        let target = self
            .active_room
            .as_ref()
            .and_then(|active| self.rooms.iter().find(|r| r.id == active.id))
            .or_else(|| self.rooms.first())
            .cloned();
        if let Some(room) = target {
            self.join(room);
        }
    }

    fn join(&mut self, room: Room) {
        let Some(jwt) = self.credentials.as_ref().map(|c| c.jwt.clone()) else {
            return;
        };
        tracing::info!("Joining room '{}' ({})", room.name, room.id);
        self.set_state(SessionState::JoiningRoom);
        self.emit(ClientEvent::JoinChat {
            chat_id: room.id.clone(),
            kind: room.kind,
            jwt,
        });

        self.feed.begin_loading();
        self.generation += 1;
        let request = HistoryRequest {
            generation: self.generation,
            room_id: room.id.clone(),
            length: self.history_length,
        };
        self.pending_history = Some(request.clone());
        self.outbox.push(request);

        self.active_room = Some(room.clone());
        self.observers
            .notify(&SessionUpdate::ActiveRoomChanged(room));
    }

    fn receive_message(&mut self, message: ChatMessage) {
        if !self.state.in_room() {
            tracing::debug!("No active room, dropping message in state {}", self.state);
            return;
        }
        let Some(room) = &self.active_room else {
            return;
        };
        if !message.belongs_to(&room.id) {
            tracing::debug!(
                "Dropping message for room {:?} while in '{}'",
                message.chat_id,
                room.id
            );
            return;
        }

        let message = message.with_origin(MessageOrigin::Live);
        self.feed.prepend(message.clone());
        self.observers.notify(&SessionUpdate::MessageAdded(message));
    }

    fn connection_lost(&mut self, reason: String) {
        if self.state == SessionState::Disconnected {
            return;
        }
        tracing::warn!("Live channel lost: {}", reason);
        self.close_channel();
        self.invalidate_history();
        self.set_state(SessionState::Disconnected);
        self.observers
            .notify(&SessionUpdate::ConnectionLost(reason));
    }

    fn request_redirect(&mut self) {
        self.redirect_requested = true;
        self.observers.notify(&SessionUpdate::RedirectToLogin);
    }

    fn invalidate_history(&mut self) {
        self.generation += 1;
        self.pending_history = None;
        self.outbox.clear();
        self.feed.finish_loading();
    }

    fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    fn emit(&self, event: ClientEvent) {
        match &self.channel {
            Some(channel) => channel.emit(event),
            None => tracing::debug!("No live channel, dropping '{}'", event.name()),
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        tracing::debug!("Session state: {} -> {}", self.state, state);
        self.state = state;
        self.observers.notify(&SessionUpdate::StateChanged(state));
    }
}
