//! Client - user-facing commands and the interactive chat loop

mod commands;
mod input;
mod render;

pub use input::{parse_input, resolve_room, ParsedInput};
pub use render::{format_message, format_profile, format_room_list, Transcript};

use crate::api::{ApiClient, ApiError, ChatApi, PictureUploader};
use crate::channel::{ChannelEvent, LiveChannel, LiveChannelClient};
use crate::client::commands::{handle_control_command, switch_room, CommandResult};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::protocol::{ChatMessage, Room};
use crate::session::{HistoryRequest, Observer, SessionController, SessionUpdate};
use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};

/// How an interactive chat session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatExit {
    /// The user left
    Quit,
    /// Credentials are missing or were rejected
    RedirectToLogin,
    /// The connection was lost and reconnect attempts ran out
    ConnectionLost,
}

type HistoryResult = (HistoryRequest, Result<Vec<ChatMessage>, ApiError>);

/// Log in and store the returned credentials
pub async fn login(
    config: &Config,
    store: &CredentialStore,
    email: &str,
    password: &str,
) -> Result<()> {
    let api = ApiClient::new(&config.server.api_url);
    let auth = api.login(email, password).await.map_err(form_error)?;

    store.store_credentials(&auth.jwt, &auth.refresh_token, auth.user.clone(), &auth.uid)?;
    tracing::info!("Logged in as {}", auth.uid);
    println!("Logged in as {}.", auth.user.username);
    Ok(())
}

/// Create an account and store the returned credentials
pub async fn register(
    config: &Config,
    store: &CredentialStore,
    email: &str,
    username: &str,
    password: &str,
) -> Result<()> {
    let api = ApiClient::new(&config.server.api_url);
    let auth = api
        .register(email, username, password)
        .await
        .map_err(form_error)?;

    store.store_credentials(&auth.jwt, &auth.refresh_token, auth.user.clone(), &auth.uid)?;
    tracing::info!("Registered {}", auth.uid);
    println!("Welcome, {}!", auth.user.username);
    Ok(())
}

/// Forget stored credentials
pub fn logout(store: &CredentialStore) -> Result<()> {
    store.clear()?;
    println!("Logged out.");
    Ok(())
}

/// Print a profile; defaults to the logged in user
pub async fn show_profile(
    config: &Config,
    store: &CredentialStore,
    uid: Option<String>,
) -> Result<()> {
    let stored = store.load()?;
    let uid = match uid {
        Some(uid) => uid,
        None => stored
            .current_uid()
            .map(String::from)
            .ok_or_else(|| anyhow!("Not logged in; pass a uid or run `chatbox login`"))?,
    };

    let api = ApiClient::new(&config.server.api_url).with_token(stored.jwt.clone());
    let profile = api
        .profile_data(&uid)
        .await
        .with_context(|| format!("Failed to load profile {}", uid))?;

    if stored.current_uid() == Some(uid.as_str()) {
        store.store_profile(profile.clone())?;
    }
    println!("{}", format_profile(&profile));
    Ok(())
}

/// Update the about text of the logged in user
pub async fn set_about(config: &Config, store: &CredentialStore, about: &str) -> Result<()> {
    let stored = store.load()?;
    let jwt = stored
        .jwt
        .clone()
        .ok_or_else(|| anyhow!("Not logged in; run `chatbox login` first"))?;

    let api = ApiClient::new(&config.server.api_url).with_token(Some(jwt));
    api.set_about(about).await.context("Failed to save about text")?;

    if let Some(uid) = stored.current_uid() {
        match api.profile_data(uid).await {
            Ok(profile) => store.store_profile(profile)?,
            Err(e) => tracing::warn!("Failed to refresh cached profile: {}", e),
        }
    }
    println!("About text saved.");
    Ok(())
}

/// Upload a new profile picture for the logged in user
pub async fn upload_picture(
    config: &Config,
    store: &CredentialStore,
    path: &Path,
) -> Result<bool> {
    let stored = store.load()?;
    let jwt = stored
        .jwt
        .ok_or_else(|| anyhow!("Not logged in; run `chatbox login` first"))?;

    let uploader = PictureUploader::new(&config.server.upload_url);
    let stored_ok = uploader.upload(&jwt, path).await?;
    if stored_ok {
        println!("Picture uploaded.");
    }
    Ok(stored_ok)
}

/// Run the interactive chat on stdin/stdout
pub async fn run_chat(config: &Config, store: &CredentialStore) -> Result<ChatExit> {
    let stored = store.load()?;
    let api = Arc::new(ApiClient::new(&config.server.api_url).with_token(stored.jwt));
    let input = BufReader::new(tokio::io::stdin());
    run_chat_session(config, store, api, input).await
}

/// Run a chat session reading user input from `input`.
///
/// Every event (live channel, user input, room list, history results and
/// reconnect timer) is handled on this task, one at a time.
pub async fn run_chat_session<A, R>(
    config: &Config,
    store: &CredentialStore,
    api: Arc<A>,
    input: R,
) -> Result<ChatExit>
where
    A: ChatApi + 'static,
    R: AsyncBufRead + Unpin,
{
    let stored = store.load()?;
    let own_uid = stored.current_uid().map(String::from);

    let mut controller = SessionController::new(config.chat.history_length);
    controller.subscribe(presenter(own_uid.clone(), config.chat.show_timestamps));

    let socket_url = config.server.socket_url.clone();
    let (event_tx, mut event_rx) = mpsc::channel::<ChannelEvent>(256);
    let url = socket_url.clone();
    let mounted = controller.mount(&stored, move || {
        Box::new(LiveChannelClient::connect(url, event_tx)) as Box<dyn LiveChannel>
    });
    if !mounted {
        return Ok(ChatExit::RedirectToLogin);
    }

    let (rooms_tx, mut rooms_rx) = mpsc::channel::<Vec<Room>>(4);
    spawn_room_fetch(Arc::clone(&api), rooms_tx);
    if let Some(uid) = own_uid {
        spawn_profile_refresh(Arc::clone(&api), store.clone(), uid);
    }

    let (history_tx, mut history_rx) = mpsc::channel::<HistoryResult>(16);
    let mut lines = input.lines();

    let reconnect_timer = sleep(Duration::ZERO);
    tokio::pin!(reconnect_timer);
    let mut reconnect_pending = false;
    let mut reconnect_attempt = 0u32;

    let exit = loop {
        dispatch_history(&mut controller, &api, &history_tx);

        if controller.redirect_requested() {
            break ChatExit::RedirectToLogin;
        }
        if controller.state().is_authenticated() {
            reconnect_attempt = 0;
        }

        tokio::select! {
            Some(event) = event_rx.recv() => {
                let terminal = event.is_terminal();
                controller.handle_channel_event(event);

                if terminal && controller.can_reconnect() {
                    reconnect_attempt += 1;
                    match config.reconnect.delay_for(reconnect_attempt) {
                        Some(delay) => {
                            tracing::info!(
                                "Reconnect attempt {} in {:?}",
                                reconnect_attempt,
                                delay
                            );
                            reconnect_timer.as_mut().reset(Instant::now() + delay);
                            reconnect_pending = true;
                        }
                        None => break ChatExit::ConnectionLost,
                    }
                }
            }

            () = &mut reconnect_timer, if reconnect_pending => {
                reconnect_pending = false;
                let (tx, rx) = mpsc::channel::<ChannelEvent>(256);
                event_rx = rx;
                let url = socket_url.clone();
                controller.reconnect(move || {
                    Box::new(LiveChannelClient::connect(url, tx)) as Box<dyn LiveChannel>
                });
            }

            Some(rooms) = rooms_rx.recv() => controller.set_rooms(rooms),

            Some((request, outcome)) = history_rx.recv() => {
                controller.apply_history(&request, outcome);
            }

            line = lines.next_line() => match line.context("Failed to read input")? {
                Some(line) => {
                    if let CommandResult::Exit = handle_line(&line, &mut controller)? {
                        break ChatExit::Quit;
                    }
                }
                None => break ChatExit::Quit,
            },
        }
    };

    controller.teardown();
    Ok(exit)
}

fn handle_line(line: &str, controller: &mut SessionController) -> Result<CommandResult> {
    match parse_input(line)? {
        ParsedInput::Empty => {}
        ParsedInput::Text(text) => {
            if !controller.send_message(text) {
                println!("Not connected to a room; message not sent.");
            }
        }
        ParsedInput::SwitchRoom(target) => switch_room(controller, &target),
        ParsedInput::ControlCommand { command, args } => {
            return Ok(handle_control_command(&command, args, controller));
        }
    }
    Ok(CommandResult::Continue)
}

/// Start fetches for history requests the controller issued
fn dispatch_history<A: ChatApi + 'static>(
    controller: &mut SessionController,
    api: &Arc<A>,
    results: &mpsc::Sender<HistoryResult>,
) {
    for request in controller.drain_history_requests() {
        let api = Arc::clone(api);
        let results = results.clone();
        tokio::spawn(async move {
            let outcome = api.chat_history(&request.room_id, request.length).await;
            let _ = results.send((request, outcome)).await;
        });
    }
}

fn spawn_room_fetch<A: ChatApi + 'static>(api: Arc<A>, rooms: mpsc::Sender<Vec<Room>>) {
    tokio::spawn(async move {
        match api.public_chats().await {
            Ok(list) => {
                let _ = rooms.send(list).await;
            }
            Err(e) => tracing::error!("Failed to load rooms: {}", e),
        }
    });
}

/// Refresh the cached profile of the logged in user
fn spawn_profile_refresh<A: ChatApi + 'static>(api: Arc<A>, store: CredentialStore, uid: String) {
    tokio::spawn(async move {
        match api.profile_data(&uid).await {
            Ok(profile) => {
                if let Err(e) = store.store_profile(profile) {
                    tracing::warn!("Failed to cache profile: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to load profile {}: {}", uid, e),
        }
    });
}

/// Prints session updates to the terminal
fn presenter(own_uid: Option<String>, show_timestamps: bool) -> Observer {
    let mut transcript = Transcript::new(own_uid, show_timestamps);
    Box::new(move |update: &SessionUpdate| {
        for line in transcript.lines(update) {
            println!("{}", line);
        }
        match update {
            SessionUpdate::RedirectToLogin => {
                eprintln!("Session rejected or missing; run `chatbox login <email>`.")
            }
            SessionUpdate::ConnectionLost(reason) => eprintln!("Connection lost: {}", reason),
            SessionUpdate::StateChanged(state) => tracing::debug!("Session {}", state),
            _ => {}
        }
    })
}

/// Render an API error for a form field, or pass it through
fn form_error(err: ApiError) -> anyhow::Error {
    match err {
        ApiError::Validation { field, message } => anyhow!("{} ({})", message, field),
        other => anyhow::Error::new(other),
    }
}

/// Read a password from `CHATBOX_PASSWORD` or the first line of stdin
pub fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var("CHATBOX_PASSWORD") {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password field empty.");
    }
    Ok(password)
}
