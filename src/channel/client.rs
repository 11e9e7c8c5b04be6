//! WebSocket implementation of the live channel

use super::{ChannelEvent, LiveChannel};
use crate::protocol::packet::{CONNECT_FRAME, DISCONNECT_FRAME, PONG_FRAME};
use crate::protocol::{
    decode_packet, encode_event, socket_url, ClientEvent, Packet, ServerEvent, MAX_FRAME_SIZE,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Duration, Instant};
use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

/// Time allowed between opening the socket and the server's open packet
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// One socket.io connection to the live channel server
///
/// The connection is owned by a background task that answers server pings
/// and treats a silent server as lost. Dropping the client closes the
/// connection, so it never outlives the session that opened it.
pub struct LiveChannelClient {
    /// Identifies this connection in logs
    id: Uuid,

    /// Outbound events for the connection task
    outbound: mpsc::UnboundedSender<ClientEvent>,

    /// Set while the socket.io namespace is joined
    connected: Arc<AtomicBool>,

    /// Stops the connection task
    shutdown: Option<oneshot::Sender<()>>,
}

impl LiveChannelClient {
    /// Open a connection to the socket.io server at `server_url`.
    ///
    /// Returns immediately; the outcome arrives on `events` as
    /// `ConnectionEstablished` (once the namespace is joined) or
    /// `ConnectionError`.
    pub fn connect(server_url: impl Into<String>, events: mpsc::Sender<ChannelEvent>) -> Self {
        let id = Uuid::new_v4();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(connection_task(
            id,
            server_url.into(),
            events,
            outbound_rx,
            shutdown_rx,
            Arc::clone(&connected),
        ));

        Self {
            id,
            outbound: outbound_tx,
            connected,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl LiveChannel for LiveChannelClient {
    fn emit(&self, event: ClientEvent) {
        if !self.is_connected() {
            tracing::debug!("Channel {} not connected, dropping '{}'", self.id, event.name());
            return;
        }
        if self.outbound.send(event).is_err() {
            tracing::debug!("Channel {} task gone, dropping event", self.id);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            tracing::debug!("Channel {} closing", self.id);
        }
    }
}

impl Drop for LiveChannelClient {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.close();
        }
    }
}

/// Owns the socket: performs the handshake, then pumps both directions
async fn connection_task(
    id: Uuid,
    server_url: String,
    events: mpsc::Sender<ChannelEvent>,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    mut shutdown: oneshot::Receiver<()>,
    connected: Arc<AtomicBool>,
) {
    let url = match socket_url(&server_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Channel {}: {}", id, e);
            let _ = events.send(ChannelEvent::ConnectionError(e.to_string())).await;
            return;
        }
    };
    let config = WebSocketConfig {
        max_message_size: Some(MAX_FRAME_SIZE),
        max_frame_size: Some(MAX_FRAME_SIZE),
        ..Default::default()
    };

    let stream = tokio::select! {
        _ = &mut shutdown => {
            tracing::debug!("Channel {} closed before connecting", id);
            return;
        }
        result = connect_async_with_config(url.as_str(), Some(config), false) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                tracing::warn!("Channel {} failed to connect to {}: {}", id, url, e);
                let _ = events.send(ChannelEvent::ConnectionError(e.to_string())).await;
                return;
            }
        },
    };

    tracing::info!("Channel {} opened {}", id, url);
    let (mut sink, mut source) = stream.split();

    // Reset by the open packet and every ping
    let liveness = sleep(HANDSHAKE_TIMEOUT);
    tokio::pin!(liveness);
    let mut liveness_window: Option<Duration> = None;

    let ending = loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = sink.send(Message::Text(DISCONNECT_FRAME.to_string())).await;
                let _ = sink.close().await;
                tracing::debug!("Channel {} closed", id);
                break None;
            }

            () = &mut liveness => {
                tracing::warn!("Channel {} heard no ping from the server in time", id);
                break Some(ChannelEvent::ConnectionError("ping timeout".into()));
            }

            event = outbound.recv() => {
                let Some(event) = event else {
                    let _ = sink.close().await;
                    break None;
                };
                let frame = match encode_event(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!("Failed to encode '{}': {}", event.name(), e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    tracing::error!("Channel {} write failed: {}", id, e);
                    break Some(ChannelEvent::ConnectionError(e.to_string()));
                }
            }

            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let packet = match decode_packet(&text) {
                        Ok(packet) => packet,
                        Err(e) => {
                            tracing::warn!("Channel {} dropped frame: {}", id, e);
                            continue;
                        }
                    };

                    let reply = match packet {
                        Packet::Open(handshake) => {
                            tracing::debug!("Channel {} handshake, sid {}", id, handshake.sid);
                            let window = handshake.liveness_window();
                            liveness.as_mut().reset(Instant::now() + window);
                            liveness_window = Some(window);
                            Some(CONNECT_FRAME)
                        }
                        Packet::Ping => {
                            if let Some(window) = liveness_window {
                                liveness.as_mut().reset(Instant::now() + window);
                            }
                            Some(PONG_FRAME)
                        }
                        Packet::Connected => {
                            tracing::info!("Channel {} connected", id);
                            connected.store(true, Ordering::SeqCst);
                            if events.send(ChannelEvent::ConnectionEstablished).await.is_err() {
                                break None;
                            }
                            None
                        }
                        Packet::Event(event) => {
                            let event = match event {
                                ServerEvent::Authenticated(ok) => ChannelEvent::AuthenticationResult(ok),
                                ServerEvent::EmitMessage(msg) => ChannelEvent::MessageReceived(msg),
                            };
                            if events.send(event).await.is_err() {
                                break None;
                            }
                            None
                        }
                        Packet::Close | Packet::Disconnected => {
                            tracing::info!("Channel {} disconnected by server", id);
                            break Some(ChannelEvent::Closed);
                        }
                        Packet::ConnectRefused(reason) => {
                            tracing::warn!("Channel {} refused: {}", id, reason);
                            break Some(ChannelEvent::ConnectionError(reason));
                        }
                        Packet::Pong | Packet::Ignored => None,
                    };

                    if let Some(frame) = reply {
                        if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                            tracing::error!("Channel {} write failed: {}", id, e);
                            break Some(ChannelEvent::ConnectionError(e.to_string()));
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Channel {} closed by server", id);
                    break Some(ChannelEvent::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Channel {} read failed: {}", id, e);
                    break Some(ChannelEvent::ConnectionError(e.to_string()));
                }
            }
        }
    };

    connected.store(false, Ordering::SeqCst);
    if let Some(event) = ending {
        let _ = events.send(event).await;
    }
    tracing::debug!("Channel {} task finished", id);
}
