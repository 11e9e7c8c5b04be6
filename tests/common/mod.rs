//! Server side of a socket.io connection for live channel tests
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub type ServerSocket = WebSocketStream<TcpStream>;

/// Open packet with the default socket.io timings
pub const OPEN_FRAME: &str =
    r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// Bind a local listener and return it with the base URL a client is given
pub async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Accept one WebSocket client; returns the socket and the requested path with query
pub async fn accept_socket(listener: &TcpListener) -> (ServerSocket, String) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut target = String::new();
    let ws = tokio_tungstenite::accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            target = request.uri().to_string();
            Ok(response)
        },
    )
    .await
    .unwrap();
    (ws, target)
}

/// Send the open packet and wait for the namespace connect, without answering it
pub async fn open(ws: &mut ServerSocket, open_frame: &str) {
    ws.send(Message::Text(open_frame.to_string())).await.unwrap();
    assert_eq!(next_text(ws).await, "40");
}

/// Accept one client and complete the socket.io handshake
pub async fn accept(listener: &TcpListener) -> ServerSocket {
    let (mut ws, target) = accept_socket(listener).await;
    assert_eq!(target, "/socket.io/?EIO=4&transport=websocket");
    open(&mut ws, OPEN_FRAME).await;
    ws.send(Message::Text(r#"40{"sid":"n1"}"#.to_string()))
        .await
        .unwrap();
    ws
}

/// Next text frame from the client
pub async fn next_text(ws: &mut ServerSocket) -> String {
    loop {
        match timeout(Duration::from_secs(5), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return text,
            Ok(Some(Ok(_))) => continue,
            other => panic!("Expected text frame, got {:?}", other),
        }
    }
}

/// Next client frame as an event array
pub async fn next_event(ws: &mut ServerSocket) -> Value {
    let frame = next_text(ws).await;
    let array = frame
        .strip_prefix("42")
        .unwrap_or_else(|| panic!("Expected event frame, got {}", frame));
    serde_json::from_str(array).unwrap()
}

pub async fn send_event(ws: &mut ServerSocket, name: &str, payload: Value) {
    ws.send(Message::Text(format!("42{}", json!([name, payload]))))
        .await
        .unwrap();
}

/// Keep the socket open until the client goes away
pub async fn drain(mut ws: ServerSocket) {
    while let Some(Ok(_)) = ws.next().await {}
}
