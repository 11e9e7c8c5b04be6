//! chatbox - A terminal chat client with live rooms
//!
//! This crate provides the core functionality for chatbox, including:
//! - The live channel (socket.io over WebSocket, carrying named events)
//! - The session controller (authentication, rooms, message feed)
//! - The remote API client and picture upload
//! - Credential storage and configuration management
//!
//! # Architecture
//!
//! chatbox talks to two server surfaces:
//! - A request/response API for accounts, profiles, room lists and history
//! - A live channel for authentication, room membership and message delivery
//!
//! The session controller is a plain state machine. The client module runs
//! it inside a single event loop that feeds it channel events, user input
//! and API results.

pub mod api;
pub mod channel;
pub mod client;
pub mod config;
pub mod credentials;
pub mod protocol;
pub mod session;
