//! Chat session - connection lifecycle, room membership and the message feed

mod controller;
mod feed;
mod observer;
mod state;

pub use controller::SessionController;
pub use feed::Feed;
pub use observer::{Observer, SubscriptionId};
pub use state::{HistoryRequest, SessionState, SessionUpdate};
