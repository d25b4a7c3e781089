//! Real-time like notifications
//!
//! The hub keeps the live connection registry; the socket module adapts
//! WebSocket clients onto it.

pub mod hub;
pub mod socket;

use crate::core::AppState;
use axum::{routing::get, Router};

pub use hub::{
    BroadcastReport, ClientContext, ConnectionHandle, ConnectionState, HubConfig, HubError,
    LikeEvent, NotificationHub, Subscription,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(socket::ws_handler))
}
