//! WebSocket endpoint
//!
//! One socket maps to one hub connection. Like events go out as JSON text
//! frames; the client may send `{"subscribe": [ids]}` or
//! `{"subscribe": "gallery"}` to change what it hears about.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::hub::{
    ClientContext, ConnectionHandle, ConnectionState, LikeEvent, NotificationHub, Subscription,
};
use crate::core::{AppState, Ctx, Error, Result, ServerConfig};

#[derive(Debug, Default, Deserialize)]
pub struct SocketParams {
    /// Comma separated artwork ids; absent means the whole gallery
    pub artworks: Option<String>,
    /// Bearer token for clients that cannot set headers on the upgrade
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SocketTiming {
    pub heartbeat: Duration,
    pub idle_timeout: Duration,
}

impl SocketTiming {
    /// A zero heartbeat would stall `interval`, so both are at least a second.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            heartbeat: Duration::from_secs(config.heartbeat_secs.max(1)),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs.max(1)),
        }
    }
}

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<SocketParams>,
    ctx: Option<Ctx>,
    headers: HeaderMap,
) -> Result<Response> {
    let subscription = parse_subscription(params.artworks.as_deref())?;

    let user_id = match (ctx, params.token) {
        (Some(ctx), _) => Some(ctx.user_id()),
        (None, Some(token)) => Some(
            state
                .auth
                .validate_session(&token)
                .await
                .map_err(|_| Error::LoginFail)?
                .id,
        ),
        (None, None) => None,
    };

    let agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let client = ClientContext {
        user_id,
        subscription,
        peer: Some(agent.to_string()),
    };

    // Capacity is checked before the upgrade so a full hub answers 503
    let (handle, events) = state.hub.connect(client)?;

    let timing = SocketTiming::from_config(&state.config);
    let hub = state.hub.clone();
    let failed_hub = state.hub.clone();

    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!("[Socket] Upgrade failed for {}: {}", handle, e);
            failed_hub.disconnect(handle);
        })
        .on_upgrade(move |socket| run_session(socket, hub, handle, events, timing)))
}

/// Pump events out and client frames in until either side goes away.
async fn run_session(
    socket: WebSocket,
    hub: Arc<NotificationHub>,
    handle: ConnectionHandle,
    mut events: mpsc::Receiver<LikeEvent>,
    timing: SocketTiming,
) {
    let (mut sender, mut receiver) = socket.split();

    if !hub.activate(handle) {
        // Evicted between connect and upgrade
        let _ = sender.send(Message::Close(None)).await;
        return;
    }
    debug!("[Socket] {} -> {:?}", handle, ConnectionState::Active);

    let mut heartbeat = tokio::time::interval(timing.heartbeat);
    heartbeat.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    info!("[Socket] {} evicted by hub", handle);
                    break;
                };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("[Socket] Failed to encode event: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            frame = receiver.next() => {
                match frame {
                    Some(Ok(msg)) => {
                        last_seen = Instant::now();
                        match msg {
                            Message::Text(text) => {
                                if let Some(subscription) = parse_client_frame(text.as_str()) {
                                    hub.subscribe(handle, subscription);
                                }
                            }
                            Message::Close(_) => break,
                            _ => {}
                        }
                    }
                    Some(Err(e)) => {
                        debug!("[Socket] {} read error: {}", handle, e);
                        break;
                    }
                    None => break,
                }
            }

            _ = heartbeat.tick() => {
                if last_seen.elapsed() >= timing.idle_timeout {
                    info!("[Socket] {} idle for {:?}, closing", handle, timing.idle_timeout);
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.disconnect(handle);
    debug!("[Socket] {} -> {:?}", handle, ConnectionState::Disconnected);
}

/// `None` or empty means the whole gallery.
fn parse_subscription(artworks: Option<&str>) -> Result<Subscription> {
    let Some(raw) = artworks.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Subscription::Gallery);
    };

    let ids = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| Error::BadRequest(format!("Invalid artwork id: {}", part)))
        })
        .collect::<Result<_>>()?;

    Ok(Subscription::Artworks(ids))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubscribeTarget {
    Ids(Vec<i64>),
    Named(String),
}

#[derive(Deserialize)]
struct ClientFrame {
    subscribe: SubscribeTarget,
}

/// Subscription change requested by a client text frame, if any.
fn parse_client_frame(text: &str) -> Option<Subscription> {
    let frame: ClientFrame = serde_json::from_str(text).ok()?;
    match frame.subscribe {
        SubscribeTarget::Ids(ids) => Some(Subscription::Artworks(ids.into_iter().collect())),
        SubscribeTarget::Named(name) if name == "gallery" => Some(Subscription::Gallery),
        SubscribeTarget::Named(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_subscription() {
        assert_eq!(parse_subscription(None).unwrap(), Subscription::Gallery);
        assert_eq!(parse_subscription(Some("  ")).unwrap(), Subscription::Gallery);
        assert_eq!(
            parse_subscription(Some("1, 2,3")).unwrap(),
            Subscription::Artworks(HashSet::from([1, 2, 3]))
        );
        assert!(matches!(
            parse_subscription(Some("1,abc")),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_timing_never_zero() {
        let mut config = ServerConfig::with_base_dir("unused");
        config.heartbeat_secs = 0;
        config.idle_timeout_secs = 0;
        let timing = SocketTiming::from_config(&config);
        assert_eq!(timing.heartbeat, Duration::from_secs(1));
        assert_eq!(timing.idle_timeout, Duration::from_secs(1));

        config.heartbeat_secs = 30;
        config.idle_timeout_secs = 300;
        let timing = SocketTiming::from_config(&config);
        assert_eq!(timing.heartbeat, Duration::from_secs(30));
        assert_eq!(timing.idle_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_parse_client_frame() {
        assert_eq!(
            parse_client_frame(r#"{"subscribe":[4,5]}"#),
            Some(Subscription::Artworks(HashSet::from([4, 5])))
        );
        assert_eq!(
            parse_client_frame(r#"{"subscribe":"gallery"}"#),
            Some(Subscription::Gallery)
        );
        assert_eq!(parse_client_frame(r#"{"subscribe":"nope"}"#), None);
        assert_eq!(parse_client_frame("hello"), None);
    }
}
