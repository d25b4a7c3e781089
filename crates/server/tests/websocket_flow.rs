use futures::{SinkExt, StreamExt};
use gallery_server::core::{AppState, ServerConfig};
use gallery_server::gallery::NewArtwork;
use gallery_server::realtime::LikeEvent;
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct LiveServer {
    addr: SocketAddr,
    state: AppState,
    _dir: TempDir,
}

async fn serve(tweak: impl FnOnce(&mut ServerConfig)) -> LiveServer {
    let dir = tempdir().unwrap();
    let mut config = ServerConfig::with_base_dir(dir.path());
    config.bcrypt_cost = 4;
    tweak(&mut config);

    let state = AppState::init(config).await.unwrap();
    let app = gallery_server::app(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    LiveServer {
        addr,
        state,
        _dir: dir,
    }
}

async fn artwork(state: &AppState, title: &str) -> i64 {
    let owner = state
        .auth
        .signup(&format!("{}@example.com", title), title, "password123")
        .await
        .unwrap();
    state
        .artworks
        .create(
            owner.id,
            NewArtwork {
                title: title.to_string(),
                description: None,
                image_hash: "a".repeat(64),
            },
        )
        .await
        .unwrap()
        .id
}

async fn liker(state: &AppState, name: &str) -> i64 {
    state
        .auth
        .signup(&format!("{}@example.com", name), name, "password123")
        .await
        .unwrap()
        .id
}

/// Next like event, skipping control frames.
async fn next_event(client: &mut Client) -> LikeEvent {
    loop {
        let msg = timeout(WAIT, client.next())
            .await
            .expect("no frame in time")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn wait_for_count(state: &AppState, expected: usize) {
    timeout(WAIT, async {
        while state.hub.active_count() != expected {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("active count never settled");
}

fn rejected_status(err: tungstenite::Error) -> u16 {
    match err {
        tungstenite::Error::Http(resp) => resp.status().as_u16(),
        other => panic!("expected an HTTP rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_capacity_delivery_resubscribe_and_close() {
    let server = serve(|c| c.max_connections = Some(1)).await;
    let artwork_id = artwork(&server.state, "harbor").await;
    let fan = liker(&server.state, "fan").await;

    let url = format!("ws://{}/ws?artworks={}", server.addr, artwork_id);
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();
    assert_eq!(server.state.hub.active_count(), 1);

    // Full hub refuses before upgrading
    let err = connect_async(url.as_str()).await.unwrap_err();
    assert_eq!(rejected_status(err), 503);
    assert_eq!(server.state.hub.active_count(), 1);

    server.state.hub.publish_like(artwork_id, fan).await.unwrap();
    assert_eq!(
        next_event(&mut client).await,
        LikeEvent {
            artwork_id,
            like_count: 1
        }
    );

    // Move the client onto another artwork
    let elsewhere = artwork_id + 1000;
    client
        .send(Message::text(format!(r#"{{"subscribe":[{}]}}"#, elsewhere)))
        .await
        .unwrap();
    let marker = |like_count| LikeEvent {
        artwork_id: elsewhere,
        like_count,
    };
    timeout(WAIT, async {
        while server.state.hub.broadcast(&marker(0)).delivered == 0 {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("subscription change never applied");

    let other_fan = liker(&server.state, "other").await;
    server
        .state
        .hub
        .publish_like(artwork_id, other_fan)
        .await
        .unwrap();
    server.state.hub.broadcast(&marker(42));

    loop {
        let event = next_event(&mut client).await;
        assert_eq!(event.artwork_id, elsewhere);
        if event.like_count == 42 {
            break;
        }
    }

    client.close(None).await.unwrap();
    wait_for_count(&server.state, 0).await;

    // The freed slot is usable again
    let (_again, _) = connect_async(url.as_str()).await.unwrap();
    assert_eq!(server.state.hub.active_count(), 1);
}

#[tokio::test]
async fn test_gallery_subscription_by_default() {
    let server = serve(|_| {}).await;
    let first = artwork(&server.state, "meadow").await;
    let second = artwork(&server.state, "canyon").await;
    let fan = liker(&server.state, "fan").await;

    let url = format!("ws://{}/ws", server.addr);
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    server.state.hub.publish_like(first, fan).await.unwrap();
    server.state.hub.publish_like(second, fan).await.unwrap();

    assert_eq!(next_event(&mut client).await.artwork_id, first);
    assert_eq!(next_event(&mut client).await.artwork_id, second);
}

#[tokio::test]
async fn test_malformed_artwork_list_rejected() {
    let server = serve(|_| {}).await;
    let url = format!("ws://{}/ws?artworks=1,x", server.addr);

    let err = connect_async(url.as_str()).await.unwrap_err();
    assert_eq!(rejected_status(err), 400);
    assert_eq!(server.state.hub.active_count(), 0);
}

#[tokio::test]
async fn test_idle_socket_closed() {
    // A zero heartbeat is clamped rather than stalling the session
    let server = serve(|c| {
        c.heartbeat_secs = 0;
        c.idle_timeout_secs = 1;
    })
    .await;

    let url = format!("ws://{}/ws", server.addr);
    let (_client, _) = connect_async(url.as_str()).await.unwrap();
    assert_eq!(server.state.hub.active_count(), 1);

    // The client never reads, so no pong goes back
    wait_for_count(&server.state, 0).await;
}
