// Integration tests for `EventStreamManager` against a wiremock SSE endpoint.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homeconnect_api::transport::normalize_base_url;
use homeconnect_api::{
    CredentialStore, Credentials, Error, Event, EventListener, EventStreamManager, OAuthConfig,
    ReconnectConfig, StreamConfig, StreamState, TokenManager, TransportConfig,
};

const HA_ID: &str = "BOSCH-HCS06COM1-D70390681C2C";
const EVENTS_PATH: &str = "/api/homeappliances/BOSCH-HCS06COM1-D70390681C2C/events";
const FRAME: &str = "event: STATUS\ndata: {\"items\":[{\"key\":\"e1\",\"value\":1},{\"key\":\"e2\",\"value\":2}]}\nid: BOSCH-HCS06COM1-D70390681C2C\n\n";

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Event(String),
    Reconnect,
}

struct Recorder(mpsc::UnboundedSender<Seen>);

impl EventListener for Recorder {
    fn on_event(&self, event: &Event) {
        let _ = self.0.send(Seen::Event(event.key.clone()));
    }

    fn on_reconnect(&self) {
        let _ = self.0.send(Seen::Reconnect);
    }
}

fn recorder() -> (Arc<Recorder>, mpsc::UnboundedReceiver<Seen>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder(tx)), rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for listener callback")
        .expect("listener channel closed")
}

async fn take(rx: &mut mpsc::UnboundedReceiver<Seen>, n: usize) -> Vec<Seen> {
    let mut seen = Vec::with_capacity(n);
    for _ in 0..n {
        seen.push(next(rx).await);
    }
    seen
}

fn stream_config(max_retries: Option<u32>) -> StreamConfig {
    StreamConfig {
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            max_retries,
        },
        idle_timeout: Duration::from_secs(5),
    }
}

fn build(server: &MockServer, refresh_token: &str, config: StreamConfig) -> EventStreamManager {
    let base = normalize_base_url(&server.uri()).unwrap();
    build_with_stream_base(server, refresh_token, base, config)
}

/// Tokens come from `server`, event streams from `stream_base`.
fn build_with_stream_base(
    server: &MockServer,
    refresh_token: &str,
    stream_base: Url,
    config: StreamConfig,
) -> EventStreamManager {
    let base = normalize_base_url(&server.uri()).unwrap();
    let transport = TransportConfig::default();
    let store = Arc::new(CredentialStore::new(Credentials {
        client_id: "client-id".into(),
        client_secret: SecretString::from("client-secret".to_string()),
        refresh_token: Some(SecretString::from(refresh_token.to_string())),
        simulation: false,
    }));
    let tokens = Arc::new(TokenManager::new(
        store,
        transport.build_oauth_client().unwrap(),
        base,
        OAuthConfig::default(),
    ));
    EventStreamManager::new(
        transport.build_stream_client().unwrap(),
        stream_base,
        tokens,
        config,
    )
}

async fn mount_tokens(server: &MockServer) {
    mount_tokens_with_refresh_delay(server, Duration::ZERO).await;
}

/// First grant answers `t1` at once; every later one answers `t2` after
/// `refresh_delay`.
async fn mount_tokens_with_refresh_delay(server: &MockServer, refresh_delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/security/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t1", "expires_in": 86400
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/security/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t2", "expires_in": 86400
        })).set_delay(refresh_delay))
        .with_priority(2)
        .mount(server)
        .await;
}

fn sse_response(delay: Duration) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(FRAME, "text/event-stream")
        .set_delay(delay)
}

async fn wait_closed(state: &mut watch::Receiver<StreamState>) {
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == StreamState::Closed),
    )
    .await
    .expect("stream did not close")
    .unwrap();
}

fn event(key: &str) -> Seen {
    Seen::Event(key.into())
}

/// An SSE endpoint that answers every request with stream headers and then
/// never sends a byte. Each accepted connection is reported on the channel.
async fn silent_sse_server() -> (Url, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = normalize_base_url(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let _ = tx.send(());
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0_u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let headers = "HTTP/1.1 200 OK\r\n\
                               content-type: text/event-stream\r\n\
                               transfer-encoding: chunked\r\n\r\n";
                if socket.write_all(headers.as_bytes()).await.is_err() {
                    return;
                }
                // Hold the connection open until the client drops it.
                while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
            });
        }
    });

    (base, rx)
}

// ── Fan-out and ordering ─────────────────────────────────────────────

#[tokio::test]
async fn test_one_connection_fans_out_to_all_listeners() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("accept", "text/event-stream"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(sse_response(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let manager = build(&server, "rt", stream_config(None));
    let (a, mut rx_a) = recorder();
    let (b, mut rx_b) = recorder();

    manager.subscribe(HA_ID, a).await.unwrap();
    manager.subscribe(HA_ID, b).await.unwrap();
    assert_eq!(manager.listener_count(HA_ID), 2);

    // The mock closes the body after one frame, so each connection ends
    // with a reconnect notification before the next batch.
    let expected = vec![event("e1"), event("e2"), Seen::Reconnect, event("e1")];
    assert_eq!(take(&mut rx_a, 4).await, expected);
    assert_eq!(take(&mut rx_b, 4).await, expected);

    manager.dispose_all().await;

    // Two listeners, two connection cycles, still one request per cycle.
    let stream_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == EVENTS_PATH)
        .count();
    assert!((2..=3).contains(&stream_requests), "got {stream_requests}");
}

#[tokio::test]
async fn test_unsubscribe_is_ref_counted() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(sse_response(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let manager = build(&server, "rt", stream_config(None));
    let (a, _rx_a) = recorder();
    let (b, mut rx_b) = recorder();

    let id_a = manager.subscribe(HA_ID, a).await.unwrap();
    let id_b = manager.subscribe(HA_ID, b).await.unwrap();
    assert_ne!(id_a, id_b);

    assert!(manager.unsubscribe(id_a));
    assert!(!manager.unsubscribe(id_a), "second unsubscribe is a no-op");
    assert!(manager.is_subscribed(HA_ID));
    assert_eq!(manager.listener_count(HA_ID), 1);

    // Remaining listener still receives events.
    assert_eq!(next(&mut rx_b).await, event("e1"));

    let mut state = manager.state(HA_ID).unwrap();
    assert!(manager.unsubscribe(id_b));
    assert!(!manager.is_subscribed(HA_ID));
    assert!(manager.subscribed_appliances().is_empty());

    wait_closed(&mut state).await;
}

// ── Reconnection ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_stream_reauthorizes_and_reconnects() {
    let server = MockServer::start().await;
    mount_tokens_with_refresh_delay(&server, Duration::from_millis(300)).await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("authorization", "Bearer t2"))
        .respond_with(sse_response(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let manager = build(&server, "rt", stream_config(None));
    let (a, mut rx) = recorder();
    manager.subscribe(HA_ID, a).await.unwrap();
    let mut state = manager.state(HA_ID).unwrap();

    // The second grant is slow, so the stream sits in this state meanwhile.
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == StreamState::Reauthorizing),
    )
    .await
    .expect("stream never reauthorized")
    .unwrap();

    assert_eq!(
        take(&mut rx, 3).await,
        vec![Seen::Reconnect, event("e1"), event("e2")]
    );

    manager.dispose_all().await;
}

#[tokio::test]
async fn test_silent_stream_times_out_and_reconnects() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    let (stream_base, mut connections) = silent_sse_server().await;

    let config = StreamConfig {
        idle_timeout: Duration::from_millis(100),
        ..stream_config(None)
    };
    let manager = build_with_stream_base(&server, "rt", stream_base, config);
    let (a, mut rx) = recorder();
    manager.subscribe(HA_ID, a).await.unwrap();

    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(5), connections.recv())
            .await
            .expect("stream did not connect")
            .unwrap();
    }
    assert_eq!(next(&mut rx).await, Seen::Reconnect);
    assert!(manager.is_subscribed(HA_ID), "idle drop is retried, not abandoned");

    manager.dispose_all().await;
}

#[tokio::test]
async fn test_server_error_backs_off_and_recovers() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(sse_response(Duration::ZERO))
        .with_priority(2)
        .mount(&server)
        .await;

    let manager = build(&server, "rt", stream_config(None));
    let (a, mut rx) = recorder();
    manager.subscribe(HA_ID, a).await.unwrap();

    assert_eq!(
        take(&mut rx, 3).await,
        vec![Seen::Reconnect, event("e1"), event("e2")]
    );

    manager.dispose_all().await;
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let manager = build(&server, "rt", stream_config(Some(1)));
    let (a, mut rx) = recorder();
    manager.subscribe(HA_ID, a).await.unwrap();
    let mut state = manager.state(HA_ID).unwrap();

    wait_closed(&mut state).await;
    assert!(!manager.is_subscribed(HA_ID));
    assert_eq!(next(&mut rx).await, Seen::Reconnect);
}

// ── Disposal and configuration ───────────────────────────────────────

#[tokio::test]
async fn test_dispose_all_closes_every_stream() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(sse_response(Duration::from_secs(2)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/homeappliances/OTHER-1/events"))
        .respond_with(sse_response(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let manager = build(&server, "rt", stream_config(None));
    let (a, mut rx_a) = recorder();
    let (b, _rx_b) = recorder();
    manager.subscribe(HA_ID, a).await.unwrap();
    manager.subscribe("OTHER-1", b).await.unwrap();

    let mut states = vec![
        manager.state(HA_ID).unwrap(),
        manager.state("OTHER-1").unwrap(),
    ];
    assert_eq!(manager.subscribed_appliances().len(), 2);

    manager.dispose_all().await;

    for state in &mut states {
        assert_eq!(*state.borrow_and_update(), StreamState::Closed);
    }
    assert!(manager.subscribed_appliances().is_empty());
    assert!(rx_a.try_recv().is_err(), "no events after disposal");

    // Idempotent.
    manager.dispose_all().await;
}

#[tokio::test]
async fn test_subscribe_after_dispose_reopens() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(sse_response(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let manager = build(&server, "rt", stream_config(None));
    let (a, _rx_a) = recorder();
    manager.subscribe(HA_ID, a).await.unwrap();
    manager.dispose_all().await;

    let (b, mut rx_b) = recorder();
    manager.subscribe(HA_ID, b).await.unwrap();
    assert_eq!(next(&mut rx_b).await, event("e1"));

    manager.dispose_all().await;
}

#[tokio::test]
async fn test_dispose_during_subscribe_registers_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/security/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "t1", "expires_in": 86400 }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(sse_response(Duration::ZERO))
        .expect(0)
        .mount(&server)
        .await;

    let manager = build(&server, "rt", stream_config(None));
    let (a, mut rx) = recorder();
    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.subscribe(HA_ID, a).await }
    });

    // Let the subscribe reach the token endpoint, then shut down under it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.dispose_all().await;

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Disposed), "got: {err:?}");
    assert!(!manager.is_subscribed(HA_ID));
    assert!(manager.state(HA_ID).is_none());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err(), "no callbacks after disposal");
}

#[tokio::test]
async fn test_subscribe_without_credentials_fails() {
    let server = MockServer::start().await;

    let manager = build(&server, "   ", stream_config(None));
    let (a, _rx) = recorder();
    let err = manager.subscribe(HA_ID, a).await.unwrap_err();

    assert!(err.is_configuration());
    assert!(!manager.is_subscribed(HA_ID));
    assert!(server.received_requests().await.unwrap().is_empty());
}
