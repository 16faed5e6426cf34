use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use parley_store::Database;

use crate::broadcast::Broadcaster;
use crate::client::{self, ClientRegistry};
use crate::routes;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    pub max_send_queue: usize,
    pub cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            bind: "0.0.0.0".to_string(),
            max_send_queue: 256,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub registry: Arc<ClientRegistry>,
    pub broadcaster: Arc<Broadcaster>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/ws", get(ws_handler))
        .route(
            "/api/v1/messages",
            get(routes::list_messages).post(routes::create_message),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps the
/// background tasks alive and exposes the bound port.
pub async fn start(config: ServerConfig, db: Database) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(ClientRegistry::new(config.max_send_queue));
    let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry)));

    let cleanup = client::start_cleanup_task(Arc::clone(&registry), config.cleanup_interval);

    let state = AppState {
        db,
        registry: Arc::clone(&registry),
        broadcaster,
    };

    let router = build_router(state);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Chat server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        registry,
        _server: server,
        _cleanup: cleanup,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    pub registry: Arc<ClientRegistry>,
    _server: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one upgraded connection for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client_id, rx) = state.registry.register();
    tracing::info!(client_id = %client_id, "Client connected");

    client::handle_ws_connection(socket, client_id, rx, state.registry, state.broadcaster).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, Stream, StreamExt};
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    async fn start_test_server() -> ServerHandle {
        let db = Database::in_memory().unwrap();
        let config = ServerConfig {
            port: 0, // random port
            bind: "127.0.0.1".to_string(),
            ..Default::default()
        };
        start(config, db).await.unwrap()
    }

    async fn wait_for_clients(handle: &ServerHandle, n: usize) {
        for _ in 0..200 {
            if handle.registry.count() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for {n} clients, have {}",
            handle.registry.count()
        );
    }

    async fn recv_text(
        ws: &mut (impl Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
    ) -> String {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        msg.into_text().expect("expected a text frame")
    }

    #[tokio::test]
    async fn serves_the_service_banner() {
        let handle = start_test_server().await;

        let url = format!("http://127.0.0.1:{}/", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Chat Service is running");
    }

    #[tokio::test]
    async fn rest_append_then_list_round_trip() {
        let handle = start_test_server().await;
        let base = format!("http://127.0.0.1:{}/api/v1/messages", handle.port);
        let http = reqwest::Client::new();

        let resp = http
            .post(&base)
            .json(&serde_json::json!({ "sender": "bob", "content": "yo" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let created: serde_json::Value = resp.json().await.unwrap();
        assert!(created["id"].as_str().unwrap().starts_with("msg_"));
        assert!(!created["created_at"].as_str().unwrap().is_empty());

        let resp = reqwest::get(format!("{base}?skip=0&limit=10")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let rows: Vec<serde_json::Value> = resp.json().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["sender"], "bob");
        assert_eq!(rows[0]["content"], "yo");
        assert_eq!(rows[0]["id"], created["id"]);
    }

    #[tokio::test]
    async fn rest_list_uses_default_pagination() {
        let handle = start_test_server().await;
        let base = format!("http://127.0.0.1:{}/api/v1/messages", handle.port);
        let http = reqwest::Client::new();

        for i in 0..3 {
            http.post(&base)
                .json(&serde_json::json!({ "sender": "seq", "content": format!("m{i}") }))
                .send()
                .await
                .unwrap();
        }

        // No query params: skip=0, limit=100
        let rows: Vec<serde_json::Value> =
            reqwest::get(&base).await.unwrap().json().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["content"], "m0");
        assert_eq!(rows[2]["content"], "m2");
    }

    #[tokio::test]
    async fn ws_broadcast_reaches_all_connections_including_sender() {
        let handle = start_test_server().await;
        let url = format!("ws://127.0.0.1:{}/ws", handle.port);

        let (mut a, _) = connect_async(url.as_str()).await.unwrap();
        let (mut b, _) = connect_async(url.as_str()).await.unwrap();
        let (mut c, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_clients(&handle, 3).await;

        a.send(Message::Text(
            r#"{"sender":"alice","content":"hi"}"#.into(),
        ))
        .await
        .unwrap();

        let expected = r#"{"sender":"alice","content":"hi","timestamp":""}"#;
        assert_eq!(recv_text(&mut a).await, expected);
        assert_eq!(recv_text(&mut b).await, expected);
        assert_eq!(recv_text(&mut c).await, expected);
    }

    #[tokio::test]
    async fn ws_disconnect_removes_only_that_connection() {
        let handle = start_test_server().await;
        let url = format!("ws://127.0.0.1:{}/ws", handle.port);

        let (mut a, _) = connect_async(url.as_str()).await.unwrap();
        let (mut b, _) = connect_async(url.as_str()).await.unwrap();
        let (mut c, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_clients(&handle, 3).await;

        b.close(None).await.unwrap();
        wait_for_clients(&handle, 2).await;

        a.send(Message::Text(r#"{"content":"still here"}"#.into()))
            .await
            .unwrap();

        let expected = r#"{"sender":"Anonymous","content":"still here","timestamp":""}"#;
        assert_eq!(recv_text(&mut a).await, expected);
        assert_eq!(recv_text(&mut c).await, expected);
        assert_eq!(handle.registry.count(), 2);
    }

    #[tokio::test]
    async fn ws_malformed_frame_closes_only_the_offender() {
        let handle = start_test_server().await;
        let url = format!("ws://127.0.0.1:{}/ws", handle.port);

        let (mut a, _) = connect_async(url.as_str()).await.unwrap();
        let (mut b, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_clients(&handle, 2).await;

        a.send(Message::Text("not json".into())).await.unwrap();
        wait_for_clients(&handle, 1).await;

        b.send(Message::Text(r#"{"sender":"bee","content":"ok"}"#.into()))
            .await
            .unwrap();
        assert_eq!(
            recv_text(&mut b).await,
            r#"{"sender":"bee","content":"ok","timestamp":""}"#
        );
    }

    #[tokio::test]
    async fn ws_messages_are_never_persisted() {
        let db = Database::in_memory().unwrap();
        let config = ServerConfig {
            port: 0,
            bind: "127.0.0.1".to_string(),
            ..Default::default()
        };
        let handle = start(config, db.clone()).await.unwrap();
        let url = format!("ws://127.0.0.1:{}/ws", handle.port);

        let (mut a, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_clients(&handle, 1).await;

        a.send(Message::Text(r#"{"sender":"alice","content":"hi"}"#.into()))
            .await
            .unwrap();
        let _ = recv_text(&mut a).await;

        let repo = parley_store::messages::MessageRepo::new(db);
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn build_router_creates_routes() {
        let db = Database::in_memory().unwrap();
        let registry = Arc::new(ClientRegistry::new(32));
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry)));

        let state = AppState {
            db,
            registry,
            broadcaster,
        };

        let _router = build_router(state);
    }
}
