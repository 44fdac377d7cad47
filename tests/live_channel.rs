//! Reconnect behavior of the live home-summary channel against an
//! in-process WebSocket server.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::routing::get;
use axum::Router;
use sava_client::{Config, LiveChannel, LiveEvent};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;

fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .try_init();
}

async fn serve(router: Router) -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, router).await.unwrap();
  });
  addr
}

fn test_config(addr: SocketAddr) -> Config {
  let mut config = Config::default();
  config.api.base_url = format!("http://{}/api", addr);
  config.api.server_base_url = format!("http://{}", addr);
  config.api.ws_base_url = format!("ws://{}/api", addr);
  config.network.reconnect_delay_ms = 100;
  config
}

fn summary_text(total: f64) -> String {
  json!({ "total_saving": total, "total_loan": 0.0 }).to_string()
}

/// Route that pushes one summary per connection, then drops the socket.
fn drop_after_one(connections: Arc<AtomicUsize>) -> Router {
  Router::new().route(
    "/api/home/:user_id",
    get(move |ws: WebSocketUpgrade| {
      let connections = connections.clone();
      async move {
        ws.on_upgrade(move |mut socket: WebSocket| async move {
          let n = connections.fetch_add(1, Ordering::SeqCst) + 1;
          let _ = socket
            .send(Message::Text(summary_text(n as f64 * 100.0)))
            .await;
          // Dropping the socket closes the connection from the server side
        })
      }
    }),
  )
}

async fn expect_connected(channel: &mut LiveChannel) {
  loop {
    match timeout(Duration::from_secs(5), channel.next()).await {
      Ok(Some(LiveEvent::Connected)) => return,
      Ok(Some(_)) => continue,
      other => panic!("expected Connected, got {:?}", other.map(|o| o.is_some())),
    }
  }
}

async fn expect_update(channel: &mut LiveChannel) -> f64 {
  loop {
    match timeout(Duration::from_secs(5), channel.next()).await {
      Ok(Some(LiveEvent::Update(summary))) => return summary.total_saving,
      Ok(Some(LiveEvent::Connected)) => continue,
      other => panic!("expected Update, got {:?}", other.map(|o| o.is_some())),
    }
  }
}

#[tokio::test]
async fn unexpected_close_triggers_a_reconnect() {
  init_tracing();
  let connections = Arc::new(AtomicUsize::new(0));
  let addr = serve(drop_after_one(connections.clone())).await;

  let mut channel = LiveChannel::subscribe(&test_config(addr), "u1").unwrap();

  expect_connected(&mut channel).await;
  assert_eq!(expect_update(&mut channel).await, 100.0);

  // The server dropped us; a second connection arrives after the delay
  assert_eq!(expect_update(&mut channel).await, 200.0);
  assert!(connections.load(Ordering::SeqCst) >= 2);

  channel.closed().await;
}

#[tokio::test]
async fn intentional_close_suppresses_reconnect() {
  init_tracing();
  let connections = Arc::new(AtomicUsize::new(0));
  let addr = serve(drop_after_one(connections.clone())).await;
  let mut config = test_config(addr);
  // Wide reconnect window so close() always lands before the timer fires
  config.network.reconnect_delay_ms = 500;

  let mut channel = LiveChannel::subscribe(&config, "u1").unwrap();
  expect_connected(&mut channel).await;
  let _ = expect_update(&mut channel).await;

  channel.closed().await;
  let settled = connections.load(Ordering::SeqCst);

  // Well past several reconnect windows, nothing new connects
  tokio::time::sleep(Duration::from_millis(1200)).await;
  assert_eq!(connections.load(Ordering::SeqCst), settled);
}

#[tokio::test]
async fn malformed_message_is_dropped_without_losing_the_connection() {
  init_tracing();
  let connections = Arc::new(AtomicUsize::new(0));
  let router = Router::new().route(
    "/api/home/:user_id",
    get({
      let connections = connections.clone();
      move |ws: WebSocketUpgrade| {
        let connections = connections.clone();
        async move {
          ws.on_upgrade(move |mut socket: WebSocket| async move {
            connections.fetch_add(1, Ordering::SeqCst);
            let _ = socket.send(Message::Text("not json {".to_string())).await;
            let _ = socket.send(Message::Text(summary_text(777.0))).await;
            // Keep the connection open until the client goes away
            while socket.recv().await.is_some() {}
          })
        }
      }
    }),
  );
  let addr = serve(router).await;

  let mut channel = LiveChannel::subscribe(&test_config(addr), "u1").unwrap();
  expect_connected(&mut channel).await;

  // The bad frame is skipped; the next good frame still arrives on the
  // same connection
  assert_eq!(expect_update(&mut channel).await, 777.0);
  assert_eq!(connections.load(Ordering::SeqCst), 1);

  channel.closed().await;
}

#[tokio::test]
async fn close_is_idempotent() {
  init_tracing();
  let connections = Arc::new(AtomicUsize::new(0));
  let addr = serve(drop_after_one(connections)).await;

  let mut channel = LiveChannel::subscribe(&test_config(addr), "u1").unwrap();
  expect_connected(&mut channel).await;

  channel.close();
  channel.close();
  channel.closed().await;
}
