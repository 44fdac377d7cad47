//! Live home-summary updates over a reconnecting WebSocket.
//!
//! The connection is best-effort: unexpected closes schedule a reconnect
//! after a fixed delay, malformed messages are dropped without disturbing
//! the stream, and an intentional close cancels any pending reconnect so
//! nothing fires after the consumer has gone away.

use color_eyre::{eyre::eyre, Result};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::types::HomeSummary;
use crate::config::{Config, NetworkConfig};

/// Events delivered to the subscriber.
#[derive(Debug)]
pub enum LiveEvent {
  /// The connection is open; initial loading can stop
  Connected,
  /// A pushed home summary
  Update(HomeSummary),
}

/// Handle to a live home-summary subscription.
///
/// Dropping the handle tears the connection down as surely as `close()`.
pub struct LiveChannel {
  rx: mpsc::UnboundedReceiver<LiveEvent>,
  shutdown: watch::Sender<bool>,
  task: tokio::task::JoinHandle<()>,
}

impl LiveChannel {
  /// Subscribe to live updates for one member.
  pub fn subscribe(config: &Config, user_id: &str) -> Result<Self> {
    let url = channel_url(&config.api.ws_base_url, user_id)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(run(url, config.network, tx, shutdown_rx));

    Ok(Self {
      rx,
      shutdown: shutdown_tx,
      task,
    })
  }

  /// Receive the next event.
  pub async fn next(&mut self) -> Option<LiveEvent> {
    self.rx.recv().await
  }

  /// Stop the channel. Idempotent; cancels any pending reconnect.
  pub fn close(&self) {
    let _ = self.shutdown.send(true);
  }

  /// Stop the channel and wait for the background task to finish.
  pub async fn closed(self) {
    self.close();
    let _ = self.task.await;
  }
}

fn channel_url(ws_base_url: &str, user_id: &str) -> Result<Url> {
  Url::parse(&format!("{}/home/{}", ws_base_url, user_id))
    .map_err(|e| eyre!("Invalid live channel url: {}", e))
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection loop: Connecting → Open → (closed, reconnect scheduled) → …
/// Terminal only when shutdown is signalled or the consumer is gone.
async fn run(
  url: Url,
  network: NetworkConfig,
  tx: mpsc::UnboundedSender<LiveEvent>,
  mut shutdown: watch::Receiver<bool>,
) {
  let mut failures: u32 = 0;

  loop {
    if *shutdown.borrow() {
      break;
    }

    let connected = tokio::select! {
      result = connect_async(url.as_str()) => result,
      _ = shutdown.changed() => break,
    };

    match connected {
      Ok((stream, _response)) => {
        info!(url = %url, "Live channel connected");
        failures = 0;

        if tx.send(LiveEvent::Connected).is_err() {
          break;
        }

        match pump(stream, &tx, &mut shutdown).await {
          PumpExit::Teardown => break,
          PumpExit::ConnectionLost => {}
        }
      }
      Err(e) => {
        debug!(url = %url, error = %e, "Live connection attempt failed");
      }
    }

    // Unexpected close or failed connect: schedule a reconnect, unless
    // shutdown arrives first
    failures += 1;
    let delay = network
      .backoff
      .delay_for_attempt(network.reconnect_delay(), failures);
    debug!(delay_ms = delay.as_millis() as u64, "Live reconnect scheduled");

    tokio::select! {
      _ = tokio::time::sleep(delay) => {}
      _ = shutdown.changed() => break,
    }
  }
}

enum PumpExit {
  /// Intentional close or consumer gone; do not reconnect
  Teardown,
  /// Server dropped us; reconnect
  ConnectionLost,
}

async fn pump(
  mut stream: WsStream,
  tx: &mpsc::UnboundedSender<LiveEvent>,
  shutdown: &mut watch::Receiver<bool>,
) -> PumpExit {
  loop {
    tokio::select! {
      message = stream.next() => match message {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<HomeSummary>(&text) {
          Ok(update) => {
            if tx.send(LiveEvent::Update(update)).is_err() {
              return PumpExit::Teardown;
            }
          }
          Err(e) => {
            // Bad frame: log and drop, the connection stays open
            warn!(error = %e, "Ignoring malformed live message");
          }
        },
        Some(Ok(Message::Close(_))) | None => {
          debug!("Live connection closed by server");
          return PumpExit::ConnectionLost;
        }
        Some(Ok(_)) => {} // binary/ping/pong: not ours
        Some(Err(e)) => {
          debug!(error = %e, "Live connection error");
          return PumpExit::ConnectionLost;
        }
      },
      _ = shutdown.changed() => {
        let _ = stream.close(None).await;
        return PumpExit::Teardown;
      }
    }
  }
}
