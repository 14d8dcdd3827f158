//! Delivery of signed events to a single relay over a WebSocket.

use std::borrow::Cow;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::nostr_manager::{NostrManagerError, Result, SignedEvent};

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a publish attempt settled when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayReply {
    /// The first message the relay sent back, usually an `OK` frame.
    Message(String),
    /// The relay closed the connection before saying anything.
    Closed,
}

#[derive(Debug, Clone)]
pub struct RelayPublisher {
    relay_url: String,
    timeout: Duration,
}

impl RelayPublisher {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            relay_url: relay_url.into(),
            timeout,
        }
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Opens a fresh connection, sends `["EVENT", event]` and waits for the
    /// first of: a reply, a close, a transport error, or the timeout.
    ///
    /// The timeout runs from the start of the call and covers the handshake.
    /// There are no retries.
    pub async fn publish(&self, event: &SignedEvent) -> Result<RelayReply> {
        let frame = event.to_relay_frame()?;
        let deadline = deadline_after(self.timeout);

        let (mut socket, _) = timeout_at(deadline, connect_async(self.relay_url.as_str()))
            .await
            .map_err(|_| NostrManagerError::Timeout(self.timeout))??;

        tracing::debug!(
            target: "tg2nostr::nostr_manager::publisher::publish",
            "Connected to {}, sending event {}",
            self.relay_url,
            event.id
        );

        match timeout_at(deadline, socket.send(Message::Text(frame))).await {
            Ok(sent) => sent?,
            Err(_) => {
                close_quietly(&mut socket, "timeout").await;
                return Err(NostrManagerError::Timeout(self.timeout));
            }
        }

        let expired = sleep_until(deadline);
        tokio::pin!(expired);

        loop {
            tokio::select! {
                _ = &mut expired => {
                    tracing::warn!(
                        target: "tg2nostr::nostr_manager::publisher::publish",
                        "Relay {} did not answer event {} within {:?}",
                        self.relay_url,
                        event.id,
                        self.timeout
                    );
                    close_quietly(&mut socket, "timeout").await;
                    return Err(NostrManagerError::Timeout(self.timeout));
                }
                incoming = socket.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        close_quietly(&mut socket, "ok").await;
                        return Ok(RelayReply::Message(text));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        close_quietly(&mut socket, "ok").await;
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        return Ok(RelayReply::Message(text));
                    }
                    Some(Ok(Message::Close(_))) => {
                        self.log_closed();
                        // Flushes the queued close reply.
                        close_quietly(&mut socket, "ok").await;
                        return Ok(RelayReply::Closed);
                    }
                    None => {
                        self.log_closed();
                        return Ok(RelayReply::Closed);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }

    fn log_closed(&self) {
        tracing::debug!(
            target: "tg2nostr::nostr_manager::publisher::publish",
            "Relay {} closed the connection without a reply",
            self.relay_url
        );
    }
}

/// `now + timeout`, saturating to a distant deadline instead of overflowing.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

async fn close_quietly(socket: &mut RelaySocket, reason: &'static str) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: Cow::Borrowed(reason),
    };
    if let Err(e) = socket.close(Some(frame)).await {
        tracing::debug!(
            target: "tg2nostr::nostr_manager::publisher::close_quietly",
            "Error closing relay connection: {}",
            e
        );
    }
}
