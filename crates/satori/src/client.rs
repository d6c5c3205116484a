//! WebSocket event stream and HTTP message sender for a Satori server.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parley_config::SatoriConfig;
use parley_core::channel::{EventSource, Inbound, MessageSender};
use parley_core::error::ChannelError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::protocol::{self, Signal};

/// A Satori client.
///
/// `start()` spawns a background task that keeps a WebSocket session alive
/// (identify, heartbeat, reconnect) and forwards decoded events.
pub struct SatoriClient {
    config: SatoriConfig,
    http: reqwest::Client,
    /// Last event id seen; sent back on IDENTIFY to resume.
    last_sequence: Arc<AtomicU64>,
    shutdown: Mutex<Option<CancellationToken>>,
}

/// How a WebSocket session ended.
enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

impl SatoriClient {
    pub fn new(config: SatoriConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            config,
            http,
            last_sequence: Arc::new(AtomicU64::new(0)),
            shutdown: Mutex::new(None),
        }
    }

    fn message_create_url(&self) -> String {
        format!(
            "{}/v1/message.create",
            self.config.api_url.trim_end_matches('/')
        )
    }

    async fn run(
        config: SatoriConfig,
        sequence: Arc<AtomicU64>,
        tx: mpsc::Sender<Result<Inbound, ChannelError>>,
        shutdown: CancellationToken,
    ) {
        let reconnect = Duration::from_secs(config.reconnect_secs.max(1));
        loop {
            match Self::session(&config, &sequence, &tx, &shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Disconnected(reason))
                | Err(ChannelError::ConnectionLost(reason)) => {
                    warn!(
                        reason = %reason,
                        "Satori connection lost, reconnecting in {}s",
                        reconnect.as_secs()
                    );
                    if tx.send(Err(ChannelError::ConnectionLost(reason))).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Satori session failed");
                    if tx.send(Err(e)).await.is_err() {
                        break;
                    }
                }
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(reconnect) => {}
            }
        }
        info!("Satori event loop stopped");
    }

    async fn session(
        config: &SatoriConfig,
        sequence: &AtomicU64,
        tx: &mpsc::Sender<Result<Inbound, ChannelError>>,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd, ChannelError> {
        info!(url = %config.ws_url, "Satori: connecting");
        let (ws_stream, _) = tokio_tungstenite::connect_async(config.ws_url.as_str())
            .await
            .map_err(|e| ChannelError::ConnectionLost(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let resume = match sequence.load(Ordering::Relaxed) {
            0 => None,
            sn => Some(sn),
        };
        let identify = protocol::identify_frame(config.token.as_deref(), resume);
        write
            .send(Message::Text(identify.into()))
            .await
            .map_err(|e| ChannelError::ConnectionLost(format!("identify: {e}")))?;
        debug!(resume = ?resume, "Satori: identify sent");

        let mut heartbeat =
            tokio::time::interval(Duration::from_secs(config.heartbeat_secs.max(1)));
        heartbeat.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
                _ = heartbeat.tick() => {
                    if let Err(e) = write.send(Message::Text(protocol::ping_frame().into())).await {
                        return Ok(SessionEnd::Disconnected(format!("heartbeat: {e}")));
                    }
                    trace!("Satori: ping");
                }
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(t))) => t,
                        Some(Ok(Message::Close(_))) | None => {
                            return Ok(SessionEnd::Disconnected("closed by server".into()));
                        }
                        Some(Err(e)) => return Ok(SessionEnd::Disconnected(e.to_string())),
                        _ => continue,
                    };

                    let inbound = match protocol::decode_signal(&text) {
                        Ok(Signal::Event(event)) => {
                            if event.id > 0 {
                                sequence.fetch_max(event.id, Ordering::Relaxed);
                            }
                            Inbound::Event(event)
                        }
                        Ok(Signal::Ready(logins)) => Inbound::Ready(logins),
                        Ok(Signal::Pong) => {
                            trace!("Satori: pong");
                            continue;
                        }
                        Ok(Signal::Other(op)) => {
                            debug!(op, "Satori: ignoring frame");
                            continue;
                        }
                        Err(e) => {
                            warn!(error = %e, "Satori: undecodable frame");
                            continue;
                        }
                    };

                    if tx.send(Ok(inbound)).await.is_err() {
                        return Ok(SessionEnd::Shutdown);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl EventSource for SatoriClient {
    fn name(&self) -> &str {
        "satori"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<Inbound, ChannelError>>, ChannelError> {
        let mut guard = self.shutdown.lock().await;
        if let Some(previous) = guard.take() {
            previous.cancel();
        }

        let (tx, rx) = mpsc::channel(64);
        let token = CancellationToken::new();
        *guard = Some(token.clone());

        tokio::spawn(Self::run(
            self.config.clone(),
            Arc::clone(&self.last_sequence),
            tx,
            token,
        ));
        Ok(rx)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Satori client stopping");
        if let Some(token) = self.shutdown.lock().await.take() {
            token.cancel();
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for SatoriClient {
    async fn send_message(
        &self,
        platform: &str,
        self_id: &str,
        channel_id: &str,
        content: &str,
    ) -> Result<(), ChannelError> {
        let mut request = self
            .http
            .post(self.message_create_url())
            .header("Content-Type", "application/json")
            .header("X-Platform", platform)
            .header("X-Self-ID", self_id)
            .json(&serde_json::json!({
                "channel_id": channel_id,
                "content": content,
            }));
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: channel_id.into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::DeliveryFailed {
                channel: channel_id.into(),
                reason: format!("HTTP {}: {body}", status.as_u16()),
            });
        }

        debug!(
            channel_id = %channel_id,
            platform = %platform,
            content_len = content.len(),
            "Satori message sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SatoriConfig {
        SatoriConfig {
            ws_url: "ws://127.0.0.1:9/v1/events".into(),
            api_url: "http://127.0.0.1:9/".into(),
            token: None,
            heartbeat_secs: 10,
            reconnect_secs: 1,
        }
    }

    #[test]
    fn message_create_url_strips_trailing_slash() {
        let client = SatoriClient::new(test_config());
        assert_eq!(
            client.message_create_url(),
            "http://127.0.0.1:9/v1/message.create"
        );
    }

    #[tokio::test]
    async fn unreachable_server_reports_connection_lost() {
        let client = SatoriClient::new(test_config());
        let mut rx = client.start().await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, Err(ChannelError::ConnectionLost(_))));

        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn send_to_unreachable_server_is_delivery_failure() {
        let client = SatoriClient::new(test_config());
        let err = client
            .send_message("discord", "bot", "c1", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::DeliveryFailed { .. }));
    }
}
