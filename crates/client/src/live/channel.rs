//! Live channel socket task
//!
//! Opens the WebSocket, sends `authorize`, and forwards server events into a
//! single ordered queue. Content events received before the epoch is
//! authorized are dropped. On transport loss the task reconnects with
//! exponential backoff and redoes the handshake. When the attempts run out the
//! last transport error is reported through the shell.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use url::Url;

use super::connection::{ConnectionState, ConnectionTracker};
use super::events::{ClientEvent, LiveEvent, ServerEvent};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::SessionTokens;

#[derive(Debug, Clone)]
pub struct LiveChannelConfig {
    pub url: Url,
    /// First reconnect delay, doubled per failed attempt
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed attempts before giving up; 0 means never
    pub max_attempts: u32,
}

impl LiveChannelConfig {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            url: config.ws_url.clone(),
            base_delay: config.reconnect_base_delay,
            max_delay: config.reconnect_max_delay,
            max_attempts: config.reconnect_max_attempts,
        }
    }
}

/// Handle to the running live channel
pub struct LiveChannelClient {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl LiveChannelClient {
    /// Spawn the socket task and return the ordered event feed.
    ///
    /// The feed closes once the client is shut down or gives up reconnecting.
    pub fn connect(
        config: LiveChannelConfig,
        tokens: SessionTokens,
    ) -> (Self, mpsc::UnboundedReceiver<LiveEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tracker, state) = ConnectionTracker::new();

        let worker = ChannelWorker {
            config,
            tokens,
            events: events_tx,
            shutdown: shutdown_rx,
            tracker,
        };
        let task = tokio::spawn(worker.run());

        (
            Self {
                shutdown: shutdown_tx,
                state,
                task,
            },
            events_rx,
        )
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Close the socket and wait for the task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Live channel task ended abnormally");
        }
    }
}

enum EpochEnd {
    /// Client shut down, feed dropped, or session token gone
    Shutdown,
    Lost {
        established: bool,
        authorized: bool,
        error: Option<tungstenite::Error>,
    },
}

enum Step {
    Frame(Option<Result<WsMessage, tungstenite::Error>>),
    Stop,
}

struct ChannelWorker {
    config: LiveChannelConfig,
    tokens: SessionTokens,
    events: mpsc::UnboundedSender<LiveEvent>,
    shutdown: watch::Receiver<bool>,
    tracker: ConnectionTracker,
}

impl ChannelWorker {
    async fn run(mut self) {
        let mut backoff = self.backoff();
        let mut attempts: u32 = 0;
        let mut last_error = None;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.tracker.begin_connect();
            let (established, authorized) = match self.run_epoch().await {
                EpochEnd::Shutdown => break,
                EpochEnd::Lost {
                    established,
                    authorized,
                    error,
                } => {
                    if error.is_some() {
                        last_error = error;
                    }
                    (established, authorized)
                }
            };

            self.tracker.lost();
            if established {
                tracing::info!(url = %self.config.url, "Live channel disconnected");
                self.emit(LiveEvent::Disconnected);
            }

            if authorized {
                attempts = 0;
                backoff = self.backoff();
            }
            attempts += 1;
            if self.config.max_attempts > 0 && attempts > self.config.max_attempts {
                tracing::error!(
                    attempts = self.config.max_attempts,
                    "Live channel reconnect attempts exhausted"
                );
                let error = last_error.unwrap_or(tungstenite::Error::ConnectionClosed);
                self.tokens.shell().report(&ClientError::from(error));
                break;
            }

            let delay = backoff.next().unwrap_or(self.config.max_delay);
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                attempt = attempts,
                "Reconnecting live channel"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => break,
                _ = self.events.closed() => break,
            }
        }

        self.tracker.lost();
        tracing::debug!(url = %self.config.url, "Live channel stopped");
    }

    fn backoff(&self) -> impl Iterator<Item = Duration> {
        reconnect_delays(self.config.base_delay, self.config.max_delay).map(jitter)
    }

    async fn run_epoch(&mut self) -> EpochEnd {
        let connected = tokio::select! {
            result = connect_async(self.config.url.as_str()) => Some(result),
            _ = self.shutdown.changed() => None,
            _ = self.events.closed() => None,
        };
        let socket = match connected {
            None => return EpochEnd::Shutdown,
            Some(Ok((socket, _response))) => socket,
            Some(Err(e)) => {
                tracing::warn!(error = %e, url = %self.config.url, "Live channel connect failed");
                return EpochEnd::Lost {
                    established: false,
                    authorized: false,
                    error: Some(e),
                };
            }
        };

        let epoch = self.tracker.established();
        tracing::info!(epoch = %epoch, url = %self.config.url, "Live channel connected");
        self.emit(LiveEvent::Connected);

        let (mut sink, mut stream) = socket.split();

        // A missing token already redirected to login; stop reconnecting
        let Some(token) = self.tokens.get_token() else {
            let _ = sink.send(WsMessage::Close(None)).await;
            return EpochEnd::Shutdown;
        };

        let frame = match (ClientEvent::Authorize { token }).encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode authorize frame");
                return EpochEnd::Shutdown;
            }
        };
        if let Err(e) = sink.send(WsMessage::text(frame)).await {
            tracing::warn!(error = %e, "Failed to send authorize frame");
            return self.lost(Some(e));
        }

        loop {
            let step = tokio::select! {
                frame = stream.next() => Step::Frame(frame),
                _ = self.shutdown.changed() => Step::Stop,
                _ = self.events.closed() => Step::Stop,
            };

            match step {
                Step::Stop => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return EpochEnd::Shutdown;
                }
                Step::Frame(None) => {
                    tracing::info!(epoch = %epoch, "Live channel stream ended");
                    return self.lost(None);
                }
                Step::Frame(Some(Err(e))) => {
                    tracing::warn!(epoch = %epoch, error = %e, "Live channel transport error");
                    return self.lost(Some(e));
                }
                Step::Frame(Some(Ok(WsMessage::Text(text)))) => self.handle_text(text.as_str()),
                Step::Frame(Some(Ok(WsMessage::Close(frame)))) => {
                    tracing::info!(epoch = %epoch, frame = ?frame, "Live channel closed by server");
                    return self.lost(None);
                }
                // Ping/pong is answered by the transport, binary frames are not part of the protocol
                Step::Frame(Some(Ok(_))) => {}
            }
        }
    }

    fn lost(&self, error: Option<tungstenite::Error>) -> EpochEnd {
        EpochEnd::Lost {
            established: true,
            authorized: self.tracker.accepts_events(),
            error,
        }
    }

    fn handle_text(&mut self, text: &str) {
        let event = match ServerEvent::decode(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, frame = %text, "Failed to parse live event");
                return;
            }
        };

        let live = match event {
            ServerEvent::Authorized => {
                if self.tracker.authorized() {
                    tracing::info!(
                        epoch = ?self.tracker.epoch(),
                        epochs = self.tracker.epochs_authorized(),
                        "Live channel authorized"
                    );
                    self.emit(LiveEvent::Authorized);
                } else {
                    tracing::debug!("Ignoring repeated authorization");
                }
                return;
            }
            ServerEvent::Error { message } => {
                tracing::warn!(message = %message, "Live channel reported an error");
                self.emit(LiveEvent::ServerError { message });
                return;
            }
            ServerEvent::Unknown(name) => {
                tracing::debug!(event = %name, "Ignoring unhandled live event");
                return;
            }
            ServerEvent::Message(message) => LiveEvent::Created(message),
            ServerEvent::EditMessage(edit) => LiveEvent::Edited(edit),
            ServerEvent::DeleteMessage(target) => LiveEvent::Deleted { id: target.id },
            ServerEvent::TicketClosed(target) => LiveEvent::TicketClosed { id: target.id },
        };

        if live.requires_authorization() && !self.tracker.accepts_events() {
            tracing::warn!(
                event = ?live,
                state = ?self.tracker.state(),
                "Dropping live event received before authorization"
            );
            return;
        }
        self.emit(live);
    }

    fn emit(&self, event: LiveEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Live event feed closed");
        }
    }
}

/// Reconnect delays before jitter: base, 2x base, 4x base ... capped at `max`
fn reconnect_delays(base: Duration, max: Duration) -> impl Iterator<Item = Duration> {
    let base = base.min(max);
    let base_ms = (base.as_millis() as u64).max(1);
    // ExponentialBackoff yields factor * 2^n ms for n >= 1, so the base itself
    // goes first
    std::iter::once(base).chain(
        ExponentialBackoff::from_millis(2)
            .factor(base_ms)
            .max_delay(max),
    )
}


#[cfg(test)]
mod tests {
    use super::testing::spawn_server;
    use super::*;
    use std::sync::Arc;
    use crate::session::MemoryTokenStore;
    use crate::shell::testing::RecordingShell;
    use crate::shell::Route;
    use supportchat_shared::{Id, MessageEdit};
    use tokio::time::timeout;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn config(url: Url, max_attempts: u32) -> LiveChannelConfig {
        LiveChannelConfig {
            url,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            max_attempts,
        }
    }

    fn tokens(recorder: &Arc<RecordingShell>, token: Option<&str>) -> SessionTokens {
        let store = match token {
            Some(t) => MemoryTokenStore::with_token(t),
            None => MemoryTokenStore::default(),
        };
        SessionTokens::new(Arc::new(store), recorder.shell())
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<LiveEvent>) -> LiveEvent {
        timeout(TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for live event")
            .expect("live event feed closed")
    }

    #[test]
    fn test_reconnect_delays_double_from_base() {
        let delays: Vec<u64> = reconnect_delays(Duration::from_millis(501), Duration::from_secs(3))
            .take(5)
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![501, 1002, 2004, 3000, 3000]);
    }

    #[tokio::test]
    async fn test_authorize_handshake_and_event_order() {
        let (url, mut received) = spawn_server(vec![vec![
            r#"{"event":"message","data":{"id":1,"author_id":7,"content":"too early"}}"#,
            r#"{"event":"authorized","data":{"message":"User successfully authorized"}}"#,
            r#"{"event":"message","data":{"id":2,"author_id":7,"content":"hi"}}"#,
            r#"{"event":"edit_message","data":{"id":2,"content":"hello"}}"#,
            r#"{"event":"delete_message","data":{"id":2}}"#,
            r#"{"event":"ticket_closed","data":{"id":3}}"#,
        ]])
        .await;

        let recorder = RecordingShell::new();
        let (client, mut events) = LiveChannelClient::connect(
            config(url, 0),
            tokens(&recorder, Some("tok")),
        );

        assert_eq!(next(&mut events).await, LiveEvent::Connected);
        assert_eq!(next(&mut events).await, LiveEvent::Authorized);
        match next(&mut events).await {
            LiveEvent::Created(message) => assert_eq!(message.id, Id::from(2)),
            other => panic!("Expected Created event, got {:?}", other),
        }
        assert_eq!(
            next(&mut events).await,
            LiveEvent::Edited(MessageEdit {
                id: Id::from(2),
                content: "hello".to_string()
            })
        );
        assert_eq!(next(&mut events).await, LiveEvent::Deleted { id: Id::from(2) });
        assert_eq!(next(&mut events).await, LiveEvent::TicketClosed { id: Id::from(3) });
        assert_eq!(client.state(), ConnectionState::Authorized);

        let authorize = timeout(TIMEOUT, received.recv()).await.unwrap().unwrap();
        assert_eq!(authorize, r#"{"event":"authorize","data":{"token":"tok"}}"#);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconnect_redoes_authorization() {
        let (url, mut received) = spawn_server(vec![
            vec![
                r#"{"event":"authorized"}"#,
                r#"{"event":"message","data":{"id":1,"author_id":7,"content":"first"}}"#,
            ],
            vec![
                r#"{"event":"message","data":{"id":2,"author_id":7,"content":"unauthorized"}}"#,
                r#"{"event":"authorized"}"#,
                r#"{"event":"message","data":{"id":3,"author_id":7,"content":"second"}}"#,
            ],
        ])
        .await;

        let recorder = RecordingShell::new();
        let (client, mut events) = LiveChannelClient::connect(
            config(url, 0),
            tokens(&recorder, Some("tok")),
        );

        let mut feed = Vec::new();
        for _ in 0..7 {
            feed.push(next(&mut events).await);
        }

        let created: Vec<_> = feed
            .iter()
            .filter_map(|event| match event {
                LiveEvent::Created(message) => Some(message.id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![Id::from(1), Id::from(3)]);
        assert_eq!(feed[0], LiveEvent::Connected);
        assert_eq!(feed[1], LiveEvent::Authorized);
        assert_eq!(feed[3], LiveEvent::Disconnected);
        assert_eq!(feed[4], LiveEvent::Connected);
        assert_eq!(feed[5], LiveEvent::Authorized);

        // Both epochs sent the authorize frame
        for _ in 0..2 {
            let frame = timeout(TIMEOUT, received.recv()).await.unwrap().unwrap();
            assert!(frame.contains("authorize"));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_server_error_surfaced_without_state_change() {
        let (url, _received) = spawn_server(vec![vec![
            r#"{"event":"error","data":{"message":"Invalid or expired token"}}"#,
        ]])
        .await;

        let recorder = RecordingShell::new();
        let (client, mut events) = LiveChannelClient::connect(
            config(url, 0),
            tokens(&recorder, Some("expired")),
        );

        assert_eq!(next(&mut events).await, LiveEvent::Connected);
        assert_eq!(
            next(&mut events).await,
            LiveEvent::ServerError {
                message: "Invalid or expired token".to_string()
            }
        );
        assert_eq!(client.state(), ConnectionState::Connected);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_token_stops_channel() {
        let (url, _received) = spawn_server(vec![vec![]]).await;

        let recorder = RecordingShell::new();
        let (client, mut events) = LiveChannelClient::connect(
            config(url, 0),
            tokens(&recorder, None),
        );

        assert_eq!(next(&mut events).await, LiveEvent::Connected);
        let closed = timeout(TIMEOUT, events.recv()).await.unwrap();
        assert_eq!(closed, None);
        assert_eq!(recorder.routes(), vec![Route::Auth]);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let recorder = RecordingShell::new();
        let (client, mut events) = LiveChannelClient::connect(
            config(Url::parse(&format!("ws://{}/ws", addr)).unwrap(), 2),
            tokens(&recorder, Some("tok")),
        );

        let closed = timeout(TIMEOUT, events.recv()).await.unwrap();
        assert_eq!(closed, None);
        assert_eq!(client.state(), ConnectionState::Disconnected);

        let notifications = recorder.notifications();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].is_error);
        assert!(notifications[0]
            .message
            .starts_with("An unexpected error occurred"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_feed() {
        let (url, _received) = spawn_server(vec![vec![r#"{"event":"authorized"}"#]]).await;

        let recorder = RecordingShell::new();
        let (client, mut events) = LiveChannelClient::connect(
            config(url, 0),
            tokens(&recorder, Some("tok")),
        );

        assert_eq!(next(&mut events).await, LiveEvent::Connected);
        assert_eq!(next(&mut events).await, LiveEvent::Authorized);

        client.shutdown().await;
        let closed = timeout(TIMEOUT, events.recv()).await.unwrap();
        assert_eq!(closed, None);
    }
}
