use crate::backend::connect_alert_stream;
use crate::config::RuntimeConfig;
use crate::realtime::envelope::parse_push_envelope;
use crate::realtime::feed::{apply_envelope, AlertFeed, PushApplyOutcome};
use crate::view::alert::AlertView;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatusSnapshot {
    pub state: ConnectionState,
    pub endpoint: String,
    pub reconnect_attempts: u32,
    pub reason: Option<String>,
}

impl StreamStatusSnapshot {
    pub fn disconnected(endpoint: String, reason: Option<String>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            endpoint,
            reconnect_attempts: 0,
            reason,
        }
    }
}

/// Automatic-retry schedule: `base × 2^attempts` with a hard attempt ceiling
/// and no jitter or delay cap. The counter resets only on a successful open,
/// so a briefly-live flapping connection restarts from the base delay.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            MAX_RECONNECT_ATTEMPTS,
        )
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            attempts: 0,
        }
    }

    /// Delay before the next automatic attempt, or `None` once the ceiling
    /// is reached. Advances the attempt counter.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let delay = self.base_delay * 2_u32.saturating_pow(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        Some(delay)
    }

    pub fn record_open(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// State shared between the stream task and its consumers: the alert feed,
/// the outbound sender slot (occupied exactly while a socket is open), and
/// the manual-reconnect signal.
#[derive(Debug, Default)]
pub struct TransportShared {
    feed: Mutex<AlertFeed>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reconnect_now: Notify,
}

impl TransportShared {
    /// Serializes and transmits while a socket is open. At any other moment
    /// this is a logged no-op: nothing queues, nothing errors back.
    pub fn send<T: Serialize>(&self, message: &T) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!("dropping unserializable outbound message: {error}");
                return;
            }
        };

        let guard = self.outbound.lock();
        match guard.as_ref() {
            Some(sender) => {
                if sender.send(text).is_err() {
                    tracing::warn!("outbound message dropped, socket is closing");
                }
            }
            None => tracing::warn!("not connected, dropping outbound message"),
        }
    }

    /// Nudges the stream task: skips a pending backoff sleep, or wakes the
    /// task parked after the attempt ceiling. Does not reset the counter.
    pub fn request_reconnect(&self) {
        self.reconnect_now.notify_one();
    }

    pub fn alerts_snapshot(&self) -> Vec<AlertView> {
        self.feed.lock().alerts.clone()
    }

    pub fn last_message(&self) -> Option<crate::realtime::envelope::PushEnvelope> {
        self.feed.lock().last_message.clone()
    }

    fn install_sender(&self, sender: mpsc::UnboundedSender<String>) {
        *self.outbound.lock() = Some(sender);
    }

    fn clear_sender(&self) {
        *self.outbound.lock() = None;
    }
}

enum StreamDirective {
    Continue,
    Closed,
}

/// Single owner of the push connection. Everything about the socket, the
/// retry schedule, and the attempt counter lives in this task; consumers see
/// status snapshots through the watch channel and data through
/// `TransportShared`.
pub async fn run_alert_stream(
    config: RuntimeConfig,
    shared: Arc<TransportShared>,
    status_tx: watch::Sender<StreamStatusSnapshot>,
    cancel_token: CancellationToken,
) {
    let endpoint = config.ws_url.clone();
    let mut policy = ReconnectPolicy::default();

    while !cancel_token.is_cancelled() {
        let phase = if policy.attempts() == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        };
        let reason = if policy.attempts() == 0 {
            Some("opening alert stream".to_string())
        } else {
            Some(format!("reconnect attempt {}", policy.attempts()))
        };
        publish_status(&status_tx, phase, &endpoint, policy.attempts(), reason);

        match connect_alert_stream(&endpoint).await {
            Ok(stream) => {
                policy.record_open();
                publish_status(
                    &status_tx,
                    ConnectionState::Connected,
                    &endpoint,
                    0,
                    Some("alert stream connected".to_string()),
                );

                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                shared.install_sender(outbound_tx);
                let close_reason =
                    drive_stream(stream, &shared, &cancel_token, outbound_rx).await;
                shared.clear_sender();

                if cancel_token.is_cancelled() {
                    break;
                }

                publish_status(
                    &status_tx,
                    ConnectionState::Disconnected,
                    &endpoint,
                    policy.attempts(),
                    Some(close_reason),
                );
            }
            Err(error) => {
                tracing::warn!("alert stream connect failed: {error}");
            }
        }

        match policy.next_delay() {
            Some(delay) => {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = shared.reconnect_now.notified() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => {
                publish_status(
                    &status_tx,
                    ConnectionState::Disconnected,
                    &endpoint,
                    policy.attempts(),
                    Some("reconnect attempts exhausted, awaiting manual reconnect".to_string()),
                );
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = shared.reconnect_now.notified() => {}
                }
            }
        }
    }

    shared.clear_sender();
    publish_status(
        &status_tx,
        ConnectionState::Disconnected,
        &endpoint,
        policy.attempts(),
        Some("alert stream stopped".to_string()),
    );
}

async fn drive_stream(
    stream: crate::backend::AlertWsStream,
    shared: &Arc<TransportShared>,
    cancel_token: &CancellationToken,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) -> String {
    let (mut write, mut read) = stream.split();
    let mut outbound_open = true;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                return "alert stream cancelled".to_string();
            }
            outbound = outbound_rx.recv(), if outbound_open => {
                match outbound {
                    Some(text) => {
                        if let Err(error) = write.send(Message::Text(text)).await {
                            return format!("websocket send error: {error}");
                        }
                    }
                    None => outbound_open = false,
                }
            }
            frame = read.next() => {
                let Some(frame) = frame else {
                    return "websocket stream ended".to_string();
                };
                match frame {
                    Ok(message) => match handle_frame(message, shared) {
                        StreamDirective::Continue => {}
                        StreamDirective::Closed => {
                            return "websocket closed by server".to_string();
                        }
                    },
                    Err(error) => {
                        return format!("websocket frame error: {error}");
                    }
                }
            }
        }
    }
}

fn handle_frame(message: Message, shared: &TransportShared) -> StreamDirective {
    let envelope = match message {
        Message::Text(text_payload) => {
            let mut owned_payload = text_payload.into_bytes();
            match parse_push_envelope(owned_payload.as_mut_slice()) {
                Ok(parsed) => parsed,
                Err(error) => {
                    tracing::warn!("failed to decode push envelope: {error}");
                    return StreamDirective::Continue;
                }
            }
        }
        Message::Binary(mut binary_payload) => {
            match parse_push_envelope(binary_payload.as_mut_slice()) {
                Ok(parsed) => parsed,
                Err(error) => {
                    tracing::warn!("failed to decode binary push envelope: {error}");
                    return StreamDirective::Continue;
                }
            }
        }
        Message::Close(_) => return StreamDirective::Closed,
        _ => return StreamDirective::Continue,
    };

    let outcome = {
        let mut feed = shared.feed.lock();
        apply_envelope(&mut feed, envelope, Utc::now())
    };
    match outcome {
        PushApplyOutcome::AlertPrepended => tracing::info!("alert received over stream"),
        PushApplyOutcome::UpdateObserved => tracing::debug!("update message received"),
        PushApplyOutcome::Inert => tracing::debug!("push message observed, no list change"),
    }

    StreamDirective::Continue
}

fn publish_status(
    status_tx: &watch::Sender<StreamStatusSnapshot>,
    state: ConnectionState,
    endpoint: &str,
    reconnect_attempts: u32,
    reason: Option<String>,
) {
    status_tx.send_replace(StreamStatusSnapshot {
        state,
        endpoint: endpoint.to_string(),
        reconnect_attempts,
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base_without_cap() {
        let mut policy = ReconnectPolicy::default();
        let mut delays = Vec::new();
        while let Some(delay) = policy.next_delay() {
            delays.push(delay);
        }

        assert_eq!(delays.len(), 10);
        for (attempt, delay) in delays.iter().enumerate() {
            let expected = Duration::from_millis(1_000 * (1 << attempt));
            assert_eq!(*delay, expected, "attempt {attempt}");
        }
        assert_eq!(delays[9], Duration::from_secs(512));
    }

    #[test]
    fn eleventh_attempt_is_never_scheduled() {
        let mut policy = ReconnectPolicy::default();
        for _ in 0..10 {
            assert!(policy.next_delay().is_some());
        }

        assert!(policy.exhausted());
        assert_eq!(policy.next_delay(), None);
        assert_eq!(policy.next_delay(), None);
    }

    #[test]
    fn successful_open_resets_backoff_to_base() {
        let mut policy = ReconnectPolicy::default();
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempts(), 3);

        policy.record_open();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(
            policy.next_delay(),
            Some(Duration::from_millis(RECONNECT_BASE_DELAY_MS))
        );
    }

    #[test]
    fn send_without_connection_is_a_silent_no_op() {
        let shared = TransportShared::default();
        shared.send(&serde_json::json!({"kind":"ping"}));
        assert!(shared.alerts_snapshot().is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_walks_connecting_then_reconnecting() {
        let config = RuntimeConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            ws_url: "ws://127.0.0.1:1".to_string(),
            user_name: "Jaswanth".to_string(),
            status_poll_interval_ms: 2_000,
            quote_poll_interval_ms: 30_000,
        };
        let shared = Arc::new(TransportShared::default());
        let (status_tx, mut status_rx) = watch::channel(StreamStatusSnapshot::disconnected(
            config.ws_url.clone(),
            None,
        ));
        let cancel_token = CancellationToken::new();

        let task = tokio::spawn(run_alert_stream(
            config,
            Arc::clone(&shared),
            status_tx,
            cancel_token.clone(),
        ));

        let mut saw_connecting = false;
        loop {
            let waited =
                tokio::time::timeout(Duration::from_secs(10), status_rx.changed()).await;
            waited
                .expect("status update should arrive before the timeout")
                .expect("status channel should stay open while the task runs");
            let snapshot = status_rx.borrow_and_update().clone();
            if snapshot.state == ConnectionState::Connecting {
                saw_connecting = true;
            }
            if snapshot.state == ConnectionState::Reconnecting {
                assert!(snapshot.reconnect_attempts >= 1);
                break;
            }
        }
        assert!(saw_connecting);

        cancel_token.cancel();
        task.await.expect("stream task should join after cancel");

        let final_snapshot = status_rx.borrow().clone();
        assert_eq!(final_snapshot.state, ConnectionState::Disconnected);
        assert_eq!(
            final_snapshot.reason.as_deref(),
            Some("alert stream stopped")
        );
    }

    #[tokio::test]
    async fn cancelling_twice_is_harmless() {
        let config = RuntimeConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            ws_url: "ws://127.0.0.1:1".to_string(),
            user_name: "Jaswanth".to_string(),
            status_poll_interval_ms: 2_000,
            quote_poll_interval_ms: 30_000,
        };
        let shared = Arc::new(TransportShared::default());
        let (status_tx, status_rx) = watch::channel(StreamStatusSnapshot::disconnected(
            config.ws_url.clone(),
            None,
        ));
        let cancel_token = CancellationToken::new();

        let task = tokio::spawn(run_alert_stream(
            config,
            Arc::clone(&shared),
            status_tx,
            cancel_token.clone(),
        ));

        cancel_token.cancel();
        cancel_token.cancel();
        task.await.expect("stream task should join after cancel");
        assert_eq!(status_rx.borrow().state, ConnectionState::Disconnected);
    }

    #[test]
    fn installed_sender_receives_serialized_text() {
        let shared = TransportShared::default();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        shared.install_sender(sender);

        shared.send(&serde_json::json!({"kind":"subscribe"}));
        let text = receiver.try_recv().expect("message should be forwarded");
        assert_eq!(text, r#"{"kind":"subscribe"}"#);

        shared.clear_sender();
        shared.send(&serde_json::json!({"kind":"after-close"}));
        assert!(receiver.try_recv().is_err());
    }
}
