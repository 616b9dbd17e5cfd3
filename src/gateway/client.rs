//! The gateway connection loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::error::GatewayError;
use super::heartbeat::HeartbeatTimer;
use super::protocol::{GatewayFrame, HelloPayload, OpCode, ReadyPayload};
use super::reconnect::{CloseAction, Reconnect, ReconnectPolicy, classify_close, close_code};
use super::session::{FrameAction, Session};
use super::transport::{Connection, TransportEvent};
use crate::config::ReconnectConfig;

const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

/// Receives every dispatch (op 0) in arrival order.
///
/// Called from the connection loop, so implementations must not block; slow
/// work belongs in a spawned task.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event_type: &str, data: Value);
}

pub struct GatewayClient {
    token: String,
    intents: u64,
    session: Session,
    policy: ReconnectPolicy,
    sink: Arc<dyn EventSink>,
}

impl GatewayClient {
    pub fn new(
        token: impl Into<String>,
        intents: u64,
        gateway_endpoint: impl Into<String>,
        reconnect: &ReconnectConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            token: token.into(),
            intents,
            session: Session::new(gateway_endpoint),
            policy: ReconnectPolicy::new(reconnect),
            sink,
        }
    }

    /// Runs until a fatal error. Every other failure reconnects after the
    /// policy's backoff, resuming when the session allows it.
    pub async fn run(&mut self) -> Result<(), GatewayError> {
        loop {
            let outcome = self.connect_and_run().await;
            self.session.on_disconnect();

            let kind = match outcome {
                Ok(kind) => kind,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Gateway stopped");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "Gateway connection failed");
                    self.session.resume_or_reidentify()
                }
            };

            if kind == Reconnect::Reidentify {
                self.session.forget_session();
            }

            let delay = self.policy.next_delay(kind)?;
            info!(
                ?kind,
                attempt = self.policy.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to gateway"
            );
            sleep(delay).await;
        }
    }

    async fn connect_and_run(&mut self) -> Result<Reconnect, GatewayError> {
        let url = self.session.connect_url();
        info!(url = %url, "Connecting to gateway");

        let mut conn = Connection::connect(&url).await?;
        self.session.on_connected();

        let interval_ms = wait_for_hello(&mut conn).await?;
        debug!(interval_ms, "Received Hello");

        let auth = self.session.on_hello(interval_ms, &self.token, self.intents)?;
        conn.send(auth.to_json()?).await?;

        let mut heartbeat = HeartbeatTimer::start(Duration::from_millis(interval_ms));
        let result = self.event_loop(&mut conn, &mut heartbeat).await;

        // 1000 invalidates the session server-side; anything else keeps it resumable.
        let code = match result {
            Ok(Reconnect::Reidentify) => close_code::NORMAL,
            _ => close_code::CLIENT_RESUME,
        };
        conn.close(code).await;

        result
    }

    async fn event_loop(
        &mut self,
        conn: &mut Connection,
        heartbeat: &mut HeartbeatTimer,
    ) -> Result<Reconnect, GatewayError> {
        loop {
            tokio::select! {
                // The timer goes first so a busy socket can't starve heartbeats.
                biased;

                _ = heartbeat.tick() => {
                    // Frames that arrived before the deadline count, acks included.
                    for _ in 0..conn.queued_events() {
                        let Some(event) = conn.try_next_event() else {
                            break;
                        };
                        if let Some(outcome) = self.on_transport_event(conn, event).await {
                            return outcome;
                        }
                    }

                    if self.session.heartbeat_pending() {
                        warn!("Previous heartbeat was never acknowledged, dropping zombie connection");
                        return Ok(self.session.resume_or_reidentify());
                    }
                    let frame = self.session.next_heartbeat();
                    if let Err(e) = send_frame(conn, &frame).await {
                        warn!(error = %e, "Heartbeat send failed");
                        return Ok(self.session.resume_or_reidentify());
                    }
                }

                event = conn.next_event() => {
                    let Some(event) = event else {
                        return Ok(self.session.resume_or_reidentify());
                    };
                    if let Some(outcome) = self.on_transport_event(conn, event).await {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Returns `Some` when the connection is done.
    async fn on_transport_event(
        &mut self,
        conn: &Connection,
        event: TransportEvent,
    ) -> Option<Result<Reconnect, GatewayError>> {
        match event {
            TransportEvent::Message(text) => self.on_message(conn, &text).await.map(Ok),
            TransportEvent::Closed { code, reason } => Some(self.on_close(code, &reason)),
            TransportEvent::Error(e) => {
                warn!(error = %e, "Gateway read failed");
                Some(Ok(self.session.resume_or_reidentify()))
            }
        }
    }

    /// Returns `Some` when the connection has to be dropped.
    async fn on_message(&mut self, conn: &Connection, text: &str) -> Option<Reconnect> {
        let frame = match GatewayFrame::from_json(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Dropping undecodable frame");
                return None;
            }
        };

        match self.session.handle_frame(frame) {
            FrameAction::None => None,
            FrameAction::SendHeartbeat => {
                let frame = GatewayFrame::heartbeat(self.session.last_sequence());
                if let Err(e) = send_frame(conn, &frame).await {
                    warn!(error = %e, "Requested heartbeat could not be sent");
                    return Some(self.session.resume_or_reidentify());
                }
                None
            }
            FrameAction::Dispatch { event_type, data } => {
                self.on_dispatch(&event_type, &data);
                self.sink.on_event(&event_type, data);
                None
            }
            FrameAction::Reconnect(kind) => Some(kind),
        }
    }

    fn on_dispatch(&mut self, event_type: &str, data: &Value) {
        match event_type {
            "READY" => match serde_json::from_value::<ReadyPayload>(data.clone()) {
                Ok(ready) => {
                    info!(
                        session_id = %ready.session_id,
                        guilds = ready.guilds.len(),
                        "Gateway session ready"
                    );
                    self.session.on_ready(ready.session_id, ready.resume_gateway_url);
                    self.policy.connected();
                }
                Err(e) => warn!(error = %e, "READY without a usable session id"),
            },
            "RESUMED" => {
                info!(seq = ?self.session.last_sequence(), "Gateway session resumed");
                self.session.on_resumed();
                self.policy.connected();
            }
            _ => {}
        }
    }

    fn on_close(&self, code: u16, reason: &str) -> Result<Reconnect, GatewayError> {
        warn!(code, reason, "Gateway closed the connection");
        match classify_close(code) {
            CloseAction::Resume => Ok(self.session.resume_or_reidentify()),
            CloseAction::Reidentify => Ok(Reconnect::Reidentify),
            CloseAction::Fatal => Err(fatal_close(code)),
        }
    }
}

fn fatal_close(code: u16) -> GatewayError {
    if code == close_code::AUTHENTICATION_FAILED {
        GatewayError::AuthenticationFailed
    } else {
        GatewayError::UnrecoverableClose(code)
    }
}

async fn send_frame(conn: &Connection, frame: &GatewayFrame) -> Result<(), GatewayError> {
    debug!(%frame, "Sending");
    conn.send(frame.to_json()?).await
}

/// Waits for op 10 and returns its heartbeat interval.
async fn wait_for_hello(conn: &mut Connection) -> Result<u64, GatewayError> {
    timeout(HELLO_TIMEOUT, read_hello(conn))
        .await
        .map_err(|_| GatewayError::HelloTimeout)?
}

/// Anything that arrives before Hello is dropped.
async fn read_hello(conn: &mut Connection) -> Result<u64, GatewayError> {
    while let Some(event) = conn.next_event().await {
        match event {
            TransportEvent::Message(text) => {
                let Ok(frame) = GatewayFrame::from_json(&text) else {
                    debug!("Dropping undecodable frame before Hello");
                    continue;
                };
                if frame.opcode() != Some(OpCode::Hello) {
                    debug!(%frame, "Dropping frame before Hello");
                    continue;
                }
                let hello: HelloPayload = serde_json::from_value(frame.d.unwrap_or(Value::Null))
                    .map_err(|e| GatewayError::Protocol(format!("malformed Hello: {}", e)))?;
                return Ok(hello.heartbeat_interval);
            }
            TransportEvent::Closed { code, reason } => {
                if classify_close(code) == CloseAction::Fatal {
                    return Err(fatal_close(code));
                }
                return Err(GatewayError::Connection(format!(
                    "closed before Hello ({}: {})",
                    code, reason
                )));
            }
            TransportEvent::Error(e) => return Err(GatewayError::Connection(e)),
        }
    }
    Err(GatewayError::Connection("closed before Hello".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::Instant;
    use tokio_tungstenite::tungstenite::Message;

    struct NullSink;

    impl EventSink for NullSink {
        fn on_event(&self, _event_type: &str, _data: Value) {}
    }

    fn client() -> GatewayClient {
        GatewayClient::new(
            "tok",
            513,
            "ws://127.0.0.1:1/?v=10&encoding=json",
            &ReconnectConfig::default(),
            Arc::new(NullSink),
        )
    }

    #[test]
    fn fatal_close_codes_map_to_errors() {
        assert!(matches!(fatal_close(4004), GatewayError::AuthenticationFailed));
        assert!(matches!(fatal_close(4014), GatewayError::UnrecoverableClose(4014)));
        assert!(fatal_close(4010).is_fatal());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn heartbeats_keep_their_period_under_a_dispatch_flood() {
        let interval = Duration::from_millis(100);
        let (outbound, mut sent) = mpsc::channel::<Message>(64);
        let (events_tx, events) = mpsc::channel::<TransportEvent>(256);
        let mut conn = Connection::from_channels(outbound, events);

        // Keeps the inbound channel full until the connection is dropped.
        let flood_tx = events_tx.clone();
        let flood = tokio::spawn(async move {
            let frame = json!({
                "op": 0, "s": 1, "t": "GUILD_CREATE",
                "d": {"id": "g1", "name": "guild", "channels": vec!["c".repeat(32); 24]}
            })
            .to_string();
            let mut sent = 0u64;
            while flood_tx.send(TransportEvent::Message(frame.clone())).await.is_ok() {
                sent += 1;
            }
            sent
        });

        // Acks every beat through the same inbound channel.
        let server = tokio::spawn(async move {
            let mut beats = Vec::new();
            while let Some(message) = sent.recv().await {
                let Message::Text(text) = message else {
                    continue;
                };
                let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                if frame["op"] == 1 {
                    beats.push(Instant::now());
                    let ack = TransportEvent::Message(r#"{"op":11}"#.to_string());
                    if events_tx.send(ack).await.is_err() {
                        break;
                    }
                }
            }
            beats
        });

        let mut client = client();
        let mut heartbeat = HeartbeatTimer::with_first_delay(interval, Duration::ZERO);
        let outcome = timeout(
            Duration::from_millis(1_500),
            client.event_loop(&mut conn, &mut heartbeat),
        )
        .await;
        assert!(outcome.is_err(), "loop stopped early: {:?}", outcome);
        drop(conn);

        let flooded = flood.await.unwrap();
        let beats = server.await.unwrap();
        assert!(flooded > 1_000, "only {} frames were queued", flooded);
        assert!(beats.len() >= 8, "only {} heartbeats in 1.5s", beats.len());

        let max_gap = beats.windows(2).map(|w| w[1] - w[0]).max().unwrap();
        assert!(max_gap < Duration::from_millis(400), "heartbeat gap of {:?}", max_gap);
    }

    #[tokio::test]
    async fn queued_ack_is_applied_before_the_liveness_check() {
        let (outbound, mut sent) = mpsc::channel::<Message>(8);
        let (events_tx, events) = mpsc::channel::<TransportEvent>(8);
        let mut conn = Connection::from_channels(outbound, events);

        let mut client = client();
        client.session.next_heartbeat();
        assert!(client.session.heartbeat_pending());

        // The ack is already waiting when the beat comes due.
        events_tx
            .send(TransportEvent::Message(r#"{"op":11}"#.to_string()))
            .await
            .unwrap();
        let mut heartbeat = HeartbeatTimer::with_first_delay(Duration::from_secs(60), Duration::ZERO);
        let outcome = timeout(
            Duration::from_millis(200),
            client.event_loop(&mut conn, &mut heartbeat),
        )
        .await;
        assert!(outcome.is_err(), "connection was dropped: {:?}", outcome);

        let Message::Text(text) = sent.recv().await.unwrap() else {
            panic!("expected a heartbeat");
        };
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(frame["op"], 1);
    }
}
