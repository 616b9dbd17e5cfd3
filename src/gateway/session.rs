//! Gateway session state.
//!
//! `Session` is owned by the single connection loop and is never shared, so
//! none of its fields need locking. It decides what each inbound frame means
//! for the connection; the client performs the resulting I/O.

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::discovery;
use super::error::GatewayError;
use super::protocol::{GatewayFrame, OpCode};
use super::reconnect::Reconnect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    AwaitingHello,
    Identifying,
    Ready,
    AwaitingHeartbeatAck,
}

/// What the connection loop has to do after a frame was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameAction {
    /// Protocol-level frame, fully handled.
    None,
    /// The gateway asked for an immediate heartbeat.
    SendHeartbeat,
    /// An application event for the dispatcher.
    Dispatch { event_type: String, data: Value },
    /// Drop the connection and reconnect.
    Reconnect(Reconnect),
}

#[derive(Debug)]
pub struct Session {
    gateway_endpoint: String,
    session_id: Option<String>,
    resume_gateway_url: Option<String>,
    last_sequence: Option<u64>,
    heartbeat_interval_ms: u64,
    state: ConnectionState,
    heartbeat_pending: bool,
}

impl Session {
    /// `gateway_endpoint` is the discovered URL, query string included.
    pub fn new(gateway_endpoint: impl Into<String>) -> Self {
        Self {
            gateway_endpoint: gateway_endpoint.into(),
            session_id: None,
            resume_gateway_url: None,
            last_sequence: None,
            heartbeat_interval_ms: 0,
            state: ConnectionState::Disconnected,
            heartbeat_pending: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    pub fn heartbeat_pending(&self) -> bool {
        self.heartbeat_pending
    }

    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.last_sequence.is_some()
    }

    /// Resume after a dropped connection when there is a session to resume.
    pub fn resume_or_reidentify(&self) -> Reconnect {
        if self.can_resume() {
            Reconnect::Resume
        } else {
            Reconnect::Reidentify
        }
    }

    /// URL for the next connection attempt.
    pub fn connect_url(&self) -> String {
        match (&self.resume_gateway_url, self.can_resume()) {
            (Some(url), true) => discovery::gateway_url(url),
            _ => self.gateway_endpoint.clone(),
        }
    }

    pub fn on_connected(&mut self) {
        self.state = ConnectionState::AwaitingHello;
        self.heartbeat_pending = false;
    }

    /// Records the heartbeat interval and returns the frame to authenticate
    /// with: a resume when a previous session can be continued, otherwise a
    /// fresh identify (which starts a new sequence).
    pub fn on_hello(
        &mut self,
        heartbeat_interval_ms: u64,
        token: &str,
        intents: u64,
    ) -> Result<GatewayFrame, GatewayError> {
        if heartbeat_interval_ms == 0 {
            return Err(GatewayError::Protocol("Hello carried a zero heartbeat interval".into()));
        }

        self.heartbeat_interval_ms = heartbeat_interval_ms;
        self.heartbeat_pending = false;
        self.state = ConnectionState::Identifying;

        if let (Some(session_id), Some(seq)) = (self.session_id.as_deref(), self.last_sequence) {
            info!(session_id = %session_id, seq, "Resuming gateway session");
            return GatewayFrame::resume(token, session_id, seq);
        }

        self.forget_session();
        info!("Identifying new gateway session");
        GatewayFrame::identify(token, intents)
    }

    /// Applies an inbound frame received after Hello.
    pub fn handle_frame(&mut self, frame: GatewayFrame) -> FrameAction {
        let Some(op) = frame.opcode() else {
            debug!(op = frame.op, "Dropping frame with unknown opcode");
            return FrameAction::None;
        };

        match op {
            OpCode::Dispatch => match (frame.s, frame.t) {
                (Some(seq), Some(event_type)) => {
                    self.on_dispatch(seq, event_type, frame.d.unwrap_or(Value::Null))
                }
                _ => {
                    debug!("Dropping dispatch without sequence or event type");
                    FrameAction::None
                }
            },
            OpCode::Heartbeat => self.on_heartbeat_request(),
            OpCode::HeartbeatAck => {
                self.on_heartbeat_ack();
                FrameAction::None
            }
            OpCode::Reconnect => self.on_reconnect_request(),
            OpCode::InvalidSession => {
                let resumable = frame.d.as_ref().and_then(Value::as_bool).unwrap_or(false);
                self.on_invalid_session(resumable)
            }
            OpCode::Hello => {
                warn!("Unexpected Hello mid-session");
                FrameAction::None
            }
            OpCode::Identify | OpCode::Resume => {
                debug!(%op, "Dropping client-only opcode from server");
                FrameAction::None
            }
        }
    }

    pub fn on_dispatch(&mut self, sequence: u64, event_type: String, data: Value) -> FrameAction {
        self.last_sequence = Some(self.last_sequence.map_or(sequence, |last| last.max(sequence)));
        trace!(seq = sequence, event = %event_type, "Dispatch");
        FrameAction::Dispatch { event_type, data }
    }

    pub fn on_heartbeat_request(&mut self) -> FrameAction {
        debug!("Gateway requested a heartbeat");
        FrameAction::SendHeartbeat
    }

    pub fn on_heartbeat_ack(&mut self) {
        trace!("Heartbeat acknowledged");
        self.heartbeat_pending = false;
        if self.state == ConnectionState::AwaitingHeartbeatAck {
            self.state = ConnectionState::Ready;
        }
    }

    pub fn on_reconnect_request(&mut self) -> FrameAction {
        info!("Gateway requested a reconnect");
        FrameAction::Reconnect(self.resume_or_reidentify())
    }

    /// The session is gone server-side. The next connection always identifies
    /// from scratch, whatever the `resumable` flag says.
    pub fn on_invalid_session(&mut self, resumable: bool) -> FrameAction {
        warn!(resumable, "Invalid session, re-identifying");
        self.forget_session();
        FrameAction::Reconnect(Reconnect::Reidentify)
    }

    pub fn on_ready(&mut self, session_id: String, resume_gateway_url: Option<String>) {
        self.session_id = Some(session_id);
        self.resume_gateway_url = resume_gateway_url;
        self.state = ConnectionState::Ready;
    }

    pub fn on_resumed(&mut self) {
        self.state = ConnectionState::Ready;
    }

    /// Builds the next heartbeat and marks it as awaiting an ack.
    pub fn next_heartbeat(&mut self) -> GatewayFrame {
        self.heartbeat_pending = true;
        if self.state == ConnectionState::Ready {
            self.state = ConnectionState::AwaitingHeartbeatAck;
        }
        GatewayFrame::heartbeat(self.last_sequence)
    }

    pub fn on_disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.heartbeat_pending = false;
    }

    /// Drops everything tied to the previous session.
    pub fn forget_session(&mut self) {
        self.session_id = None;
        self.resume_gateway_url = None;
        self.last_sequence = None;
    }
}
