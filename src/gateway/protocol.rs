//! Gateway frame format and payloads.
//!
//! Every frame is a JSON object `{op, d, s, t}`; `s` and `t` are only set on
//! dispatch frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::GatewayError;

/// Gateway operation codes used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// An event was dispatched (receive)
    Dispatch = 0,
    /// Heartbeat, or a request for one (send/receive)
    Heartbeat = 1,
    /// Start a new session (send)
    Identify = 2,
    /// Resume a dropped session (send)
    Resume = 6,
    /// Reconnect and resume (receive)
    Reconnect = 7,
    /// Session is no longer valid (receive)
    InvalidSession = 9,
    /// Sent right after connecting, carries the heartbeat interval (receive)
    Hello = 10,
    /// Heartbeat acknowledged (receive)
    HeartbeatAck = 11,
}

impl OpCode {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}

/// A decoded gateway frame.
///
/// `op` is kept raw so frames with opcodes this client does not know still
/// decode and can be dropped by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,

    /// Always serialized, heartbeats need an explicit `null`
    #[serde(default)]
    pub d: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    fn client(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op: op.as_u8(),
            d,
            s: None,
            t: None,
        }
    }

    /// Heartbeat (op 1) carrying the last sequence number seen.
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::client(OpCode::Heartbeat, last_sequence.map(Value::from))
    }

    /// Identify (op 2).
    pub fn identify(token: &str, intents: u64) -> Result<Self, GatewayError> {
        let payload = IdentifyPayload {
            token: token.to_string(),
            intents,
            properties: ConnectionProperties::default(),
        };
        Ok(Self::client(OpCode::Identify, Some(serde_json::to_value(payload)?)))
    }

    /// Resume (op 6).
    pub fn resume(token: &str, session_id: &str, seq: u64) -> Result<Self, GatewayError> {
        let payload = ResumePayload {
            token: token.to_string(),
            session_id: session_id.to_string(),
            seq,
        };
        Ok(Self::client(OpCode::Resume, Some(serde_json::to_value(payload)?)))
    }

    #[must_use]
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.opcode(), &self.t) {
            (Some(op), Some(t)) => write!(f, "GatewayFrame(op={}, t={}, s={:?})", op, t, self.s),
            (Some(op), None) => write!(f, "GatewayFrame(op={})", op),
            (None, _) => write!(f, "GatewayFrame(op={} unknown)", self.op),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

/// The parts of READY the session keeps.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    #[serde(default)]
    pub guilds: Vec<Value>,
}

/// Body of `GET /gateway/bot`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBotResponse {
    pub url: String,
}
