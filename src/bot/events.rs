//! Typed views of the dispatch events the bot reacts to.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Ready(ReadyEvent),
    Resumed,
    MessageCreate(MessageEvent),
    InteractionCreate(InteractionEvent),
    GuildAvailable(GuildEvent),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Global display name if set, else the account name.
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadyEvent {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    #[serde(default)]
    pub guilds: Vec<Value>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageEvent {
    pub channel_id: String,
    pub author: User,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InteractionEvent {
    pub id: String,
    pub token: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: Option<InteractionData>,
    /// Set for guild interactions.
    #[serde(default)]
    pub member: Option<Member>,
    /// Set for DM interactions.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

impl InteractionEvent {
    pub fn invoker(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|member| member.user.as_ref())
            .or(self.user.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GuildEvent {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl InboundEvent {
    /// Decodes a dispatch payload. Events this bot doesn't use, and payloads
    /// that don't match the expected shape, become `Other`.
    pub fn decode(event_type: &str, data: Value) -> Self {
        let decoded = match event_type {
            "READY" => serde_json::from_value(data).map(Self::Ready),
            "RESUMED" => Ok(Self::Resumed),
            "MESSAGE_CREATE" => serde_json::from_value(data).map(Self::MessageCreate),
            "INTERACTION_CREATE" => serde_json::from_value(data).map(Self::InteractionCreate),
            "GUILD_CREATE" => serde_json::from_value(data).map(Self::GuildAvailable),
            _ => Ok(Self::Other(event_type.to_string())),
        };

        decoded.unwrap_or_else(|e| {
            debug!(event = event_type, error = %e, "Undecodable dispatch payload");
            Self::Other(event_type.to_string())
        })
    }
}
