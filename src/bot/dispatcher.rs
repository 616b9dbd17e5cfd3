//! Turns inbound events into command requests.

use super::events::{InboundEvent, InteractionEvent, MessageEvent};

pub const COMMAND_PREFIX: char = '!';

/// Interaction type for slash commands.
pub const APPLICATION_COMMAND: u8 = 2;

/// Where a reply has to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    Channel { channel_id: String },
    Interaction { id: String, token: String },
}

impl ReplyTarget {
    pub fn is_interaction(&self) -> bool {
        matches!(self, Self::Interaction { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command_name: String,
    pub user_id: String,
    pub username: String,
    pub reply_target: ReplyTarget,
}

pub fn command_request(event: &InboundEvent) -> Option<CommandRequest> {
    match event {
        InboundEvent::MessageCreate(message) => from_message(message),
        InboundEvent::InteractionCreate(interaction) => from_interaction(interaction),
        _ => None,
    }
}

/// `"  !CheckIn "` -> `checkin`. Bots and messages without the prefix are ignored.
fn from_message(message: &MessageEvent) -> Option<CommandRequest> {
    if message.author.bot {
        return None;
    }

    let name = message
        .content
        .trim()
        .strip_prefix(COMMAND_PREFIX)?
        .to_lowercase();
    if name.is_empty() {
        return None;
    }

    Some(CommandRequest {
        command_name: name,
        user_id: message.author.id.clone(),
        username: message.author.display_name().to_string(),
        reply_target: ReplyTarget::Channel {
            channel_id: message.channel_id.clone(),
        },
    })
}

fn from_interaction(interaction: &InteractionEvent) -> Option<CommandRequest> {
    if interaction.kind != APPLICATION_COMMAND {
        return None;
    }

    let name = interaction.data.as_ref()?.name.clone();
    let user = interaction.invoker()?;

    Some(CommandRequest {
        command_name: name,
        user_id: user.id.clone(),
        username: user.display_name().to_string(),
        reply_target: ReplyTarget::Interaction {
            id: interaction.id.clone(),
            token: interaction.token.clone(),
        },
    })
}
