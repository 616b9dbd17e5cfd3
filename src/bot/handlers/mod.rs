use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::bot::commands::CommandHandler;
use crate::bot::dispatcher::command_request;
use crate::bot::events::InboundEvent;
use crate::bot::rest::RestClient;
use crate::gateway::EventSink;

/// Routes dispatch events to the command handler and posts the replies.
pub struct EventHandler {
    commands: Arc<dyn CommandHandler>,
    rest: RestClient,
}

impl EventHandler {
    pub fn new(commands: Arc<dyn CommandHandler>, rest: RestClient) -> Self {
        Self { commands, rest }
    }
}

impl EventSink for EventHandler {
    fn on_event(&self, event_type: &str, data: Value) {
        event_handler(InboundEvent::decode(event_type, data), &self.commands, &self.rest);
    }
}

pub fn event_handler(event: InboundEvent, commands: &Arc<dyn CommandHandler>, rest: &RestClient) {
    match &event {
        InboundEvent::Ready(ready) => {
            if let Some(user) = &ready.user {
                info!("Bot logged in as {}", user.username);
            }
        }
        InboundEvent::GuildAvailable(guild) => {
            info!(guild_id = %guild.id, "Guild available: {}", guild.name);
        }
        InboundEvent::Other(event_type) => {
            debug!(event = %event_type, "Ignoring event");
        }
        _ => {}
    }

    let Some(request) = command_request(&event) else {
        return;
    };

    let commands = Arc::clone(commands);
    let rest = rest.clone();
    tokio::spawn(async move {
        if let Some(reply) = commands.handle(&request).await {
            rest.deliver(&request.reply_target, &reply).await;
        }
    });
}
