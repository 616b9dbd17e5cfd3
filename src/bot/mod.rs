pub mod commands;
pub mod dispatcher;
pub mod events;
pub mod handlers;
pub mod reply;
pub mod rest;

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::database::{self, SqliteStore};
use crate::gateway::GatewayClient;
use crate::gateway::discovery::resolve_gateway;
use crate::report::{DisabledReports, GithubReporter, ReportGenerator};
use commands::AttendanceCommands;
use handlers::EventHandler;
use rest::RestClient;

pub async fn create_bot(config: Config) -> Result<GatewayClient> {
    let pool = database::create_connection(&config.database_url).await?;
    let store = SqliteStore::new(pool);

    let http = reqwest::Client::new();
    let offset = config.utc_offset();

    let reports: Arc<dyn ReportGenerator> = match &config.github {
        Some(github) => {
            tracing::info!(repo = %github.repo, "Commit reports enabled");
            Arc::new(GithubReporter::new(http.clone(), github, offset))
        }
        None => Arc::new(DisabledReports),
    };

    let commands = AttendanceCommands::new(Arc::new(store), reports, offset);
    let rest = RestClient::new(http.clone(), &config.api_base, &config.discord_token);
    let handler = EventHandler::new(Arc::new(commands), rest);

    let gateway_url = resolve_gateway(&http, &config.api_base, &config.discord_token).await?;

    Ok(GatewayClient::new(
        &config.discord_token,
        config.intents,
        gateway_url,
        &config.reconnect,
        Arc::new(handler),
    ))
}
