//! Outbound Discord REST calls for replies.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::dispatcher::ReplyTarget;
use super::reply::Reply;

/// Interaction callback type that answers with a message.
pub const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord API error: {status} - {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct InteractionCallback<'a> {
    #[serde(rename = "type")]
    kind: u8,
    data: &'a Reply,
}

#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl RestClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            token: token.into(),
        }
    }

    pub async fn send_channel_message(&self, channel_id: &str, reply: &Reply) -> Result<(), RestError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        self.post(&url, reply).await
    }

    pub async fn send_interaction_response(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        reply: &Reply,
    ) -> Result<(), RestError> {
        let url = format!(
            "{}/interactions/{}/{}/callback",
            self.api_base, interaction_id, interaction_token
        );
        self.post(&url, &interaction_callback(reply)).await
    }

    /// Sends `reply` to where the command came from. Failures are logged and
    /// dropped.
    pub async fn deliver(&self, target: &ReplyTarget, reply: &Reply) {
        let result = match target {
            ReplyTarget::Channel { channel_id } => self.send_channel_message(channel_id, reply).await,
            ReplyTarget::Interaction { id, token } => {
                self.send_interaction_response(id, token, reply).await
            }
        };

        match result {
            Ok(()) => debug!(?target, "Reply delivered"),
            Err(e) => warn!(?target, error = %e, "Reply could not be delivered"),
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<(), RestError> {
        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

fn interaction_callback(reply: &Reply) -> InteractionCallback<'_> {
    InteractionCallback {
        kind: CHANNEL_MESSAGE_WITH_SOURCE,
        data: reply,
    }
}
