//! Gateway URL discovery.

use reqwest::StatusCode;
use tracing::info;

use super::error::GatewayError;
use super::protocol::GatewayBotResponse;

pub const GATEWAY_QUERY: &str = "v=10&encoding=json";

/// Looks up the gateway URL with `GET {api_base}/gateway/bot` and appends the
/// protocol version and encoding.
pub async fn resolve_gateway(
    http: &reqwest::Client,
    api_base: &str,
    token: &str,
) -> Result<String, GatewayError> {
    if token.trim().is_empty() {
        return Err(GatewayError::Discovery("bot token is not configured".into()));
    }

    let response = http
        .get(format!("{}/gateway/bot", api_base))
        .header("Authorization", format!("Bot {}", token))
        .send()
        .await
        .map_err(|e| GatewayError::Discovery(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(GatewayError::Discovery("bot token was rejected (401)".into()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Discovery(format!("{} - {}", status, body)));
    }

    let body: GatewayBotResponse = response
        .json()
        .await
        .map_err(|e| GatewayError::Discovery(format!("unexpected response: {}", e)))?;

    let url = gateway_url(&body.url);
    info!(url = %url, "Resolved gateway URL");
    Ok(url)
}

/// `wss://host` -> `wss://host/?v=10&encoding=json`. URLs that already carry
/// a query are returned unchanged.
pub fn gateway_url(base: &str) -> String {
    if base.contains('?') {
        return base.to_string();
    }
    format!("{}/?{}", base.trim_end_matches('/'), GATEWAY_QUERY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_version_and_encoding() {
        assert_eq!(
            gateway_url("wss://gateway.discord.gg"),
            "wss://gateway.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(
            gateway_url("wss://gateway.discord.gg/"),
            "wss://gateway.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(gateway_url("ws://localhost:1/?v=9"), "ws://localhost:1/?v=9");
    }

    #[tokio::test]
    async fn missing_token_fails_without_a_request() {
        let http = reqwest::Client::new();
        let err = resolve_gateway(&http, "http://127.0.0.1:9", "  ").await.unwrap_err();
        assert!(matches!(err, GatewayError::Discovery(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_discovery_error() {
        let http = reqwest::Client::new();
        let err = resolve_gateway(&http, "http://127.0.0.1:9", "tok").await.unwrap_err();
        assert!(matches!(err, GatewayError::Discovery(_)));
    }
}
