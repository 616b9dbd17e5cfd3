use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway discovery failed: {0}")]
    Discovery(String),

    #[error("could not connect to gateway: {0}")]
    Connection(String),

    #[error("gateway connection is closed, frame not sent")]
    Send,

    #[error("timed out waiting for Hello")]
    HelloTimeout,

    #[error("gateway protocol error: {0}")]
    Protocol(String),

    #[error("gateway rejected the bot token (close code 4004)")]
    AuthenticationFailed,

    #[error("gateway closed with unrecoverable code {0}")]
    UnrecoverableClose(u16),

    #[error("gave up after {0} reconnect attempts")]
    ReconnectExhausted(u32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Errors that reconnecting cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Discovery(_)
                | Self::AuthenticationFailed
                | Self::UnrecoverableClose(_)
                | Self::ReconnectExhausted(_)
        )
    }
}
