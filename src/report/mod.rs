//! Daily commit reports attached to checkout replies.

pub mod github;

use async_trait::async_trait;
use thiserror::Error;

use crate::bot::reply::Reply;

pub use github::GithubReporter;

/// A report is rendered the same way as any other reply.
pub type ReportPayload = Reply;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {body}")]
    Api { status: u16, body: String },
}

#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Today's report for a Discord user. An empty payload means there is
    /// nothing to attach.
    async fn generate_report(&self, user_id: &str) -> Result<ReportPayload, ReportError>;
}

/// Used when no GitHub repository is configured.
pub struct DisabledReports;

#[async_trait]
impl ReportGenerator for DisabledReports {
    async fn generate_report(&self, _user_id: &str) -> Result<ReportPayload, ReportError> {
        Ok(ReportPayload::default())
    }
}
