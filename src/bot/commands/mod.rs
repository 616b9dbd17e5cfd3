pub mod attendance;
pub mod status;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tracing::{error, info};

use crate::bot::dispatcher::{CommandRequest, ReplyTarget};
use crate::bot::reply::Reply;
use crate::database::AttendanceStore;
use crate::report::ReportGenerator;
use crate::utils::format::format_error_message;

#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// `None` means the command is answered with silence.
    async fn handle(&self, request: &CommandRequest) -> Option<Reply>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Checkin,
    Checkout,
    Status,
    Ping,
}

impl Command {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "checkin" => Some(Self::Checkin),
            "checkout" => Some(Self::Checkout),
            "status" => Some(Self::Status),
            "ping" => Some(Self::Ping),
            _ => None,
        }
    }
}

pub struct AttendanceCommands {
    store: Arc<dyn AttendanceStore>,
    reports: Arc<dyn ReportGenerator>,
    offset: FixedOffset,
}

impl AttendanceCommands {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        reports: Arc<dyn ReportGenerator>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            reports,
            offset,
        }
    }

    pub async fn run(&self, request: &CommandRequest, now: DateTime<Utc>) -> Option<Reply> {
        let Some(command) = Command::parse(&request.command_name) else {
            return unknown_command(request);
        };

        info!(
            command = %request.command_name,
            user = %request.username,
            "Handling command"
        );

        let result = match command {
            Command::Checkin => attendance::checkin(self.store.as_ref(), request, now, self.offset).await,
            Command::Checkout => {
                attendance::checkout(
                    self.store.as_ref(),
                    self.reports.as_ref(),
                    request,
                    now,
                    self.offset,
                )
                .await
            }
            Command::Status => status::status(self.store.as_ref(), request, now, self.offset).await,
            Command::Ping => Ok(ping(&request.reply_target)),
        };

        match result {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!(
                    command = %request.command_name,
                    user_id = %request.user_id,
                    error = ?e,
                    "Command failed"
                );
                Some(Reply::text(format_error_message(
                    "Command failed, please try again later.",
                )))
            }
        }
    }
}

#[async_trait]
impl CommandHandler for AttendanceCommands {
    async fn handle(&self, request: &CommandRequest) -> Option<Reply> {
        self.run(request, Utc::now()).await
    }
}

fn ping(target: &ReplyTarget) -> Reply {
    match target {
        ReplyTarget::Channel { .. } => Reply::text("Pong"),
        ReplyTarget::Interaction { .. } => Reply::text("🏓 Pong! Bot is working perfectly!"),
    }
}

/// Slash commands always get an answer, unknown `!` messages are ignored.
fn unknown_command(request: &CommandRequest) -> Option<Reply> {
    match request.reply_target {
        ReplyTarget::Interaction { .. } => Some(Reply::text(format_error_message(&format!(
            "Unknown command: /{}",
            request.command_name
        )))),
        ReplyTarget::Channel { .. } => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::database::{SqliteStore, create_in_memory};
    use crate::report::{ReportError, ReportPayload};
    use crate::utils::time::offset_from_hours;

    pub struct FakeReports {
        pub payload: ReportPayload,
        pub fail: bool,
    }

    #[async_trait]
    impl ReportGenerator for FakeReports {
        async fn generate_report(&self, _user_id: &str) -> Result<ReportPayload, ReportError> {
            if self.fail {
                return Err(ReportError::Api {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(self.payload.clone())
        }
    }

    pub async fn commands_with(reports: FakeReports) -> AttendanceCommands {
        let store = SqliteStore::new(create_in_memory().await.unwrap());
        AttendanceCommands::new(Arc::new(store), Arc::new(reports), offset_from_hours(8))
    }

    pub async fn commands() -> AttendanceCommands {
        commands_with(FakeReports {
            payload: ReportPayload::default(),
            fail: false,
        })
        .await
    }

    pub fn message(name: &str) -> CommandRequest {
        CommandRequest {
            command_name: name.into(),
            user_id: "u1".into(),
            username: "alice".into(),
            reply_target: ReplyTarget::Channel {
                channel_id: "c1".into(),
            },
        }
    }

    pub fn interaction(name: &str) -> CommandRequest {
        CommandRequest {
            reply_target: ReplyTarget::Interaction {
                id: "i1".into(),
                token: "tok".into(),
            },
            ..message(name)
        }
    }

    /// `HH:MM` on 2026-03-03 at UTC+8.
    pub fn local(hour: u32, minute: u32) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("2026-03-03T{:02}:{:02}:00+08:00", hour, minute))
            .unwrap()
            .to_utc()
    }

    pub fn content(reply: &Option<Reply>) -> &str {
        reply.as_ref().and_then(|r| r.content.as_deref()).unwrap_or_default()
    }
}
