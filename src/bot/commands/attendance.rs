use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use tracing::{info, warn};

use crate::bot::dispatcher::CommandRequest;
use crate::bot::reply::Reply;
use crate::database::AttendanceStore;
use crate::database::models::CheckinOutcome;
use crate::report::{ReportGenerator, ReportPayload};
use crate::utils::format::{format_error_message, format_success_message, format_warning_message};
use crate::utils::time::{format_time, format_worked_long, local_date};

pub async fn checkin(
    store: &dyn AttendanceStore,
    request: &CommandRequest,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Reply> {
    let date = local_date(now, offset);
    let username = &request.username;

    let content = match store.check_in(&request.user_id, username, date, now).await? {
        CheckinOutcome::AlreadyCheckedIn(existing) => format_warning_message(&format!(
            "{}, you're already checked in today at {}!",
            username,
            format_time(existing.checkin_at, offset)
        )),
        CheckinOutcome::Created(created) => {
            info!(user_id = %request.user_id, id = created.id, "Checked in");
            format_success_message(&format!(
                "{} checked in successfully at {}! Have a productive day! 🚀",
                username,
                format_time(now, offset)
            ))
        }
    };

    Ok(Reply::text(content))
}

pub async fn checkout(
    store: &dyn AttendanceStore,
    reports: &dyn ReportGenerator,
    request: &CommandRequest,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Reply> {
    let username = &request.username;

    // A failing report must not block the checkout.
    let report = match reports.generate_report(&request.user_id).await {
        Ok(report) => report,
        Err(e) => {
            warn!(user_id = %request.user_id, error = %e, "Commit report unavailable");
            ReportPayload::default()
        }
    };

    let date = local_date(now, offset);
    let Some(closed) = store.check_out(&request.user_id, date, now).await? else {
        let mut content = format_error_message(&format!(
            "{}, you haven't checked in today or already checked out!",
            username
        ));
        if report.is_empty() {
            content.push_str("\n\n You have not commit anything yet.🥀");
        }
        return Ok(with_report(Reply::text(content), report));
    };

    info!(user_id = %request.user_id, id = closed.id, "Checked out");

    let content = format_success_message(&format!(
        "{} checked out at {}!\n⏱️ Total time worked: {}\n\nGreat work today! 🎉",
        username,
        format_time(now, offset),
        format_worked_long(closed.worked_minutes())
    ));

    Ok(with_report(Reply::text(content), report))
}

fn with_report(mut reply: Reply, report: ReportPayload) -> Reply {
    if let Some(report_content) = report.content.filter(|c| !c.is_empty()) {
        reply.append_line(&format!("\n\n{}", report_content));
    }
    reply.embeds.extend(report.embeds);
    reply
}
