use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};

use crate::bot::dispatcher::CommandRequest;
use crate::bot::reply::Reply;
use crate::database::AttendanceStore;
use crate::utils::format::format_status_message;
use crate::utils::time::{elapsed_minutes, format_time, format_worked_short, local_date};

/// Today's most recent check-in for the user.
pub async fn status(
    store: &dyn AttendanceStore,
    request: &CommandRequest,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Reply> {
    let username = &request.username;
    let date = local_date(now, offset);

    let content = match store.latest_checkin(&request.user_id, date).await? {
        None => format!(
            "{}, you haven't checked in today yet. Use `checkin` to start your day!",
            username
        ),
        Some(checkin) if !checkin.is_checked_in() => format!(
            "**{}'s Status:** Already checked out\n⏱️ Total time worked: {}",
            username,
            format_worked_short(checkin.worked_minutes())
        ),
        Some(checkin) => format!(
            "**{}'s Status:** Currently checked in\n🕐 Checked in at: {}\n⏱️ Time elapsed: {}",
            username,
            format_time(checkin.checkin_at, offset),
            format_worked_short(elapsed_minutes(checkin.checkin_at, now))
        ),
    };

    Ok(Reply::text(format_status_message(&content)))
}

#[cfg(test)]
mod tests {
    use crate::bot::commands::test_support::*;

    #[tokio::test]
    async fn status_before_checkin() {
        let commands = commands().await;
        let reply = commands.run(&message("status"), local(8, 0)).await;
        assert_eq!(
            content(&reply),
            "📊 alice, you haven't checked in today yet. Use `checkin` to start your day!"
        );
    }

    #[tokio::test]
    async fn status_while_checked_in() {
        let commands = commands().await;
        commands.run(&message("checkin"), local(9, 0)).await;

        let reply = commands.run(&interaction("status"), local(10, 30)).await;
        assert_eq!(
            content(&reply),
            "📊 **alice's Status:** Currently checked in\n🕐 Checked in at: 09:00\n⏱️ Time elapsed: 1h 30m"
        );
    }

    #[tokio::test]
    async fn status_after_checkout() {
        let commands = commands().await;
        commands.run(&message("checkin"), local(9, 0)).await;
        commands.run(&message("checkout"), local(9, 40)).await;

        let reply = commands.run(&message("status"), local(12, 0)).await;
        assert_eq!(
            content(&reply),
            "📊 **alice's Status:** Already checked out\n⏱️ Total time worked: 0h 40m"
        );
    }

    #[tokio::test]
    async fn status_is_per_local_day() {
        let commands = commands().await;
        commands.run(&message("checkin"), local(9, 0)).await;

        // 00:30 the next day at UTC+8
        let next_day = local(9, 0) + chrono::Duration::minutes(15 * 60 + 30);
        let reply = commands.run(&message("status"), next_day).await;
        assert!(content(&reply).contains("haven't checked in today yet"));
    }
}
