use crate::database::models::UserCheckin;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

const CHECKIN_COLUMNS: &str = "id, discord_user_id, username, checkin_date, checkin_at, checkout_at, \
     work_notes, created_at, updated_at";

/// Inserts a check-in unless the user already has an open one on `date`.
/// Returns `None` when the open check-in constraint rejected the row.
pub async fn insert_checkin_if_none_open(
    pool: &SqlitePool,
    discord_user_id: &str,
    username: &str,
    date: NaiveDate,
    checkin_at: DateTime<Utc>,
) -> Result<Option<UserCheckin>> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO user_checkins
             (discord_user_id, username, checkin_date, checkin_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(discord_user_id)
    .bind(username)
    .bind(date)
    .bind(checkin_at)
    .bind(checkin_at)
    .bind(checkin_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let checkin = get_checkin_by_id(pool, result.last_insert_rowid()).await?;
    Ok(Some(checkin))
}

pub async fn get_checkin_by_id(pool: &SqlitePool, checkin_id: i64) -> Result<UserCheckin> {
    let checkin = sqlx::query_as::<_, UserCheckin>(&format!(
        "SELECT {} FROM user_checkins WHERE id = ?",
        CHECKIN_COLUMNS
    ))
    .bind(checkin_id)
    .fetch_one(pool)
    .await?;

    Ok(checkin)
}

pub async fn get_open_checkin(
    pool: &SqlitePool,
    discord_user_id: &str,
    date: NaiveDate,
) -> Result<Option<UserCheckin>> {
    let checkin = sqlx::query_as::<_, UserCheckin>(&format!(
        "SELECT {} FROM user_checkins
         WHERE discord_user_id = ? AND checkin_date = ? AND checkout_at IS NULL
         ORDER BY checkin_at DESC
         LIMIT 1",
        CHECKIN_COLUMNS
    ))
    .bind(discord_user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(checkin)
}

pub async fn get_latest_checkin(
    pool: &SqlitePool,
    discord_user_id: &str,
    date: NaiveDate,
) -> Result<Option<UserCheckin>> {
    let checkin = sqlx::query_as::<_, UserCheckin>(&format!(
        "SELECT {} FROM user_checkins
         WHERE discord_user_id = ? AND checkin_date = ?
         ORDER BY checkin_at DESC, id DESC
         LIMIT 1",
        CHECKIN_COLUMNS
    ))
    .bind(discord_user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(checkin)
}

/// Sets `checkout_at` on a still-open check-in. Returns `None` if it was
/// already closed.
pub async fn close_checkin(
    pool: &SqlitePool,
    checkin_id: i64,
    checkout_at: DateTime<Utc>,
) -> Result<Option<UserCheckin>> {
    let result = sqlx::query(
        "UPDATE user_checkins
         SET checkout_at = ?, updated_at = ?
         WHERE id = ? AND checkout_at IS NULL",
    )
    .bind(checkout_at)
    .bind(checkout_at)
    .bind(checkin_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let checkin = get_checkin_by_id(pool, checkin_id).await?;
    Ok(Some(checkin))
}
