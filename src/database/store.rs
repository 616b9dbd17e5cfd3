use crate::database::models::{CheckinOutcome, UserCheckin};
use crate::database::queries;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

/// Check-in bookkeeping keyed by Discord user id and local day.
///
/// Implementations must keep at most one open check-in per user per day,
/// even when commands for the same user race.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn latest_checkin(&self, user_id: &str, date: NaiveDate) -> Result<Option<UserCheckin>>;

    async fn check_in(
        &self,
        user_id: &str,
        username: &str,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<CheckinOutcome>;

    /// Closes the open check-in for `date`, if any.
    async fn check_out(
        &self,
        user_id: &str,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<Option<UserCheckin>>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for SqliteStore {
    async fn latest_checkin(&self, user_id: &str, date: NaiveDate) -> Result<Option<UserCheckin>> {
        queries::get_latest_checkin(&self.pool, user_id, date).await
    }

    async fn check_in(
        &self,
        user_id: &str,
        username: &str,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<CheckinOutcome> {
        // The open check-in can be closed between the rejected insert and the
        // lookup, so retry once before giving up.
        for _ in 0..2 {
            if let Some(created) =
                queries::insert_checkin_if_none_open(&self.pool, user_id, username, date, at).await?
            {
                return Ok(CheckinOutcome::Created(created));
            }

            if let Some(existing) = queries::get_open_checkin(&self.pool, user_id, date).await? {
                return Ok(CheckinOutcome::AlreadyCheckedIn(existing));
            }
        }

        anyhow::bail!("check-in for {} kept conflicting with a concurrent checkout", user_id)
    }

    async fn check_out(
        &self,
        user_id: &str,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<Option<UserCheckin>> {
        let Some(open) = queries::get_open_checkin(&self.pool, user_id, date).await? else {
            return Ok(None);
        };

        queries::close_checkin(&self.pool, open.id, at).await
    }
}
