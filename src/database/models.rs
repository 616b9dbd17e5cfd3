use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserCheckin {
    pub id: i64,
    pub discord_user_id: String,
    pub username: String,
    /// Local calendar day of `checkin_at`
    pub checkin_date: NaiveDate,
    pub checkin_at: DateTime<Utc>,
    pub checkout_at: Option<DateTime<Utc>>,
    pub work_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserCheckin {
    pub fn is_checked_in(&self) -> bool {
        self.checkout_at.is_none()
    }

    /// Minutes between check-in and check-out, 0 while still open.
    pub fn worked_minutes(&self) -> i64 {
        match self.checkout_at {
            Some(checkout_at) => crate::utils::time::elapsed_minutes(self.checkin_at, checkout_at),
            None => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CheckinOutcome {
    Created(UserCheckin),
    AlreadyCheckedIn(UserCheckin),
}
