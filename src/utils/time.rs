use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc, Weekday};

/// Out-of-range offsets fall back to UTC.
pub fn offset_from_hours(hours: i32) -> FixedOffset {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

pub fn local_date(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&offset).date_naive()
}

/// UTC bounds of the local calendar day containing `timestamp`, end inclusive.
pub fn local_day_bounds(timestamp: DateTime<Utc>, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_date(timestamp, offset).and_time(NaiveTime::MIN) - offset;
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (start.and_utc(), end.and_utc())
}

pub fn is_weekend(timestamp: DateTime<Utc>, offset: FixedOffset) -> bool {
    matches!(
        timestamp.with_timezone(&offset).weekday(),
        Weekday::Sat | Weekday::Sun
    )
}

pub fn format_time(datetime: DateTime<Utc>, offset: FixedOffset) -> String {
    datetime.with_timezone(&offset).format("%H:%M").to_string()
}

pub fn format_datetime(datetime: DateTime<Utc>, offset: FixedOffset) -> String {
    datetime.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Whole minutes between two instants, never negative.
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    end.signed_duration_since(start).num_minutes().max(0)
}

pub fn split_hours_minutes(minutes: i64) -> (i64, i64) {
    (minutes / 60, minutes % 60)
}

/// `"{h}hours {m}minutes"`, hours under one shown as 0.
pub fn format_worked_long(minutes: i64) -> String {
    let (hours, mins) = split_hours_minutes(minutes);
    format!("{}hours {}minutes", hours, mins)
}

/// `"{h}h {m}m"`
pub fn format_worked_short(minutes: i64) -> String {
    let (hours, mins) = split_hours_minutes(minutes);
    format!("{}h {}m", hours, mins)
}
