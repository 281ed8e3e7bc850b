use chrono::NaiveDate;
use serde::Serialize;
use strum_macros::AsRefStr;
use utoipa::ToSchema;

/// Items expiring within this many days (or already expired) raise an alert.
pub const ALERT_WINDOW_DAYS: i64 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExpiryStatus {
    /// No expiry date on file.
    Neutral,
    Ok,
    Warning,
    Overdue,
}

pub fn days_left(expiry: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    expiry.map(|d| (d - today).num_days())
}

pub fn classify(days_left: Option<i64>) -> ExpiryStatus {
    match days_left {
        None => ExpiryStatus::Neutral,
        Some(d) if d > ALERT_WINDOW_DAYS => ExpiryStatus::Ok,
        Some(d) if d >= 1 => ExpiryStatus::Warning,
        Some(_) => ExpiryStatus::Overdue,
    }
}

pub fn status_of(expiry: Option<NaiveDate>, today: NaiveDate) -> ExpiryStatus {
    classify(days_left(expiry, today))
}

/// No lower bound: expired items stay in the window.
pub fn in_alert_window(days_left: i64) -> bool {
    days_left <= ALERT_WINDOW_DAYS
}
