//! Expiration classification.
//!
//! Days are counted between calendar dates in the caller's time zone, so a
//! document expiring at 08:00 tomorrow is "1 day" away at 23:59 today.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// Days before expiration at which a document becomes urgent.
pub const DANGER_DAYS: i64 = 7;

/// Days before expiration at which a document starts needing attention.
pub const WARNING_DAYS: i64 = 30;

/// How close an expiring document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// One week or less.
    Danger,
    /// Within the warning window.
    Warning,
}

/// Status of a document relative to its expiration date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationStatus {
    /// Past its expiration date.
    Expired,
    /// Expires today.
    ExpiringToday,
    /// Expires within the warning window.
    ExpiringSoon(Urgency),
    /// Nothing to worry about yet.
    Valid,
}

impl ExpirationStatus {
    /// Severity rank, higher is more severe.
    #[must_use]
    pub fn severity(self) -> u8 {
        match self {
            Self::Valid => 0,
            Self::ExpiringSoon(Urgency::Warning) => 1,
            Self::ExpiringSoon(Urgency::Danger) => 2,
            Self::ExpiringToday => 3,
            Self::Expired => 4,
        }
    }

    /// Whether the document needs the user's attention.
    #[must_use]
    pub fn needs_attention(self) -> bool {
        !matches!(self, Self::Valid)
    }

    fn from_days(days: i64) -> Self {
        match days {
            d if d < 0 => Self::Expired,
            0 => Self::ExpiringToday,
            d if d <= DANGER_DAYS => Self::ExpiringSoon(Urgency::Danger),
            d if d <= WARNING_DAYS => Self::ExpiringSoon(Urgency::Warning),
            _ => Self::Valid,
        }
    }
}

impl std::fmt::Display for ExpirationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::ExpiringToday => write!(f, "expires-today"),
            Self::ExpiringSoon(Urgency::Danger) => write!(f, "expires-soon"),
            Self::ExpiringSoon(Urgency::Warning) => write!(f, "expiring"),
            Self::Valid => write!(f, "valid"),
        }
    }
}

/// Result of classifying an expiration date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Expiration {
    /// Calendar days until expiration; negative once expired.
    pub days_until_expiration: i64,
    /// Derived status.
    pub status: ExpirationStatus,
}

impl Expiration {
    /// Human-readable description, e.g. "expires in 3 day(s)".
    #[must_use]
    pub fn describe(&self) -> String {
        match self.status {
            ExpirationStatus::Expired => {
                format!("expired {} day(s) ago", self.days_until_expiration.abs())
            }
            ExpirationStatus::ExpiringToday => "expires today".to_string(),
            _ => format!("expires in {} day(s)", self.days_until_expiration),
        }
    }
}

/// Classify `expires_at` relative to `now`.
///
/// Both instants are truncated to calendar dates in `now`'s time zone.
pub fn classify<Tz: TimeZone>(expires_at: &DateTime<Utc>, now: &DateTime<Tz>) -> Expiration {
    let days = days_until(expires_at, now);
    Expiration {
        days_until_expiration: days,
        status: ExpirationStatus::from_days(days),
    }
}

/// Calendar days between `now` and `expires_at` in `now`'s time zone.
pub fn days_until<Tz: TimeZone>(expires_at: &DateTime<Utc>, now: &DateTime<Tz>) -> i64 {
    let today = now.date_naive();
    let expiry_day = expires_at.with_timezone(&now.timezone()).date_naive();
    (expiry_day - today).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_thresholds() {
        let now = at(2024, 6, 1, 12);
        let cases = [
            (-3, ExpirationStatus::Expired),
            (-1, ExpirationStatus::Expired),
            (0, ExpirationStatus::ExpiringToday),
            (1, ExpirationStatus::ExpiringSoon(Urgency::Danger)),
            (7, ExpirationStatus::ExpiringSoon(Urgency::Danger)),
            (8, ExpirationStatus::ExpiringSoon(Urgency::Warning)),
            (30, ExpirationStatus::ExpiringSoon(Urgency::Warning)),
            (31, ExpirationStatus::Valid),
        ];
        for (days, expected) in cases {
            let result = classify(&(now + Duration::days(days)), &now);
            assert_eq!(result.days_until_expiration, days, "days={days}");
            assert_eq!(result.status, expected, "days={days}");
        }
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        let now = at(2024, 6, 1, 23);
        let expires = at(2024, 6, 2, 1);
        assert_eq!(classify(&expires, &now).days_until_expiration, 1);

        let late_today = at(2024, 6, 1, 23) + Duration::minutes(59);
        let early = at(2024, 6, 1, 0);
        assert_eq!(classify(&late_today, &early).days_until_expiration, 0);
    }

    #[test]
    fn test_uses_callers_time_zone() {
        // 23:30 UTC on June 1st is already June 2nd at UTC+2.
        let expires = at(2024, 6, 1, 23) + Duration::minutes(30);
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(classify(&expires, &now).days_until_expiration, 1);
        assert_eq!(classify(&expires, &now.with_timezone(&Utc)).days_until_expiration, 0);
    }

    #[test]
    fn test_monotonic_over_time() {
        let expires = at(2024, 6, 20, 10);
        let mut now = at(2024, 6, 1, 8);
        let mut previous = classify(&expires, &now);
        for _ in 0..40 {
            now += Duration::days(1);
            let current = classify(&expires, &now);
            assert_eq!(current.days_until_expiration, previous.days_until_expiration - 1);
            assert!(current.status.severity() >= previous.status.severity());
            previous = current;
        }
        assert_eq!(previous.status, ExpirationStatus::Expired);
    }

    #[test]
    fn test_describe() {
        let now = at(2024, 6, 1, 12);
        assert_eq!(classify(&(now - Duration::days(2)), &now).describe(), "expired 2 day(s) ago");
        assert_eq!(classify(&now, &now).describe(), "expires today");
        assert_eq!(classify(&(now + Duration::days(5)), &now).describe(), "expires in 5 day(s)");
    }

    #[test]
    fn test_needs_attention() {
        assert!(ExpirationStatus::Expired.needs_attention());
        assert!(ExpirationStatus::ExpiringSoon(Urgency::Warning).needs_attention());
        assert!(!ExpirationStatus::Valid.needs_attention());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ExpirationStatus::Expired.to_string(), "expired");
        assert_eq!(ExpirationStatus::ExpiringToday.to_string(), "expires-today");
        assert_eq!(ExpirationStatus::Valid.to_string(), "valid");
    }
}
