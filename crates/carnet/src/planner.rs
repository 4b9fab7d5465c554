//! Reminder planning.
//!
//! [`plan`] is a pure function from documents, settings and the current
//! instant to the complete set of reminders that should exist. The scheduler
//! diffs its output against what is actually scheduled.

use std::collections::HashSet;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::expiration;
use crate::model::Document;
use crate::settings::NotificationSettings;

/// Title used for every expiration reminder.
pub const REMINDER_TITLE: &str = "Document expiring soon";

/// A reminder that must be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReminderRequest {
    /// Document the reminder is about.
    pub document_id: i64,
    /// Document category, for the message.
    pub document_type: String,
    /// Vehicle plate, for the message.
    pub vehicle_plate: String,
    /// When the reminder fires.
    pub fires_at: DateTime<Utc>,
    /// Hour of day the reminder was planned for.
    pub hour: u8,
    /// Days-before-expiry interval that produced this reminder.
    pub offset: u16,
    /// Days until expiration announced by the reminder.
    pub days_until_expiration: i64,
}

impl ReminderRequest {
    /// Notification title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        REMINDER_TITLE
    }

    /// Notification body.
    #[must_use]
    pub fn body(&self) -> String {
        reminder_message(
            &self.document_type,
            &self.vehicle_plate,
            self.days_until_expiration,
        )
    }
}

/// Message announcing that a document expires in `days` days.
#[must_use]
pub fn reminder_message(document_type: &str, vehicle_plate: &str, days: i64) -> String {
    match days {
        d if d <= 0 => format!("{document_type} for {vehicle_plate} expires today!"),
        1 => format!("{document_type} for {vehicle_plate} expires tomorrow!"),
        d => format!("{document_type} for {vehicle_plate} expires in {d} days"),
    }
}

/// Compute every reminder that should be scheduled at `now`.
///
/// Inactive documents, expired documents and documents outside the lead
/// window produce nothing. Each remaining document gets one reminder per
/// `(interval, hour)` pair whose interval does not exceed the days left,
/// skipping instants that are not strictly in the future. Local times are
/// resolved in `now`'s time zone.
///
/// The result is deduplicated on `(document_id, fires_at)` and sorted by
/// firing time, then document id.
pub fn plan<Tz: TimeZone>(
    documents: &[Document],
    settings: &NotificationSettings,
    now: &DateTime<Tz>,
) -> Vec<ReminderRequest> {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);
    let window = i64::from(settings.notification_days);

    let mut seen = HashSet::new();
    let mut requests = Vec::new();

    for document in documents.iter().filter(|d| d.active) {
        let Some(document_id) = document.id else {
            debug!("Skipping unsaved document for {}", document.vehicle_plate);
            continue;
        };

        let days = expiration::days_until(&document.expires_at, now);
        if days <= 0 || days > window {
            trace!("Document {document_id} outside lead window ({days} days)");
            continue;
        }

        let expiry_day = document.expires_at.with_timezone(&tz).date_naive();
        for &offset in &settings.notification_intervals {
            if days < i64::from(offset) {
                continue;
            }
            let Some(day) = expiry_day.checked_sub_days(Days::new(u64::from(offset))) else {
                continue;
            };
            // Days left on the firing day: the day-of reminder says "today".
            let announced = (expiry_day - day).num_days();

            for &hour in &settings.notification_hours {
                let Some(fires_at) = local_instant(&tz, day, hour) else {
                    debug!("No local time {day} {hour}:00 for document {document_id}");
                    continue;
                };
                if fires_at <= now_utc || !seen.insert((document_id, fires_at)) {
                    continue;
                }
                requests.push(ReminderRequest {
                    document_id,
                    document_type: document.document_type.clone(),
                    vehicle_plate: document.vehicle_plate.clone(),
                    fires_at,
                    hour,
                    offset,
                    days_until_expiration: announced,
                });
            }
        }
    }

    requests.sort_by(|a, b| {
        a.fires_at
            .cmp(&b.fires_at)
            .then(a.document_id.cmp(&b.document_id))
    });
    requests
}

/// `day` at `hour:00:00` in `tz`. Gaps yield `None`, folds the earliest instant.
fn local_instant<Tz: TimeZone>(tz: &Tz, day: NaiveDate, hour: u8) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(u32::from(hour), 0, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap()
    }

    fn doc(id: i64, expires_in_days: i64) -> Document {
        let n = now();
        Document::new("Assurance", "AB-123-CD", n - Duration::days(300), n + Duration::days(expires_in_days))
            .with_id(id)
    }

    fn settings(hours: &[u8], intervals: &[u16]) -> NotificationSettings {
        NotificationSettings {
            notification_days: 30,
            notification_hours: hours.to_vec(),
            notification_intervals: intervals.to_vec(),
            enabled: true,
        }
    }

    fn at(days_from_now: i64, hour: u32) -> DateTime<Utc> {
        let day = (now() + Duration::days(days_from_now)).date_naive();
        day.and_hms_opt(hour, 0, 0).unwrap().and_utc()
    }

    #[test]
    fn test_inactive_documents_are_never_planned() {
        let documents: Vec<_> = [1, 3, 7, 20]
            .iter()
            .enumerate()
            .map(|(i, d)| doc(i as i64 + 1, *d).with_active(false))
            .collect();
        assert!(plan(&documents, &NotificationSettings::default(), &now()).is_empty());
    }

    #[test]
    fn test_expired_and_today_documents_are_not_planned() {
        let documents = vec![doc(1, -1), doc(2, -30), doc(3, 0)];
        assert!(plan(&documents, &NotificationSettings::default(), &now()).is_empty());
    }

    #[test]
    fn test_outside_lead_window_is_not_planned() {
        let mut s = NotificationSettings::default();
        s.notification_days = 10;
        assert!(plan(&[doc(1, 11)], &s, &now()).is_empty());
        assert!(!plan(&[doc(1, 10)], &s, &now()).is_empty());
    }

    #[test]
    fn test_unsaved_documents_are_skipped() {
        let mut d = doc(1, 3);
        d.id = None;
        assert!(plan(&[d], &NotificationSettings::default(), &now()).is_empty());
    }

    #[test]
    fn test_request_count_matches_qualifying_offsets() {
        let s = settings(&[9, 18], &[7, 3, 1, 0]);
        for d in 1..=30 {
            let qualifying = [7, 3, 1, 0].iter().filter(|o| **o <= d).count();
            let requests = plan(&[doc(1, d)], &s, &now());
            assert_eq!(requests.len(), 2 * qualifying, "d={d}");
            assert!(requests.iter().all(|r| r.fires_at > now()));
        }
    }

    #[test]
    fn test_five_days_out_single_hour() {
        let s = settings(&[9], &[7, 3, 1, 0]);
        let requests = plan(&[doc(1, 5)], &s, &now());

        let instants: Vec<_> = requests.iter().map(|r| r.fires_at).collect();
        assert_eq!(instants, vec![at(2, 9), at(4, 9), at(5, 9)]);

        let offsets: Vec<_> = requests.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![3, 1, 0]);
    }

    #[test]
    fn test_announced_days() {
        let s = settings(&[9], &[3, 0]);
        let requests = plan(&[doc(1, 5)], &s, &now());
        assert_eq!(requests[0].days_until_expiration, 3);
        assert_eq!(requests[1].offset, 0);
        assert_eq!(requests[1].days_until_expiration, 0);
    }

    #[test]
    fn test_day_of_reminder_says_today() {
        let s = settings(&[9], &[0]);
        let requests = plan(&[doc(1, 5)], &s, &now());
        assert_eq!(requests.len(), 1);

        let request = &requests[0];
        assert_eq!(request.fires_at, at(5, 9));
        assert_eq!(
            request.fires_at.date_naive(),
            doc(1, 5).expires_at.date_naive()
        );
        assert!(request.body().ends_with("expires today!"), "{}", request.body());
    }

    #[test]
    fn test_past_instants_are_dropped() {
        // At 10:00 the 09:00 slot for today is gone, 18:00 is still ahead.
        let late = now() + Duration::hours(4);
        let s = settings(&[9, 18], &[3]);
        let requests = plan(&[doc(1, 3)], &s, &late);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].fires_at, at(0, 18));
    }

    #[test]
    fn test_firing_exactly_now_is_dropped() {
        let nine = at(0, 9);
        let s = settings(&[9], &[2]);
        let d = Document::new("Vignette", "X", nine, nine + Duration::days(2)).with_id(1);
        assert!(plan(&[d], &s, &nine).is_empty());
    }

    #[test]
    fn test_duplicates_are_removed() {
        let s = settings(&[9, 9], &[3, 3, 1]);
        let requests = plan(&[doc(1, 5), doc(1, 5)], &s, &now());
        assert_eq!(requests.len(), 2);
        let unique: HashSet<_> = requests.iter().map(|r| (r.document_id, r.fires_at)).collect();
        assert_eq!(unique.len(), requests.len());
    }

    #[test]
    fn test_sorted_by_time_then_document() {
        let s = settings(&[9, 18], &[1]);
        let requests = plan(&[doc(2, 2), doc(1, 2)], &s, &now());
        let keys: Vec<_> = requests.iter().map(|r| (r.fires_at, r.document_id)).collect();
        assert_eq!(
            keys,
            vec![(at(1, 9), 1), (at(1, 9), 2), (at(1, 18), 1), (at(1, 18), 2)]
        );
    }

    #[test]
    fn test_hours_are_local_to_now() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let local_now = tz.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();
        let expires = tz.with_ymd_and_hms(2024, 3, 12, 12, 0, 0).unwrap().with_timezone(&Utc);
        let d = Document::new("Assurance", "X", expires, expires).with_id(1);
        let requests = plan(&[d], &settings(&[9], &[1]), &local_now);
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].fires_at,
            Utc.with_ymd_and_hms(2024, 3, 11, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let documents = vec![doc(1, 4), doc(2, 9), doc(3, 1)];
        let s = NotificationSettings::default();
        assert_eq!(plan(&documents, &s, &now()), plan(&documents, &s, &now()));
    }

    #[test]
    fn test_reminder_message() {
        assert_eq!(reminder_message("Assurance", "AB", 1), "Assurance for AB expires tomorrow!");
        assert_eq!(reminder_message("Assurance", "AB", 7), "Assurance for AB expires in 7 days");
        assert_eq!(reminder_message("Vignette", "AB", 0), "Vignette for AB expires today!");
    }

    #[test]
    fn test_request_title_and_body() {
        let requests = plan(&[doc(1, 3)], &settings(&[9], &[1]), &now());
        assert_eq!(requests[0].title(), REMINDER_TITLE);
        assert_eq!(requests[0].body(), "Assurance for AB-123-CD expires tomorrow!");
    }
}
