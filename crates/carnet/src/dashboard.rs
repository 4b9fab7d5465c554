//! Dashboard summary.

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use tracing::warn;

use crate::expiration::{self, ExpirationStatus, DANGER_DAYS};
use crate::model::Document;
use crate::scheduler::DocumentRepository;
use crate::storage::Storage;

/// How many upcoming documents the dashboard lists.
pub const SOON_TO_EXPIRE_LIMIT: usize = 5;

/// A document in the "soon to expire" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingDocument {
    /// The document.
    pub document: Document,
    /// Calendar days until it expires.
    pub days_until_expiration: i64,
    /// Its status.
    pub status: ExpirationStatus,
}

/// Counts shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Number of vehicles.
    pub total_vehicles: usize,
    /// Active documents.
    pub active_documents: usize,
    /// Active documents past their expiration date.
    pub expired_documents: usize,
    /// Active documents expiring within a week, today included.
    pub expiring_this_week: usize,
    /// The next active documents to expire, soonest first.
    pub soon_to_expire: Vec<UpcomingDocument>,
}

impl DashboardStats {
    /// Compute statistics from the repository.
    ///
    /// Any read failure yields zeroed statistics.
    pub async fn load<Tz: TimeZone>(storage: &Storage, now: &DateTime<Tz>) -> Self {
        let documents = match storage.fetch_documents().await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Failed to load documents for dashboard: {}", e);
                return Self::default();
            }
        };
        let total_vehicles = match storage.list_vehicles() {
            Ok(vehicles) => vehicles.len(),
            Err(e) => {
                warn!("Failed to load vehicles for dashboard: {}", e);
                return Self::default();
            }
        };
        Self::compute(total_vehicles, &documents, now)
    }

    /// Compute statistics from already loaded records.
    pub fn compute<Tz: TimeZone>(
        total_vehicles: usize,
        documents: &[Document],
        now: &DateTime<Tz>,
    ) -> Self {
        let mut stats = Self {
            total_vehicles,
            ..Self::default()
        };

        let mut upcoming = Vec::new();
        for document in documents.iter().filter(|d| d.active) {
            stats.active_documents += 1;
            let expiration = expiration::classify(&document.expires_at, now);
            match expiration.status {
                ExpirationStatus::Expired => stats.expired_documents += 1,
                _ if expiration.days_until_expiration <= DANGER_DAYS => {
                    stats.expiring_this_week += 1;
                }
                _ => {}
            }
            if expiration.days_until_expiration >= 0 {
                upcoming.push(UpcomingDocument {
                    document: document.clone(),
                    days_until_expiration: expiration.days_until_expiration,
                    status: expiration.status,
                });
            }
        }

        upcoming.sort_by(|a, b| {
            a.document
                .expires_at
                .cmp(&b.document.expires_at)
                .then(a.document.id.cmp(&b.document.id))
        });
        upcoming.truncate(SOON_TO_EXPIRE_LIMIT);
        stats.soon_to_expire = upcoming;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Vehicle, VehicleType};
    use chrono::{Duration, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap()
    }

    fn doc(id: i64, days: i64) -> Document {
        Document::new(
            "Assurance",
            "AB-123-CD",
            now() - Duration::days(400),
            now() + Duration::days(days),
        )
        .with_id(id)
    }

    #[test]
    fn test_compute_counts() {
        let documents = vec![
            doc(1, -3),
            doc(2, 0),
            doc(3, 7),
            doc(4, 8),
            doc(5, 90),
            doc(6, 1).with_active(false),
        ];
        let stats = DashboardStats::compute(2, &documents, &now());

        assert_eq!(stats.total_vehicles, 2);
        assert_eq!(stats.active_documents, 5);
        assert_eq!(stats.expired_documents, 1);
        assert_eq!(stats.expiring_this_week, 2);
    }

    #[test]
    fn test_soon_to_expire_is_limited_and_sorted() {
        let documents: Vec<_> = (1..=8).rev().map(|i| doc(i, i)).collect();
        let stats = DashboardStats::compute(1, &documents, &now());

        let ids: Vec<_> = stats
            .soon_to_expire
            .iter()
            .filter_map(|u| u.document.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(stats.soon_to_expire[0].days_until_expiration, 1);
    }

    #[test]
    fn test_soon_to_expire_excludes_expired() {
        let stats = DashboardStats::compute(1, &[doc(1, -1), doc(2, 3)], &now());
        assert_eq!(stats.soon_to_expire.len(), 1);
        assert_eq!(stats.soon_to_expire[0].document.id, Some(2));
    }

    #[tokio::test]
    async fn test_load_from_storage() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .add_vehicle(&Vehicle::new("AB-123-CD", VehicleType::Car))
            .unwrap();
        let real_now = Utc::now();
        storage
            .add_document(&Document::new(
                "Vignette",
                "AB-123-CD",
                real_now - Duration::days(10),
                real_now + Duration::days(3),
            ))
            .unwrap();

        let stats = DashboardStats::load(&storage, &real_now).await;
        assert_eq!(stats.total_vehicles, 1);
        assert_eq!(stats.active_documents, 1);
        assert_eq!(stats.expiring_this_week, 1);
        assert_eq!(stats.soon_to_expire.len(), 1);
    }

    #[test]
    fn test_empty() {
        assert_eq!(
            DashboardStats::compute(0, &[], &now()),
            DashboardStats::default()
        );
    }
}
