//! The append-only status history of a delivery.
//!
//! Entries are never rewritten or removed. Timestamps are monotone: an entry is never stamped earlier than the one
//! before it, even if the clock (or the courier's reported event time) goes backwards.
use chrono::{DateTime, Utc};

use crate::db_types::{DeliveryRecord, DeliveryStatus, HistoryEntry, ObservationSource};

/// Appends `entry` to the record's history and returns the updated record.
pub fn append(mut record: DeliveryRecord, entry: HistoryEntry) -> DeliveryRecord {
    let entry = stamp(&record.history, entry);
    record.history.push(entry);
    record
}

/// Adjusts the entry's timestamp so that it is not earlier than the last entry in `history`.
pub fn stamp(history: &[HistoryEntry], mut entry: HistoryEntry) -> HistoryEntry {
    if let Some(last) = history.last() {
        if entry.timestamp < last.timestamp {
            entry.timestamp = last.timestamp;
        }
    }
    entry
}

/// Builds the history entry for an observed transition. The note records where the observation came from and the
/// courier's own status code, e.g. `webhook: ALLOTTED`.
pub fn transition_entry(
    status: DeliveryStatus,
    source: ObservationSource,
    raw_status: &str,
    timestamp: DateTime<Utc>,
) -> HistoryEntry {
    HistoryEntry::new(status, timestamp, format!("{source}: {}", raw_status.trim()))
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::db_types::{Delivery, OrderNumber};

    fn record(history: Vec<HistoryEntry>) -> DeliveryRecord {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        DeliveryRecord {
            order_number: OrderNumber::from("GZ001"),
            delivery: Delivery {
                id: 1,
                order_id: 1,
                external_id: None,
                status: DeliveryStatus::Created,
                rider_name: None,
                rider_phone: None,
                rider_latitude: None,
                rider_longitude: None,
                pickup_otp: None,
                delivery_otp: None,
                cancellation_reason: None,
                cancelled_by: None,
                request_payload: None,
                response_payload: None,
                version: 0,
                created_at: t,
                updated_at: t,
            },
            history,
        }
    }

    #[test]
    fn append_keeps_existing_entries() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let first = HistoryEntry::new(DeliveryStatus::Created, t, "dispatch: requested");
        let record = record(vec![first.clone()]);
        let later = t + Duration::minutes(5);
        let second = transition_entry(DeliveryStatus::Allotted, ObservationSource::Webhook, "ALLOTTED", later);
        let record = append(record, second.clone());
        assert_eq!(record.history, vec![first, second]);
        assert_eq!(record.last_entry().unwrap().note, "webhook: ALLOTTED");
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let record = record(vec![HistoryEntry::new(DeliveryStatus::Allotted, t, "webhook: ALLOTTED")]);
        let earlier = t - Duration::minutes(1);
        let late = transition_entry(DeliveryStatus::PickedUp, ObservationSource::Poll, "COLLECTED", earlier);
        let record = append(record, late);
        assert_eq!(record.history.len(), 2);
        assert_eq!(record.history[1].timestamp, t);
        assert_eq!(record.history[1].status, DeliveryStatus::PickedUp);
    }
}
