use crate::db_types::DeliveryStatus;

/// Translates a courier status code into the internal delivery vocabulary.
///
/// The courier's own names for a handful of states differ from ours; those are mapped explicitly. Any other code is
/// trimmed and lower-cased, which turns e.g. `SEARCHING_RIDER` or `CANCELLED` into the matching internal state and
/// leaves genuinely unknown codes as [`DeliveryStatus::Other`]. A blank code maps to `Other("")`.
pub fn map_courier_status(raw: &str) -> DeliveryStatus {
    let code = raw.trim();
    match code {
        "ARRIVED" => DeliveryStatus::ReachedLocation,
        "COLLECTED" => DeliveryStatus::PickedUp,
        "CUSTOMER_DOOR_STEP" => DeliveryStatus::ArrivedAtDrop,
        "ALLOTTED" => DeliveryStatus::Allotted,
        "DELIVERED" => DeliveryStatus::Delivered,
        other => DeliveryStatus::from(other.to_lowercase()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn courier_specific_codes() {
        assert_eq!(map_courier_status("ARRIVED"), DeliveryStatus::ReachedLocation);
        assert_eq!(map_courier_status("COLLECTED"), DeliveryStatus::PickedUp);
        assert_eq!(map_courier_status("CUSTOMER_DOOR_STEP"), DeliveryStatus::ArrivedAtDrop);
        assert_eq!(map_courier_status("ALLOTTED"), DeliveryStatus::Allotted);
        assert_eq!(map_courier_status("DELIVERED"), DeliveryStatus::Delivered);
    }

    #[test]
    fn passthrough_codes() {
        assert_eq!(map_courier_status("CANCELLED"), DeliveryStatus::Cancelled);
        assert_eq!(map_courier_status("SEARCHING_RIDER"), DeliveryStatus::SearchingRider);
        assert_eq!(map_courier_status("SOME_NEW_CODE"), DeliveryStatus::Other("some_new_code".into()));
        assert_eq!(map_courier_status(" allotted "), DeliveryStatus::Allotted);
    }

    #[test]
    fn blank_codes() {
        assert!(map_courier_status("").is_empty());
        assert!(map_courier_status("   ").is_empty());
    }
}
