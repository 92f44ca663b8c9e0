//! Scan-description to shipment-status mapping.

use common::ShipmentStatus;

/// Known scan-description fragments in match priority order. More specific
/// fragments come first; "Delivered" is last because it is a substring of
/// "Undelivered" and "RTO Delivered".
const SCAN_STATUS_TABLE: &[(&str, ShipmentStatus)] = &[
    ("Shipment Booked", ShipmentStatus::Booked),
    ("Pickup Scheduled", ShipmentStatus::PickupScheduled),
    ("Picked Up", ShipmentStatus::PickedUp),
    ("Pickup Done", ShipmentStatus::PickedUp),
    ("In Transit", ShipmentStatus::InTransit),
    ("Arrived at Hub", ShipmentStatus::InTransit),
    ("Departed from Hub", ShipmentStatus::InTransit),
    ("Out for Delivery", ShipmentStatus::OutForDelivery),
    ("Undelivered", ShipmentStatus::Undelivered),
    ("Delivery Failed", ShipmentStatus::Undelivered),
    ("RTO Initiated", ShipmentStatus::RtoInitiated),
    ("Returned to Origin", ShipmentStatus::RtoDelivered),
    ("RTO Delivered", ShipmentStatus::RtoDelivered),
    ("Cancelled", ShipmentStatus::Cancelled),
    ("Delivered", ShipmentStatus::Delivered),
];

/// Maps a carrier scan description to an internal status by first
/// case-insensitive substring match. Unknown descriptions map to nothing and
/// leave the shipment's status untouched.
pub fn map_scan_description(description: &str) -> Option<ShipmentStatus> {
    let haystack = description.to_lowercase();
    SCAN_STATUS_TABLE
        .iter()
        .find(|(fragment, _)| haystack.contains(&fragment.to_lowercase()))
        .map(|(_, status)| *status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            map_scan_description("SHIPMENT BOOKED AT ORIGIN"),
            Some(ShipmentStatus::Booked)
        );
        assert_eq!(
            map_scan_description("out for delivery - third attempt"),
            Some(ShipmentStatus::OutForDelivery)
        );
    }

    #[test]
    fn undelivered_does_not_read_as_delivered() {
        assert_eq!(
            map_scan_description("Undelivered - consignee not available"),
            Some(ShipmentStatus::Undelivered)
        );
        assert_eq!(
            map_scan_description("RTO Delivered to shipper"),
            Some(ShipmentStatus::RtoDelivered)
        );
    }

    #[test]
    fn delivered_still_matches_plain_delivery_scans() {
        assert_eq!(
            map_scan_description("Shipment Delivered"),
            Some(ShipmentStatus::Delivered)
        );
    }

    #[test]
    fn hub_movement_maps_to_in_transit() {
        assert_eq!(
            map_scan_description("Arrived at Hub DEL"),
            Some(ShipmentStatus::InTransit)
        );
        assert_eq!(
            map_scan_description("Departed from Hub BLR"),
            Some(ShipmentStatus::InTransit)
        );
    }

    #[test]
    fn unknown_description_maps_to_nothing() {
        assert_eq!(map_scan_description("Customs hold"), None);
        assert_eq!(map_scan_description(""), None);
    }
}
