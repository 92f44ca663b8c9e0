//! Typed carrier request and response schemas. Every optional wire field is
//! an explicit `Option`.

use chrono::{NaiveDate, NaiveDateTime};
use common::ShipmentStatus;

/// Next-business-day air delivery.
pub const PRODUCT_DOMESTIC_PRIORITY: &str = "D";
/// Prepaid sub-product.
pub const SUB_PRODUCT_PREPAID: &str = "P";
/// Cash-on-delivery sub-product.
pub const SUB_PRODUCT_COD: &str = "C";

/// Parcel dimensions in centimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

/// Serviceability answer for a destination pincode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Serviceability {
    pub serviceable: bool,
    pub cod_available: bool,
}

/// Transit-time answer. Fields the carrier left blank stay `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitTime {
    pub expected_delivery_date: Option<NaiveDate>,
    pub transit_days: Option<i64>,
    /// Destination area code, used as the shipment's destination area.
    pub area_code: Option<String>,
    pub service_center: Option<String>,
}

/// Everything needed to generate one waybill.
#[derive(Debug, Clone)]
pub struct WaybillRequest {
    pub consignee_name: String,
    pub consignee_address: String,
    pub consignee_pincode: String,
    pub consignee_phone: String,
    pub consignee_email: String,
    /// Unique per attempt; the carrier rejects duplicates.
    pub credit_reference: String,
    pub invoice_number: String,
    pub piece_count: u32,
    pub product_code: String,
    pub sub_product_code: String,
    pub declared_value_rupees: f64,
    /// Zero for prepaid shipments.
    pub collectible_rupees: f64,
    pub weight_kg: f64,
    pub dimensions: Dimensions,
}

/// Successful waybill generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waybill {
    pub awb_number: String,
    /// Decoded label PDF, when the carrier returned print content.
    pub label_pdf: Option<Vec<u8>>,
    pub destination_area: Option<String>,
    pub destination_location: Option<String>,
    /// Set when the carrier auto-registered a pickup.
    pub pickup_token: Option<String>,
}

/// One scan from the tracking feed. Timestamps are carrier-local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub scan_date: NaiveDateTime,
    pub scan_code: String,
    pub scan_description: String,
    pub scanned_location: String,
    pub instructions: Option<String>,
}

/// Tracking answer: mapped current status plus the full scan history,
/// newest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackingUpdate {
    pub current_status: Option<ShipmentStatus>,
    pub events: Vec<ScanEvent>,
}

/// One pickup registration covering a batch of shipments.
#[derive(Debug, Clone)]
pub struct PickupRequest {
    pub pickup_date: NaiveDate,
    /// HHMM.
    pub pickup_time: String,
    /// HHMM.
    pub close_time: String,
    pub piece_count: u32,
    pub total_weight_kg: f64,
    pub shipment_count: usize,
}

/// Token identifying a registered pickup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupReceipt {
    pub token: String,
}
