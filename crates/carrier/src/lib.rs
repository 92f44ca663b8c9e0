//! Blue Dart carrier integration.
//!
//! Everything here is stateless protocol mapping: building requests, parsing
//! XML responses, and translating carrier vocabulary (scan descriptions,
//! display dates, field length limits) into typed values. Shipment state
//! lives elsewhere.

mod api;
mod client;
mod config;
mod error;
mod scan_map;
mod types;
mod util;

pub use api::{CarrierApi, InMemoryCarrier};
pub use client::BlueDartClient;
pub use config::CarrierConfig;
pub use error::{CarrierError, Result};
pub use scan_map::map_scan_description;
pub use types::{
    Dimensions, PickupReceipt, PickupRequest, ScanEvent, Serviceability, TrackingUpdate,
    TransitTime, Waybill, WaybillRequest, PRODUCT_DOMESTIC_PRIORITY, SUB_PRODUCT_COD,
    SUB_PRODUCT_PREPAID,
};
pub use util::{billable_weight, normalize_phone, parse_display_date, split_address, truncate_field};
