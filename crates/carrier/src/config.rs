//! Carrier account and warehouse configuration.

use std::env;

const DEMO_FINDER: &str =
    "https://netconnect.bluedart.com/Demo/ShippingAPI/Finder/ServiceFinderQuery.svc";
const DEMO_WAYBILL: &str =
    "https://netconnect.bluedart.com/API-QA/Ver1.10/Demo/ShippingAPI/WayBill/WayBillGeneration.svc";
const DEMO_PICKUP: &str =
    "https://netconnect.bluedart.com/Demo/ShippingAPI/Pickup/PickupRegistrationService.svc";

const PROD_FINDER: &str =
    "https://netconnect.bluedart.com/Ver1.10/ShippingAPI/Finder/ServiceFinderQuery.svc";
const PROD_WAYBILL: &str =
    "https://netconnect.bluedart.com/Ver1.10/ShippingAPI/WayBill/WayBillGeneration.svc";
const PROD_PICKUP: &str =
    "https://netconnect.bluedart.com/Ver1.10/ShippingAPI/Pickup/PickupRegistrationService.svc";

const TRACKING_BASE: &str = "https://api.bluedart.com/servlet/RoutingServlet";

/// Service endpoints for one environment.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub finder: String,
    pub waybill: String,
    pub pickup: String,
    pub tracking: String,
}

/// Carrier credentials, warehouse identity and packaging defaults.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub login_id: String,
    pub licence_key: String,
    pub tracking_licence_key: String,
    pub customer_code: String,
    /// Separate billing account for COD shipments, when issued.
    pub cod_customer_code: Option<String>,
    pub origin_area: String,
    pub origin_pincode: String,
    /// Demo endpoints when true.
    pub demo_mode: bool,

    pub warehouse_name: String,
    pub warehouse_address: String,
    pub warehouse_phone: String,
    pub warehouse_contact: String,
    pub return_address: String,
    pub return_contact: String,
    pub return_phone: String,
    pub return_pincode: String,

    /// Applied when an order carries no measured weight. A known
    /// approximation for the standard box.
    pub default_weight_kg: f64,
    pub default_length_cm: f64,
    pub default_width_cm: f64,
    pub default_height_cm: f64,

    pub timeout_secs: u64,
}

impl CarrierConfig {
    /// Loads configuration from environment variables with development
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            login_id: env_or("BLUEDART_LOGIN_ID", "demo_login"),
            licence_key: env_or("BLUEDART_LICENCE_KEY", "demo_key"),
            tracking_licence_key: env_or("BLUEDART_TRACKING_LICENCE_KEY", "demo_tracking_key"),
            customer_code: env_or("BLUEDART_CUSTOMER_CODE", "000000"),
            cod_customer_code: env::var("BLUEDART_COD_CUSTOMER_CODE").ok(),
            origin_area: env_or("BLUEDART_ORIGIN_AREA", "BLR"),
            origin_pincode: env_or("BLUEDART_ORIGIN_PINCODE", "560001"),
            demo_mode: env_or("BLUEDART_DEMO_MODE", "true") != "false",
            warehouse_name: env_or("WAREHOUSE_NAME", "Warehouse"),
            warehouse_address: env_or("WAREHOUSE_ADDRESS", ""),
            warehouse_phone: env_or("WAREHOUSE_PHONE", ""),
            warehouse_contact: env_or("WAREHOUSE_CONTACT", ""),
            return_address: env_or("RETURN_ADDRESS", ""),
            return_contact: env_or("RETURN_CONTACT", ""),
            return_phone: env_or("RETURN_PHONE", ""),
            return_pincode: env_or("RETURN_PINCODE", "560001"),
            default_weight_kg: env_parse("SHIPMENT_DEFAULT_WEIGHT_KG", 0.5),
            default_length_cm: env_parse("SHIPMENT_DEFAULT_LENGTH_CM", 20.0),
            default_width_cm: env_parse("SHIPMENT_DEFAULT_WIDTH_CM", 15.0),
            default_height_cm: env_parse("SHIPMENT_DEFAULT_HEIGHT_CM", 10.0),
            timeout_secs: env_parse("CARRIER_TIMEOUT_SECS", 30),
        }
    }

    /// Endpoints for the configured environment.
    pub fn endpoints(&self) -> Endpoints {
        if self.demo_mode {
            Endpoints {
                finder: DEMO_FINDER.to_string(),
                waybill: DEMO_WAYBILL.to_string(),
                pickup: DEMO_PICKUP.to_string(),
                tracking: TRACKING_BASE.to_string(),
            }
        } else {
            Endpoints {
                finder: PROD_FINDER.to_string(),
                waybill: PROD_WAYBILL.to_string(),
                pickup: PROD_PICKUP.to_string(),
                tracking: TRACKING_BASE.to_string(),
            }
        }
    }

    /// Billing account for a sub-product code: the COD account when one is
    /// configured and the shipment collects cash, otherwise the main account.
    pub fn customer_code_for(&self, sub_product_code: &str) -> &str {
        if sub_product_code == crate::types::SUB_PRODUCT_COD {
            if let Some(code) = &self.cod_customer_code {
                return code;
            }
        }
        &self.customer_code
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CarrierConfig {
        CarrierConfig {
            login_id: "login".into(),
            licence_key: "key".into(),
            tracking_licence_key: "tkey".into(),
            customer_code: "111111".into(),
            cod_customer_code: Some("222222".into()),
            origin_area: "BLR".into(),
            origin_pincode: "560001".into(),
            demo_mode: true,
            warehouse_name: "Warehouse".into(),
            warehouse_address: "1 Industrial Estate".into(),
            warehouse_phone: "+91-9876543210".into(),
            warehouse_contact: "Ops".into(),
            return_address: "1 Industrial Estate".into(),
            return_contact: "Ops".into(),
            return_phone: "9876543210".into(),
            return_pincode: "560001".into(),
            default_weight_kg: 0.5,
            default_length_cm: 20.0,
            default_width_cm: 15.0,
            default_height_cm: 10.0,
            timeout_secs: 30,
        }
    }

    #[test]
    fn demo_mode_selects_demo_endpoints() {
        let mut c = config();
        assert!(c.endpoints().waybill.contains("Demo"));
        c.demo_mode = false;
        assert!(!c.endpoints().waybill.contains("Demo"));
    }

    #[test]
    fn cod_shipments_use_cod_account_when_configured() {
        let mut c = config();
        assert_eq!(c.customer_code_for("C"), "222222");
        assert_eq!(c.customer_code_for("P"), "111111");
        c.cod_customer_code = None;
        assert_eq!(c.customer_code_for("C"), "111111");
    }
}
