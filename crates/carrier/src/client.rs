//! HTTP Blue Dart client: SOAP calls for serviceability, transit time,
//! waybills and pickups; plain XML-over-GET for tracking.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::config::{CarrierConfig, Endpoints};
use crate::error::{CarrierError, Result};
use crate::scan_map::map_scan_description;
use crate::types::{
    PickupReceipt, PickupRequest, ScanEvent, Serviceability, TrackingUpdate, TransitTime, Waybill,
    WaybillRequest,
};
use crate::util::{normalize_phone, parse_display_date, split_address, truncate_field};

const SOAP_ENV_OPEN: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:tem="http://tempuri.org/" xmlns:dat="http://schemas.datacontract.org/2004/07/SAPI.Entities.Admin"><soapenv:Header/><soapenv:Body>"#;
const SOAP_ENV_CLOSE: &str = "</soapenv:Body></soapenv:Envelope>";

/// Blue Dart client over HTTP.
#[derive(Clone)]
pub struct BlueDartClient {
    http: reqwest::Client,
    config: CarrierConfig,
    endpoints: Endpoints,
}

impl BlueDartClient {
    /// Creates a client with the configured timeout and environment
    /// endpoints.
    pub fn new(config: CarrierConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let endpoints = config.endpoints();
        Ok(Self {
            http,
            config,
            endpoints,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    fn profile_xml(&self, customer_code: &str) -> String {
        format!(
            "<tem:profile><dat:Api_type>S</dat:Api_type>\
             <dat:Area>{}</dat:Area>\
             <dat:Customercode>{}</dat:Customercode>\
             <dat:LicenceKey>{}</dat:LicenceKey>\
             <dat:LoginID>{}</dat:LoginID>\
             <dat:Version>1.3</dat:Version></tem:profile>",
            xml_escape(&self.config.origin_area),
            xml_escape(customer_code),
            xml_escape(&self.config.licence_key),
            xml_escape(&self.config.login_id),
        )
    }

    async fn soap_call(&self, url: &str, action: &str, body: String) -> Result<String> {
        let envelope = format!("{SOAP_ENV_OPEN}{body}{SOAP_ENV_CLOSE}");
        let response = self
            .http
            .post(url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", action)
            .body(envelope)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_server_error() {
            return Err(CarrierError::Transport(format!("HTTP {status}")));
        }
        if text.contains("Fault>") {
            let reason = text_of(&text, "faultstring")
                .or_else(|| text_of(&text, "Text"))
                .unwrap_or_else(|| "SOAP fault".to_string());
            return Err(CarrierError::Business(reason));
        }
        if !status.is_success() {
            return Err(CarrierError::Transport(format!("HTTP {status}")));
        }
        Ok(text)
    }

    /// Checks whether a pincode is serviceable. A carrier-reported error
    /// reads as "not serviceable", matching the carrier's own semantics for
    /// unknown pincodes.
    #[tracing::instrument(skip(self))]
    pub async fn check_serviceability(&self, pincode: &str) -> Result<Serviceability> {
        let body = format!(
            "<tem:GetServicesforPincode><tem:pinCode>{}</tem:pinCode>{}</tem:GetServicesforPincode>",
            xml_escape(pincode),
            self.profile_xml(&self.config.customer_code),
        );
        let xml = self
            .soap_call(
                &self.endpoints.finder,
                "http://tempuri.org/IServiceFinderQuery/GetServicesforPincode",
                body,
            )
            .await?;

        Ok(parse_serviceability(&xml))
    }

    /// Transit-time estimate. Carrier-reported errors collapse to an empty
    /// answer; this call is best-effort everywhere it is used.
    #[tracing::instrument(skip(self))]
    pub async fn transit_time(
        &self,
        dest_pincode: &str,
        product_code: &str,
        sub_product_code: &str,
        pickup_date: NaiveDate,
    ) -> Result<TransitTime> {
        let body = format!(
            "<tem:GetDomesticTransitTimeForPinCodeandProduct>\
             <tem:pPinCodeFrom>{}</tem:pPinCodeFrom>\
             <tem:pPinCodeTo>{}</tem:pPinCodeTo>\
             <tem:pProductCode>{}</tem:pProductCode>\
             <tem:pSubProductCode>{}</tem:pSubProductCode>\
             <tem:pPudate>{}</tem:pPudate>\
             <tem:pPickupTime>1600</tem:pPickupTime>\
             {}</tem:GetDomesticTransitTimeForPinCodeandProduct>",
            xml_escape(&self.config.origin_pincode),
            xml_escape(dest_pincode),
            xml_escape(product_code),
            xml_escape(sub_product_code),
            pickup_date.format("%Y-%m-%d"),
            self.profile_xml(&self.config.customer_code),
        );
        let xml = self
            .soap_call(
                &self.endpoints.finder,
                "http://tempuri.org/IServiceFinderQuery/GetDomesticTransitTimeForPinCodeandProduct",
                body,
            )
            .await?;

        Ok(parse_transit_time(&xml, pickup_date))
    }

    /// Generates a waybill. Carrier-reported errors are business failures;
    /// the caller decides whether to retry transport failures.
    #[tracing::instrument(skip(self, request), fields(reference = %request.credit_reference))]
    pub async fn generate_waybill(&self, request: &WaybillRequest) -> Result<Waybill> {
        let customer_code = self.config.customer_code_for(&request.sub_product_code);
        let (line1, line2, line3) = split_address(&request.consignee_address);
        let line1 = if line1.is_empty() {
            truncate_field(&request.consignee_address, 30)
        } else {
            line1
        };

        let body = format!(
            "<tem:GenerateWayBill><tem:Request>\
             <dat:Consignee>\
             <dat:ConsigneeAddress1>{}</dat:ConsigneeAddress1>\
             <dat:ConsigneeAddress2>{}</dat:ConsigneeAddress2>\
             <dat:ConsigneeAddress3>{}</dat:ConsigneeAddress3>\
             <dat:ConsigneeAddressType>R</dat:ConsigneeAddressType>\
             <dat:ConsigneeEmailID>{}</dat:ConsigneeEmailID>\
             <dat:ConsigneeMobile>{}</dat:ConsigneeMobile>\
             <dat:ConsigneeName>{}</dat:ConsigneeName>\
             <dat:ConsigneePincode>{}</dat:ConsigneePincode>\
             </dat:Consignee>\
             <dat:Returnadds>\
             <dat:ReturnAddress1>{}</dat:ReturnAddress1>\
             <dat:ReturnContact>{}</dat:ReturnContact>\
             <dat:ReturnMobile>{}</dat:ReturnMobile>\
             <dat:ReturnPincode>{}</dat:ReturnPincode>\
             </dat:Returnadds>\
             <dat:Services>\
             <dat:ActualWeight>{}</dat:ActualWeight>\
             <dat:CollectableAmount>{}</dat:CollectableAmount>\
             <dat:CreditReferenceNo>{}</dat:CreditReferenceNo>\
             <dat:DeclaredValue>{}</dat:DeclaredValue>\
             <dat:Dimensions><dat:Dimension>\
             <dat:Breadth>{}</dat:Breadth><dat:Count>1</dat:Count>\
             <dat:Height>{}</dat:Height><dat:Length>{}</dat:Length>\
             </dat:Dimension></dat:Dimensions>\
             <dat:InvoiceNo>{}</dat:InvoiceNo>\
             <dat:ItemCount>{}</dat:ItemCount>\
             <dat:PDFOutputNotRequired>false</dat:PDFOutputNotRequired>\
             <dat:PackType>N</dat:PackType>\
             <dat:PickupTime>1600</dat:PickupTime>\
             <dat:PieceCount>{}</dat:PieceCount>\
             <dat:ProductCode>{}</dat:ProductCode>\
             <dat:ProductType>Dutiables</dat:ProductType>\
             <dat:RegisterPickup>false</dat:RegisterPickup>\
             <dat:SubProductCode>{}</dat:SubProductCode>\
             </dat:Services>\
             <dat:Shipper>\
             <dat:CustomerAddress1>{}</dat:CustomerAddress1>\
             <dat:CustomerCode>{}</dat:CustomerCode>\
             <dat:CustomerMobile>{}</dat:CustomerMobile>\
             <dat:CustomerName>{}</dat:CustomerName>\
             <dat:CustomerPincode>{}</dat:CustomerPincode>\
             <dat:IsToPayCustomer>false</dat:IsToPayCustomer>\
             <dat:OriginArea>{}</dat:OriginArea>\
             <dat:Sender>{}</dat:Sender>\
             </dat:Shipper>\
             </tem:Request>{}</tem:GenerateWayBill>",
            xml_escape(&line1),
            xml_escape(&line2),
            xml_escape(&line3),
            xml_escape(&truncate_field(&request.consignee_email, 50)),
            xml_escape(&normalize_phone(&request.consignee_phone)),
            xml_escape(&truncate_field(&request.consignee_name, 30)),
            xml_escape(&request.consignee_pincode),
            xml_escape(&truncate_field(&self.config.return_address, 30)),
            xml_escape(&truncate_field(&self.config.return_contact, 20)),
            xml_escape(&normalize_phone(&self.config.return_phone)),
            xml_escape(&self.config.return_pincode),
            request.weight_kg,
            request.collectible_rupees,
            xml_escape(&request.credit_reference),
            request.declared_value_rupees,
            request.dimensions.width_cm,
            request.dimensions.height_cm,
            request.dimensions.length_cm,
            xml_escape(&request.invoice_number),
            request.piece_count,
            request.piece_count,
            xml_escape(&request.product_code),
            xml_escape(&request.sub_product_code),
            xml_escape(&truncate_field(&self.config.warehouse_address, 30)),
            xml_escape(customer_code),
            xml_escape(&normalize_phone(&self.config.warehouse_phone)),
            xml_escape(&truncate_field(&self.config.warehouse_name, 30)),
            xml_escape(&self.config.origin_pincode),
            xml_escape(&self.config.origin_area),
            xml_escape(&truncate_field(&self.config.warehouse_name, 30)),
            self.profile_xml(customer_code),
        );

        let xml = self
            .soap_call(
                &self.endpoints.waybill,
                "http://tempuri.org/IWayBillGeneration/GenerateWayBill",
                body,
            )
            .await?;

        parse_waybill(&xml)
    }

    /// Fetches the full scan history for a waybill over the tracking API.
    #[tracing::instrument(skip(self))]
    pub async fn track(&self, awb_number: &str) -> Result<TrackingUpdate> {
        let response = self
            .http
            .get(&self.endpoints.tracking)
            .query(&[
                ("handler", "tnt"),
                ("action", "custawbquery"),
                ("loginid", self.config.login_id.as_str()),
                ("awb", "awb"),
                ("numbers", awb_number),
                ("format", "xml"),
                ("lickey", self.config.tracking_licence_key.as_str()),
                ("verno", "1.3"),
                ("scan", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CarrierError::Transport(format!("HTTP {status}")));
        }
        let xml = response.text().await?;

        parse_tracking(&xml)
    }

    /// Registers one pickup for a batch of shipments.
    #[tracing::instrument(skip(self, request), fields(shipments = request.shipment_count))]
    pub async fn register_pickup(&self, request: &PickupRequest) -> Result<PickupReceipt> {
        let body = format!(
            "<tem:RegisterPickup><tem:PickupRequest>\
             <dat:AreaCode>{}</dat:AreaCode>\
             <dat:ContactPersonName>{}</dat:ContactPersonName>\
             <dat:CustomerAddress1>{}</dat:CustomerAddress1>\
             <dat:CustomerCode>{}</dat:CustomerCode>\
             <dat:CustomerName>{}</dat:CustomerName>\
             <dat:CustomerPincode>{}</dat:CustomerPincode>\
             <dat:CustomerTelephoneNumber>{}</dat:CustomerTelephoneNumber>\
             <dat:DoxNDox>2</dat:DoxNDox>\
             <dat:IsReversePickup>false</dat:IsReversePickup>\
             <dat:MobileTelNo>{}</dat:MobileTelNo>\
             <dat:NumberofPieces>{}</dat:NumberofPieces>\
             <dat:OfficeCloseTime>{}</dat:OfficeCloseTime>\
             <dat:ProductCode>D</dat:ProductCode>\
             <dat:Remarks>Daily pickup - {} shipments</dat:Remarks>\
             <dat:ShipmentPickupDate>{}</dat:ShipmentPickupDate>\
             <dat:ShipmentPickupTime>{}</dat:ShipmentPickupTime>\
             <dat:VolumeWeight>{}</dat:VolumeWeight>\
             <dat:WeightofShipment>{}</dat:WeightofShipment>\
             </tem:PickupRequest>{}</tem:RegisterPickup>",
            xml_escape(&self.config.origin_area),
            xml_escape(&self.config.warehouse_contact),
            xml_escape(&truncate_field(&self.config.warehouse_address, 30)),
            xml_escape(&self.config.customer_code),
            xml_escape(&self.config.warehouse_name),
            xml_escape(&self.config.origin_pincode),
            xml_escape(&normalize_phone(&self.config.warehouse_phone)),
            xml_escape(&normalize_phone(&self.config.warehouse_phone)),
            request.piece_count,
            xml_escape(&request.close_time),
            request.shipment_count,
            request.pickup_date.format("%Y-%m-%d"),
            xml_escape(&request.pickup_time),
            request.total_weight_kg,
            request.total_weight_kg,
            self.profile_xml(&self.config.customer_code),
        );

        let xml = self
            .soap_call(
                &self.endpoints.pickup,
                "http://tempuri.org/IPickupRegistrationService/RegisterPickup",
                body,
            )
            .await?;

        if is_error_response(&xml) {
            return Err(CarrierError::Business(error_message(&xml)));
        }
        let token = text_of(&xml, "TokenNumber")
            .ok_or_else(|| CarrierError::Parse("pickup response missing TokenNumber".into()))?;
        Ok(PickupReceipt { token })
    }

    /// Cancels a waybill before in-scan. A carrier rejection (already picked
    /// up) is a business error.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_waybill(&self, awb_number: &str) -> Result<()> {
        let body = format!(
            "<tem:CancelWaybill><tem:AWBNo>{}</tem:AWBNo>{}</tem:CancelWaybill>",
            xml_escape(awb_number),
            self.profile_xml(&self.config.customer_code),
        );
        let xml = self
            .soap_call(
                &self.endpoints.waybill,
                "http://tempuri.org/IWayBillGeneration/CancelWaybill",
                body,
            )
            .await?;

        if is_error_response(&xml) {
            return Err(CarrierError::Business(error_message(&xml)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl crate::api::CarrierApi for BlueDartClient {
    async fn check_serviceability(&self, pincode: &str) -> Result<Serviceability> {
        BlueDartClient::check_serviceability(self, pincode).await
    }

    async fn transit_time(
        &self,
        dest_pincode: &str,
        product_code: &str,
        sub_product_code: &str,
        pickup_date: NaiveDate,
    ) -> Result<TransitTime> {
        BlueDartClient::transit_time(self, dest_pincode, product_code, sub_product_code, pickup_date)
            .await
    }

    async fn generate_waybill(&self, request: &WaybillRequest) -> Result<Waybill> {
        BlueDartClient::generate_waybill(self, request).await
    }

    async fn track(&self, awb_number: &str) -> Result<TrackingUpdate> {
        BlueDartClient::track(self, awb_number).await
    }

    async fn register_pickup(&self, request: &PickupRequest) -> Result<PickupReceipt> {
        BlueDartClient::register_pickup(self, request).await
    }

    async fn cancel_waybill(&self, awb_number: &str) -> Result<()> {
        BlueDartClient::cancel_waybill(self, awb_number).await
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Text content of the first element with the given local name.
fn text_of(xml: &str, tag: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == tag.as_bytes() => {
                return reader
                    .read_text(e.name())
                    .ok()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

fn bool_of(xml: &str, tag: &str) -> bool {
    text_of(xml, tag).is_some_and(|t| t.eq_ignore_ascii_case("true"))
}

fn is_error_response(xml: &str) -> bool {
    bool_of(xml, "IsError")
}

fn error_message(xml: &str) -> String {
    text_of(xml, "ErrorMessage")
        .or_else(|| text_of(xml, "StatusInformation"))
        .or_else(|| text_of(xml, "StatusMessage"))
        .unwrap_or_else(|| "unknown carrier error".to_string())
}

fn parse_serviceability(xml: &str) -> Serviceability {
    if is_error_response(xml) {
        return Serviceability::default();
    }
    Serviceability {
        serviceable: bool_of(xml, "DomesticPriorityOutbound"),
        cod_available: bool_of(xml, "eTailCODAirOutbound"),
    }
}

fn parse_transit_time(xml: &str, pickup_date: NaiveDate) -> TransitTime {
    if is_error_response(xml) {
        return TransitTime::default();
    }
    let expected_delivery_date =
        text_of(xml, "ExpectedDateDelivery").and_then(|raw| parse_display_date(&raw));
    let transit_days = expected_delivery_date
        .map(|d| (d - pickup_date).num_days())
        .or_else(|| text_of(xml, "AdditionalDays").and_then(|d| d.parse().ok()));
    TransitTime {
        expected_delivery_date,
        transit_days,
        area_code: text_of(xml, "Area"),
        service_center: text_of(xml, "ServiceCenter"),
    }
}

fn parse_waybill(xml: &str) -> Result<Waybill> {
    if is_error_response(xml) {
        return Err(CarrierError::Business(error_message(xml)));
    }
    let awb_number = text_of(xml, "AWBNo")
        .ok_or_else(|| CarrierError::Parse("waybill response missing AWBNo".into()))?;

    let label_pdf = text_of(xml, "AWBPrintContent").and_then(|b64| match BASE64.decode(&b64) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(awb = %awb_number, error = %e, "label PDF decode failed");
            None
        }
    });

    Ok(Waybill {
        awb_number,
        label_pdf,
        destination_area: text_of(xml, "DestinationArea"),
        destination_location: text_of(xml, "DestinationLocation"),
        pickup_token: text_of(xml, "TokenNumber"),
    })
}

fn parse_tracking(xml: &str) -> Result<TrackingUpdate> {
    if text_of(xml, "Status").as_deref() == Some("Error") {
        return Err(CarrierError::Business(
            text_of(xml, "ErrorMessage").unwrap_or_else(|| "unknown tracking error".to_string()),
        ));
    }

    let mut events = parse_scan_events(xml)?;

    // Current status comes from the first scan (document order) whose
    // description is in the table.
    let current_status = events
        .iter()
        .find_map(|e| map_scan_description(&e.scan_description));

    events.sort_by(|a, b| b.scan_date.cmp(&a.scan_date));

    Ok(TrackingUpdate {
        current_status,
        events,
    })
}

fn parse_scan_events(xml: &str) -> Result<Vec<ScanEvent>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut events = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"ScanDetail" => {
                let mut date = String::new();
                let mut time = String::new();
                let mut code = String::new();
                let mut description = String::new();
                let mut location = String::new();
                let mut instructions = None;

                loop {
                    match reader.read_event() {
                        Ok(Event::Start(field)) => {
                            let name = field.local_name().as_ref().to_vec();
                            let value = reader
                                .read_text(field.name())
                                .map_err(CarrierError::from)?
                                .trim()
                                .to_string();
                            match name.as_slice() {
                                b"ScanDate" => date = value,
                                b"ScanTime" => time = value,
                                b"ScanCode" => code = value,
                                b"Scan" | b"ScanDescription" => {
                                    if description.is_empty() {
                                        description = value;
                                    }
                                }
                                b"ScannedLocation" => location = value,
                                b"Instructions" => {
                                    if !value.is_empty() {
                                        instructions = Some(value);
                                    }
                                }
                                _ => {}
                            }
                        }
                        Ok(Event::End(end)) if end.local_name().as_ref() == b"ScanDetail" => break,
                        Ok(Event::Eof) => break,
                        Err(e) => return Err(e.into()),
                        _ => {}
                    }
                }

                // Scans with unparseable timestamps cannot be keyed and are
                // skipped.
                if let Ok(scan_date) = NaiveDateTime::parse_from_str(
                    &format!("{date} {time}"),
                    "%Y-%m-%d %H:%M:%S",
                ) {
                    events.push(ScanEvent {
                        scan_date,
                        scan_code: code,
                        scan_description: description,
                        scanned_location: location,
                        instructions,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }
    Ok(events)
}
