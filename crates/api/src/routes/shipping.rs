//! Serviceability, tracking and label endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use carrier::{CarrierError, PRODUCT_DOMESTIC_PRIORITY, SUB_PRODUCT_PREPAID};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Debug, Deserialize)]
pub struct ServiceabilityQuery {
    pub pincode: String,
}

#[derive(Serialize)]
pub struct ServiceabilityResponse {
    pub pincode: String,
    pub serviceable: bool,
    pub cod_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_delivery_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transit_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_code: Option<String>,
}

/// GET /shipping/serviceability?pincode= — destination check with a transit
/// estimate when the pincode is serviceable.
#[tracing::instrument(skip(state))]
pub async fn serviceability<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ServiceabilityQuery>,
) -> Result<Json<ServiceabilityResponse>, ApiError> {
    let pincode = query.pincode.trim().to_string();
    if pincode.len() != 6 || !pincode.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::BadRequest(format!("Invalid pincode: {pincode}")));
    }

    let answer = state.carrier.check_serviceability(&pincode).await?;
    let mut response = ServiceabilityResponse {
        pincode,
        serviceable: answer.serviceable,
        cod_available: answer.cod_available,
        expected_delivery_date: None,
        transit_days: None,
        area_code: None,
    };

    // The estimate is decoration; its failure must not fail the check.
    if answer.serviceable {
        if let Ok(transit) = state
            .carrier
            .transit_time(
                &response.pincode,
                PRODUCT_DOMESTIC_PRIORITY,
                SUB_PRODUCT_PREPAID,
                Utc::now().date_naive(),
            )
            .await
        {
            response.expected_delivery_date =
                transit.expected_delivery_date.map(|d| d.to_string());
            response.transit_days = transit.transit_days;
            response.area_code = transit.area_code;
        }
    }

    Ok(Json(response))
}

#[derive(Serialize)]
pub struct TrackingEventResponse {
    pub scan_date: String,
    pub scan_code: String,
    pub scan_description: String,
    pub scanned_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Serialize)]
pub struct TrackResponse {
    pub awb_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_delivery_date: Option<String>,
    pub events: Vec<TrackingEventResponse>,
}

/// GET /shipping/track/:awb — local tracking view, falling back to a live
/// carrier query for waybills we do not hold.
#[tracing::instrument(skip(state))]
pub async fn track<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(awb): Path<String>,
) -> Result<Json<TrackResponse>, ApiError> {
    let (shipment, events) = state.orchestrator.track_awb(&awb).await.map_err(|e| {
        // The carrier answers "no information" for unknown waybills.
        match e {
            fulfillment::FulfillmentError::Carrier(CarrierError::Business(msg)) => {
                ApiError::NotFound(msg)
            }
            other => ApiError::from(other),
        }
    })?;

    let events = events
        .into_iter()
        .map(|e| TrackingEventResponse {
            scan_date: e.scan_date.to_rfc3339(),
            scan_code: e.scan_code,
            scan_description: e.scan_description,
            scanned_location: e.scanned_location,
            instructions: e.instructions,
        })
        .collect();

    Ok(Json(TrackResponse {
        awb_number: awb,
        status: shipment.as_ref().map(|s| s.status.to_string()),
        expected_delivery_date: shipment
            .as_ref()
            .and_then(|s| s.expected_delivery_date)
            .map(|d| d.to_string()),
        events,
    }))
}

/// GET /shipping/label/:awb — shipping label PDF, for the order's owner or
/// staff. Identity arrives in `X-User-Id` / `X-Staff` headers; authenticating
/// them is the proxy's job.
#[tracing::instrument(skip(state, headers))]
pub async fn label<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(awb): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let shipment = state
        .store
        .get_shipment_by_awb(&awb)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No shipment for waybill {awb}")))?;

    let is_staff = headers
        .get("X-Staff")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true");
    if !is_staff {
        let order = state
            .store
            .get_order(shipment.order_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Order {} not found", shipment.order_id)))?;
        let caller = headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| uuid::Uuid::parse_str(v).ok());
        if caller != Some(order.user_id.as_uuid()) {
            return Err(ApiError::Forbidden("not your shipment".to_string()));
        }
    }

    let pdf = shipment
        .label_pdf
        .ok_or_else(|| ApiError::NotFound(format!("No label stored for waybill {awb}")))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"label-{awb}.pdf\""),
            ),
        ],
        pdf,
    ))
}
