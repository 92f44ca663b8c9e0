//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use carrier::CarrierError;
use domain::DomainError;
use fulfillment::FulfillmentError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Authenticated identity may not access the resource.
    Forbidden(String),
    /// Checkout / catalog logic error.
    Domain(DomainError),
    /// Payment or shipment orchestration error.
    Fulfillment(FulfillmentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::EmptyCart
        | DomainError::IncompleteShippingInfo { .. }
        | DomainError::ProductNotFound(_)
        | DomainError::CouponNotFound(_)
        | DomainError::CouponExpired(_)
        | DomainError::CouponExhausted(_)
        | DomainError::MinimumOrderNotMet { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Store(store_err) => store_error_to_response(store_err, &err),
    }
}

fn store_error_to_response(err: &StoreError, displayed: &dyn std::fmt::Display) -> (StatusCode, String) {
    match err {
        // A stock shortfall is a resource conflict, not a client mistake.
        StoreError::StockUnavailable { .. } => (StatusCode::CONFLICT, displayed.to_string()),
        StoreError::OrderNotFound(_) | StoreError::ShipmentNotFound(_) => {
            (StatusCode::NOT_FOUND, displayed.to_string())
        }
        _ => {
            tracing::error!(error = %displayed, "store error");
            (StatusCode::INTERNAL_SERVER_ERROR, displayed.to_string())
        }
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    match &err {
        FulfillmentError::OrderNotFound(_) | FulfillmentError::ShipmentNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        FulfillmentError::ShipmentTerminal(_)
        | FulfillmentError::AlreadyPaid(_)
        | FulfillmentError::NoPickupCandidates => (StatusCode::CONFLICT, err.to_string()),
        FulfillmentError::InvalidSignature | FulfillmentError::UnknownTransaction(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        FulfillmentError::Gateway(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        FulfillmentError::Carrier(carrier_err) => match carrier_err {
            CarrierError::Transport(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            CarrierError::Business(_) | CarrierError::Parse(_) => {
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
        },
        FulfillmentError::Store(store_err) => store_error_to_response(store_err, &err),
        FulfillmentError::Serialization(_) => {
            tracing::error!(error = %err, "serialization error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Fulfillment(FulfillmentError::Store(err))
    }
}

impl From<CarrierError> for ApiError {
    fn from(err: CarrierError) -> Self {
        ApiError::Fulfillment(FulfillmentError::Carrier(err))
    }
}
