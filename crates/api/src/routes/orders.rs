//! Checkout and payment-initiation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use carrier::CarrierApi;
use common::{OrderId, PaymentMethod, UserId};
use domain::CheckoutService;
use fulfillment::{PaymentCoordinator, ShipmentOrchestrator};
use serde::{Deserialize, Serialize};
use store::{OrderRecord, ShipmentRecord, ShippingInfo, Store};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub checkout: CheckoutService<S>,
    pub coordinator: PaymentCoordinator<S>,
    pub orchestrator: Arc<ShipmentOrchestrator<S>>,
    pub carrier: Arc<dyn CarrierApi>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: String,
    pub shipping: ShippingRequest,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Deserialize)]
pub struct ShippingRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl From<ShippingRequest> for ShippingInfo {
    fn from(req: ShippingRequest) -> Self {
        ShippingInfo {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
            address: req.address,
            city: req.city,
            state: req.state,
            pincode: req.pincode,
        }
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub items: Vec<OrderItemResponse>,
    pub subtotal_paise: i64,
    pub discount_percent: u8,
    pub total_paise: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub paid: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment: Option<ShipmentSummary>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_paise: i64,
}

#[derive(Serialize)]
pub struct ShipmentSummary {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awb_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_delivery_date: Option<String>,
}

#[derive(Serialize)]
pub struct PaymentSessionResponse {
    pub transaction_id: String,
    pub redirect_url: String,
}

pub(crate) fn order_response(order: OrderRecord, shipment: Option<ShipmentRecord>) -> OrderResponse {
    let items = order
        .items
        .iter()
        .map(|item| OrderItemResponse {
            product_id: item.product_id.to_string(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price_paise: item.unit_price.paise(),
        })
        .collect();

    OrderResponse {
        id: order.id.to_string(),
        user_id: order.user_id.to_string(),
        items,
        subtotal_paise: order.subtotal.paise(),
        discount_percent: order.discount_percent,
        total_paise: order.total.paise(),
        payment_method: order.payment_method.to_string(),
        payment_status: order.payment_status.to_string(),
        paid: order.paid,
        created_at: order.created_at.to_rfc3339(),
        shipment: shipment.map(|s| ShipmentSummary {
            id: s.id.to_string(),
            status: s.status.to_string(),
            awb_number: s.awb_number,
            expected_delivery_date: s.expected_delivery_date.map(|d| d.to_string()),
        }),
    }
}

// -- Handlers --

/// POST /orders — place an order from the user's cart.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError> {
    let user_id = parse_user_id(&req.user_id)?;
    let payment_method = req
        .payment_method
        .as_deref()
        .map(PaymentMethod::parse)
        .unwrap_or_default();

    let order = state
        .checkout
        .place_order(
            user_id,
            req.shipping.into(),
            payment_method,
            req.coupon_code.as_deref(),
        )
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(order_response(order, None)),
    ))
}

/// GET /orders/:id — load an order with its shipment summary.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.checkout.get_order(order_id).await?;
    let shipment = state.store.get_shipment_by_order(order_id).await?;
    Ok(Json(order_response(order, shipment)))
}

/// POST /orders/:id/initiate-payment — open a gateway payment session.
#[tracing::instrument(skip(state))]
pub async fn initiate_payment<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentSessionResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let session = state.coordinator.initiate(order_id).await?;
    Ok(Json(PaymentSessionResponse {
        transaction_id: session.transaction_id,
        redirect_url: session.redirect_url,
    }))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid user id: {e}")))?;
    Ok(UserId::from_uuid(uuid))
}
