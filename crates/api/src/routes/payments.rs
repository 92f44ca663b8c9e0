//! Payment gateway callback endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use fulfillment::CallbackDisposition;
use serde::Serialize;
use store::Store;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct CallbackResponse {
    pub status: &'static str,
}

/// POST /payments/callback — apply one gateway webhook.
///
/// The signature covers the raw body, so the body is taken as-is and never
/// re-serialized before verification.
#[tracing::instrument(skip_all)]
pub async fn callback<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<CallbackResponse>, ApiError> {
    let x_verify = headers
        .get("X-VERIFY")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing X-VERIFY header".to_string()))?;

    let disposition = state.coordinator.apply_callback(&body, x_verify).await?;
    let status = match disposition {
        CallbackDisposition::Completed => "completed",
        CallbackDisposition::Replayed => "replayed",
        CallbackDisposition::Failed => "failed",
    };
    Ok(Json(CallbackResponse { status }))
}
