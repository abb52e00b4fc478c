//! HTTP Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use miap_core::{GateState, ProductHandle, PurchaseResult, SetupPhase, StoreError};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub platform: String,
    pub setup: &'static str,
    pub ready: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub key: String,
    pub product_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub price: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub purchase: Option<PurchaseResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageResponse {
    pub opened_url: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn find_product(state: &AppState, key: &str) -> Result<ProductHandle, ApiError> {
    state.store.product(key).cloned().ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown product: {key}"),
            "UNKNOWN_PRODUCT",
        )
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let setup = match state.store.setup_phase() {
        SetupPhase::NotStarted => "not_started",
        SetupPhase::Started => "started",
        SetupPhase::Done => "done",
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        platform: state.store.platform().to_string(),
        setup,
        ready: state.store.gate_state() == GateState::Ready,
    })
}

/// Fire the platform-ready signal
pub async fn platform_ready(State(state): State<AppState>) -> StatusCode {
    if state.ready.fire() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Push the current identity; `null` means anonymous
pub async fn set_identity(
    State(state): State<AppState>,
    Json(payload): Json<IdentityRequest>,
) -> StatusCode {
    if state.identity.push(payload.user_id) {
        StatusCode::ACCEPTED
    } else {
        // Identity forwarding is off (web) or the store stopped listening
        StatusCode::NO_CONTENT
    }
}

/// List catalog products and their identifier on this platform
pub async fn list_products(State(state): State<AppState>) -> Json<Vec<ProductSummary>> {
    let products = state
        .store
        .products()
        .map(|product| ProductSummary {
            key: product.key().to_string(),
            product_id: product.product_id().map(str::to_string),
        })
        .collect();

    Json(products)
}

/// Localized price for one product
pub async fn get_price(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PriceResponse>, ApiError> {
    let product = find_product(&state, &key)?;
    let price = product.get_localized_price().await;
    Ok(Json(PriceResponse { price }))
}

/// Purchase one product
pub async fn purchase(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let product = find_product(&state, &key)?;
    let purchase = product.purchase().await;
    Ok(Json(PurchaseResponse { purchase }))
}

/// Restore purchases; the only operation that reports SDK failures
pub async fn restore_purchases(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.restore_purchases().await.map_err(|e| {
        tracing::error!("Restore failed: {}", e);
        let (status, code) = match e {
            StoreError::SetupFailed(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
            _ => (StatusCode::BAD_GATEWAY, "RESTORE_FAILED"),
        };
        api_error(status, e.user_message(), code)
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Open subscription management, reporting the URL if one was opened
pub async fn manage_subscription(State(state): State<AppState>) -> Json<ManageResponse> {
    let opened_url = state.store.go_to_subscription_management().await;
    Json(ManageResponse { opened_url })
}
