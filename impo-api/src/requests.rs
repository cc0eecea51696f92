use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use impo_catalog::{NewProduct, Product, ProductField};
use impo_request::{
    EditOutcome, NewRequest, PurchaseRequest, QuoteView, RequestFilter, RequestPage, RequestStatus,
};
use impo_shared::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RequestDetail {
    pub request: PurchaseRequest,
    pub quote: QuoteView,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CurrencyQuery {
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditProductRequest {
    pub field: ProductField,
    /// Raw editor input, e.g. "12,50"
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct EditProductResponse {
    pub outcome: EditOutcome,
    pub product: Option<Product>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeRateRequest {
    pub exchange_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct FinalPriceRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(create_request).get(list_requests))
        .route("/v1/requests/{id}", get(get_request).delete(delete_request))
        .route("/v1/requests/{id}/products", post(add_product))
        .route(
            "/v1/requests/{id}/products/{product_id}",
            patch(edit_product).delete(remove_product),
        )
        .route("/v1/requests/{id}/exchange-rate", put(set_exchange_rate))
        .route("/v1/requests/{id}/quote", get(get_quote))
        .route("/v1/requests/{id}/final-price", put(set_final_price).delete(clear_final_price))
        .route("/v1/requests/{id}/status", post(change_status))
        .route("/v1/requests/{id}/sync", post(sync_request))
}

fn parse_currency(raw: Option<&str>) -> Result<Currency, AppError> {
    match raw {
        Some(c) => Currency::from_str(c).map_err(AppError::ValidationError),
        None => Ok(Currency::default()),
    }
}

async fn quote_for(state: &AppState, id: Uuid, currency: Currency) -> Result<QuoteView, AppError> {
    let request = state.requests.open(id).await?.snapshot().await?;
    Ok(QuoteView::build(&request, &state.engine, currency))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_request(
    State(state): State<AppState>,
    Json(new): Json<NewRequest>,
) -> Result<(StatusCode, Json<PurchaseRequest>), AppError> {
    let request = state.requests.create(new).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RequestPage>, AppError> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            RequestStatus::parse(s).ok_or_else(|| AppError::ValidationError(format!("unknown status: {}", s)))?,
        ),
        None => None,
    };

    let filter = RequestFilter {
        status,
        page: query.page,
        per_page: query.per_page,
    };
    Ok(Json(state.requests.list(&filter).await?))
}

/// Local state of the request, including edits not yet written.
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestDetail>, AppError> {
    let request = state.requests.open(id).await?.snapshot().await?;
    let quote = QuoteView::build(&request, &state.engine, Currency::default());
    Ok(Json(RequestDetail { request, quote }))
}

pub async fn delete_request(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.requests.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = state.requests.open(id).await?.add_product(draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn edit_product(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
    Json(edit): Json<EditProductRequest>,
) -> Result<Json<EditProductResponse>, AppError> {
    let session = state.requests.open(id).await?;
    let outcome = session.edit_product(product_id, edit.field, edit.value).await?;

    let product = session.snapshot().await?.product(product_id).cloned();
    Ok(Json(EditProductResponse { outcome, product }))
}

pub async fn remove_product(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.requests.open(id).await?.remove_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_exchange_rate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ExchangeRateRequest>,
) -> Result<Json<QuoteView>, AppError> {
    state.requests.open(id).await?.set_exchange_rate(body.exchange_rate).await?;
    Ok(Json(quote_for(&state, id, Currency::default()).await?))
}

pub async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CurrencyQuery>,
) -> Result<Json<QuoteView>, AppError> {
    let currency = parse_currency(query.currency.as_deref())?;
    Ok(Json(quote_for(&state, id, currency).await?))
}

/// Store the override in PEN and answer in the currency it was typed in.
pub async fn set_final_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<FinalPriceRequest>,
) -> Result<Json<QuoteView>, AppError> {
    state
        .requests
        .open(id)
        .await?
        .set_final_price(body.amount, body.currency)
        .await?;
    Ok(Json(quote_for(&state, id, body.currency).await?))
}

pub async fn clear_final_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CurrencyQuery>,
) -> Result<Json<QuoteView>, AppError> {
    let currency = parse_currency(query.currency.as_deref())?;
    state.requests.open(id).await?.clear_final_price().await?;
    Ok(Json(quote_for(&state, id, currency).await?))
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<PurchaseRequest>, AppError> {
    let status = RequestStatus::parse(&body.status)
        .ok_or_else(|| AppError::ValidationError(format!("unknown status: {}", body.status)))?;

    let request = state.requests.open(id).await?.change_status(status).await?;
    Ok(Json(request))
}

/// Write pending edits now instead of waiting for the debounce.
pub async fn sync_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseRequest>, AppError> {
    let request = state.requests.open(id).await?.flush().await?;
    Ok(Json(request))
}
