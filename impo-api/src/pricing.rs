use axum::{extract::State, routing::post, Json, Router};
use impo_catalog::NewProduct;
use impo_request::{check_final_price, check_rate, QuoteView};
use impo_shared::{round_money, Currency};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub products: Vec<NewProduct>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub final_price: Option<FinalPriceInput>,
}

#[derive(Debug, Deserialize)]
pub struct FinalPriceInput {
    pub amount: Decimal,
    pub currency: Currency,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/pricing/quote", post(quote))
}

/// Price a product list without creating a request.
pub async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<QuoteView>, AppError> {
    let exchange_rate = check_rate(req.exchange_rate)?;
    let rate = state.engine.exchange_rate(exchange_rate);

    let products = req
        .products
        .into_iter()
        .map(|p| p.into_product(rate))
        .collect::<Result<Vec<_>, _>>()?;

    let final_price_pen = match req.final_price {
        Some(fp) => {
            check_final_price(fp.amount)?;
            Some(round_money(rate.convert(fp.amount, fp.currency, Currency::Pen)))
        }
        None => None,
    };

    Ok(Json(QuoteView::for_products(
        &products,
        exchange_rate,
        final_price_pen,
        &state.engine,
        req.currency,
    )))
}
