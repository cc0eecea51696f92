use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use impo_request::{ClientInfo, Proforma, ProformaConditions, ProformaItem, ProformaWizard};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// All wizard steps submitted at once
#[derive(Debug, Deserialize)]
pub struct CreateProformaRequest {
    pub client: ClientInfo,
    pub items: Vec<ProformaItem>,
    pub conditions: ProformaConditions,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/proformas", post(create_proforma))
}

pub async fn create_proforma(
    State(state): State<AppState>,
    Json(req): Json<CreateProformaRequest>,
) -> Result<(StatusCode, Json<Proforma>), AppError> {
    let mut wizard = ProformaWizard::new();
    wizard.submit_client(req.client)?;
    wizard.submit_items(req.items)?;
    wizard.submit_conditions(req.conditions)?;

    let proforma = wizard.finish(state.next_proforma_sequence())?;
    Ok((StatusCode::CREATED, Json(proforma)))
}
