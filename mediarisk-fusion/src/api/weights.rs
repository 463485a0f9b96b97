//! Weight table inspection
//!
//! GET /weights, GET /weights/:pipeline

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::collections::BTreeMap;

use crate::error::{ApiError, ApiResult};
use crate::fusion::PipelineKind;
use crate::AppState;

type TableView = BTreeMap<String, f64>;

fn table_view(state: &AppState, kind: PipelineKind) -> Option<TableView> {
    state.pipeline(kind).map(|pipeline| {
        pipeline
            .weights()
            .iter()
            .map(|(modality, weight)| (modality.to_string(), weight))
            .collect()
    })
}

/// GET /weights
///
/// Configured weight table of every pipeline.
pub async fn get_weights(State(state): State<AppState>) -> Json<BTreeMap<String, TableView>> {
    let tables = PipelineKind::ALL
        .into_iter()
        .filter_map(|kind| table_view(&state, kind).map(|view| (kind.to_string(), view)))
        .collect();

    Json(tables)
}

/// GET /weights/:pipeline
pub async fn get_pipeline_weights(
    State(state): State<AppState>,
    Path(pipeline): Path<String>,
) -> ApiResult<Json<TableView>> {
    let kind: PipelineKind = pipeline
        .parse()
        .map_err(|_| ApiError::NotFound(format!("pipeline '{}'", pipeline)))?;

    table_view(&state, kind)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("pipeline '{}'", pipeline)))
}

/// Build weight inspection routes
pub fn weight_routes() -> Router<AppState> {
    Router::new()
        .route("/weights", get(get_weights))
        .route("/weights/:pipeline", get(get_pipeline_weights))
}
