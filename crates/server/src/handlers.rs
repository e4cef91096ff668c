use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use ledgerline_import::{ImportRequest, ImportResult};
use serde_json::{json, Value};

use crate::{error::ApiError, AppState, Result};

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/import/ofx
/// Parses an OFX statement and returns the normalized transactions.
/// Nothing is persisted.
pub async fn import_ofx(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ImportRequest>, JsonRejection>,
) -> Result<Json<ImportResult>> {
    let Json(request) = payload?;

    // Tokenizing is CPU-bound; keep it off the async workers.
    let importer = Arc::clone(&state.importer);
    let result = tokio::task::spawn_blocking(move || importer.import(&request))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(result))
}
