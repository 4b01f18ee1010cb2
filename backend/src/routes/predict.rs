use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};

use mapaction_common::{PredictRequest, PredictResponse};

use crate::error::Result;
use crate::AppState;

/// Run the full pipeline for one image and return the enriched prediction.
async fn predict_image(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    tracing::info!(
        image = %request.image_name,
        structures = request.sensitive_structures.len(),
        "Prediction requested"
    );

    let response = state.pipeline.run_queued(&request).await?;
    Ok(Json(response))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/image/predict", post(predict_image))
}
