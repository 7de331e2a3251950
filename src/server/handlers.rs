// HTTP handlers
//
// Generation holds a std mutex and can run for seconds on CPU, so every
// inference call moves to the blocking pool. Inference itself cannot fail
// from the client's point of view (the fallback absorbs errors); only a
// crashed blocking task maps to a 500.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::types::{
    GenerateRequest, GenerateResponse, HealthResponse, PredictRequest, PredictResponse,
};
use super::AppState;
use crate::domain::SleepReading;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.pipeline.registry();
    Json(HealthResponse {
        ok: true,
        model_loaded: registry.pipeline_active(),
        model_name: registry
            .active_model()
            .unwrap_or("None")
            .to_string(),
    })
}

pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, String)> {
    let pipeline = state.pipeline.clone();
    let (data, source) =
        tokio::task::spawn_blocking(move || pipeline.generate(request.count))
            .await
            .map_err(task_failure)?;

    Ok(Json(GenerateResponse {
        success: true,
        source,
        data,
    }))
}

pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, (StatusCode, String)> {
    let reading = SleepReading {
        pressure: (&request.pressure).into(),
        sp_o2: request.sp_o2,
    };
    let examples: Vec<SleepReading> = request.examples.iter().map(SleepReading::from).collect();

    let pipeline = state.pipeline.clone();
    let (servo_action, source) =
        tokio::task::spawn_blocking(move || pipeline.predict_servo(&reading, &examples))
            .await
            .map_err(task_failure)?;

    Ok(Json(PredictResponse {
        success: true,
        source,
        servo_action,
    }))
}

fn task_failure(e: tokio::task::JoinError) -> (StatusCode, String) {
    tracing::error!("inference task failed: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "inference task failed".to_string(),
    )
}
