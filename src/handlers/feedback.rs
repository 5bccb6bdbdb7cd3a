// src/handlers/feedback.rs

use axum::{Json, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{error::AppError, models::attempt::FeedbackRequest};

/// Accepts quiz feedback. Validated but intentionally not persisted.
pub async fn submit_feedback(
    Json(payload): Json<FeedbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    tracing::info!(rating = payload.rating, "Feedback received");

    Ok(Json(json!({
        "message": "Feedback submitted successfully"
    })))
}
