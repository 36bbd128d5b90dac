use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use nd_broker::BrokerGateway;
use nd_common::NotificationRequest;
use nd_store::{NotificationStore, StoreError};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/notifications", post(submit))
        .route("/notifications/:id/status", get(status))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "UP" }))
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn submit(
    State(state): State<SharedState>,
    body: Result<Json<NotificationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let notification = req.into_pending();

    state
        .registry
        .validate(&notification)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tokio::time::timeout(state.request_timeout, state.store.save(&notification))
        .await
        .map_err(|_| ApiError::Internal("timed out saving notification".to_string()))?
        .map_err(|e| {
            error!(error = %e, "failed to save notification");
            ApiError::Internal("failed to save notification".to_string())
        })?;

    let payload = serde_json::to_vec(&notification).map_err(|e| {
        error!(error = %e, "failed to serialize notification");
        ApiError::Internal("failed to queue notification".to_string())
    })?;

    tokio::time::timeout(state.request_timeout, state.broker.publish(notification.channel, &payload))
        .await
        .map_err(|_| ApiError::Internal("timed out queuing notification".to_string()))?
        .map_err(|e| {
            error!(error = %e, "failed to queue notification");
            ApiError::Internal("failed to queue notification".to_string())
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "id": notification.id, "status": notification.status })),
    ))
}

async fn status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = Uuid::from_str(&id).map_err(|_| ApiError::NotFound("notification not found".to_string()))?;

    let notification = tokio::time::timeout(state.request_timeout, state.store.get_by_id(id))
        .await
        .map_err(|_| ApiError::Internal("timed out fetching notification".to_string()))?
        .map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::NotFound("notification not found".to_string()),
            other => {
                warn!(error = %other, "failed to fetch notification");
                ApiError::Internal("failed to fetch notification".to_string())
            }
        })?;

    Ok(Json(notification))
}
