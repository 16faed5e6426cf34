//! REST history surface. Independent of the live broadcast path:
//! messages sent over the WebSocket are never persisted here.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use parley_store::messages::{MessageRepo, MessageRow};
use parley_store::StoreError;

use crate::server::AppState;

/// Error surface for the REST handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct CreateMessage {
    pub sender: String,
    pub content: String,
}

/// GET / — service banner.
pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Chat Service is running" }))
}

/// GET /api/v1/messages — list persisted history, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<MessageRow>>, ApiError> {
    let repo = MessageRepo::new(state.db.clone());
    Ok(Json(repo.list(params.skip, params.limit)?))
}

/// POST /api/v1/messages — append one message; the server assigns the
/// id and timestamp.
pub async fn create_message(
    State(state): State<AppState>,
    Json(body): Json<CreateMessage>,
) -> Result<Json<MessageRow>, ApiError> {
    let repo = MessageRepo::new(state.db.clone());
    let row = repo.append(&body.sender, &body.content)?;
    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_defaults() {
        let params: ListParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.skip, 0);
        assert_eq!(params.limit, 100);
    }

    #[test]
    fn list_params_explicit_values() {
        let params: ListParams = serde_json::from_str(r#"{"skip":5,"limit":10}"#).unwrap();
        assert_eq!(params.skip, 5);
        assert_eq!(params.limit, 10);
    }

    #[test]
    fn api_error_maps_to_500() {
        let err = ApiError::Store(StoreError::Database("boom".into()));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
