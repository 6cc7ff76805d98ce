use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::llm::LlmError;
use crate::store::StoreError;

pub type GameResult<T> = Result<T, GameError>;

/// Every failure a request can end in, with its HTTP status
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("AI player could not answer: {0}")]
    Completion(#[from] LlmError),

    #[error("Could not allocate a free room code")]
    CodeSpaceExhausted,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError {
    pub fn status(&self) -> StatusCode {
        match self {
            GameError::Validation(_) => StatusCode::BAD_REQUEST,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::Forbidden(_) => StatusCode::FORBIDDEN,
            GameError::Conflict(_) => StatusCode::CONFLICT,
            GameError::Completion(_) => StatusCode::BAD_GATEWAY,
            GameError::CodeSpaceExhausted => StatusCode::INTERNAL_SERVER_ERROR,
            GameError::Store(err) => match err {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Conflict(_) | StoreError::Transition(_) => StatusCode::CONFLICT,
                StoreError::CodeTaken(_) | StoreError::Backend(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub(crate) fn room_not_found() -> Self {
        GameError::NotFound("Room not found or expired".to_string())
    }

    pub(crate) fn player_not_found() -> Self {
        GameError::NotFound("Player not found in this room".to_string())
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(%status, "Request failed: {}", message);
        } else {
            tracing::warn!(%status, "Request rejected: {}", message);
        }

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransitionError;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GameError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GameError::room_not_found().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GameError::Forbidden("host only".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GameError::from(LlmError::Timeout(Duration::from_secs(3))).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GameError::CodeSpaceExhausted.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_keep_their_meaning() {
        assert_eq!(
            GameError::from(StoreError::NotFound("Player")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GameError::from(StoreError::Transition(TransitionError::AlreadyStarted)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GameError::from(StoreError::Backend("disk".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_response_body_carries_message() {
        let response = GameError::Conflict("Room is full".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Room is full");
    }
}
