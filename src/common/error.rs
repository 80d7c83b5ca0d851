use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::lobby::error::LobbyError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Api error: {0} - {1}")]
    Api(StatusCode, String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lock was poisoned")]
    PoisonError,
}

impl From<LobbyError> for ServerError {
    fn from(e: LobbyError) -> Self {
        match e {
            LobbyError::LobbyNotFound(_) => ServerError::NotFound(e.to_string()),
            LobbyError::PlayerNotInLobby(_) => ServerError::Api(StatusCode::FORBIDDEN, e.to_string()),
            LobbyError::InvalidState(_)
            | LobbyError::DuplicateSession(_)
            | LobbyError::AlreadyStarted
            | LobbyError::FeedTaken(_) => ServerError::Api(StatusCode::CONFLICT, e.to_string()),
            LobbyError::PoisonedLock => ServerError::PoisonError,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::Api(status, message) => (status, message),
            ServerError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ServerError::PoisonError => {
                error!("Request hit a poisoned lock");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
