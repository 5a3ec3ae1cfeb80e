use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::game::CodeError;
use crate::room::models::Phase;
use crate::room::service::RoomService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub room_service: Arc<RoomService>,
}

impl AppState {
    pub fn new(room_service: Arc<RoomService>) -> Self {
        Self { room_service }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: operation requires {expected}, room is {actual}")]
    InvalidState { expected: Phase, actual: Phase },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not your turn")]
    NotYourTurn { current_turn: Option<String> },

    #[error("Opponent has not set their secret yet")]
    OpponentNotReady,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Stable machine-readable name for the error, used in response bodies
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::InvalidState { .. } => "INVALID_STATE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::NotYourTurn { .. } => "NOT_YOUR_TURN",
            AppError::OpponentNotReady => "OPPONENT_NOT_READY",
            AppError::Conflict(_) => "CONFLICT",
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::Internal => "INTERNAL",
        }
    }
}

impl From<CodeError> for AppError {
    fn from(err: CodeError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidState { .. }
            | AppError::NotYourTurn { .. }
            | AppError::OpponentNotReady
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StorageError(_) | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        match &self {
            AppError::InvalidState { actual, .. } => {
                body["phase"] = json!(actual);
            }
            AppError::NotYourTurn { current_turn } => {
                body["currentTurn"] = json!(current_turn);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::config::GameConfig;
    use crate::room::generators::HostFirstTurnPicker;
    use crate::room::models::{Player, Room};
    use crate::room::repository::{
        InMemoryPlayerRepository, InMemoryRoomRepository, PlayerRepository, RoomRepository,
    };
    use crate::room::store::{GameStore, StoreConfig};
    use async_trait::async_trait;

    /// Room repository whose backend is always down - for degraded-mode tests
    pub struct FailingRoomRepository;

    #[async_trait]
    impl RoomRepository for FailingRoomRepository {
        async fn get_room(&self, _room_id: &str) -> Result<Option<Room>, AppError> {
            Err(AppError::StorageError("connection refused".to_string()))
        }
        async fn save_room(&self, _room: &Room) -> Result<(), AppError> {
            Err(AppError::StorageError("connection refused".to_string()))
        }
        async fn list_rooms(&self) -> Result<Vec<Room>, AppError> {
            Err(AppError::StorageError("connection refused".to_string()))
        }
        async fn purge_expired_rooms(&self) -> Result<usize, AppError> {
            Err(AppError::StorageError("connection refused".to_string()))
        }
    }

    /// Player repository whose backend is always down
    pub struct FailingPlayerRepository;

    #[async_trait]
    impl PlayerRepository for FailingPlayerRepository {
        async fn get_player(&self, _player_id: &str) -> Result<Option<Player>, AppError> {
            Err(AppError::StorageError("connection refused".to_string()))
        }
        async fn save_player(&self, _player: &Player) -> Result<(), AppError> {
            Err(AppError::StorageError("connection refused".to_string()))
        }
        async fn purge_expired_players(&self) -> Result<usize, AppError> {
            Err(AppError::StorageError("connection refused".to_string()))
        }
    }

    /// Builder for creating a RoomService with overrides for testing
    pub struct RoomServiceBuilder {
        room_repository: Option<Arc<dyn RoomRepository + Send + Sync>>,
        player_repository: Option<Arc<dyn PlayerRepository + Send + Sync>>,
        config: GameConfig,
    }

    impl RoomServiceBuilder {
        pub fn new() -> Self {
            Self {
                room_repository: None,
                player_repository: None,
                config: GameConfig::default(),
            }
        }

        pub fn with_room_repository(mut self, repo: Arc<dyn RoomRepository + Send + Sync>) -> Self {
            self.room_repository = Some(repo);
            self
        }

        pub fn with_player_repository(
            mut self,
            repo: Arc<dyn PlayerRepository + Send + Sync>,
        ) -> Self {
            self.player_repository = Some(repo);
            self
        }

        pub fn with_config(mut self, config: GameConfig) -> Self {
            self.config = config;
            self
        }

        pub fn build(self) -> RoomService {
            let store_config = StoreConfig::default();
            let room_repository = self.room_repository.unwrap_or_else(|| {
                Arc::new(InMemoryRoomRepository::new(store_config.room_ttl))
            });
            let player_repository = self.player_repository.unwrap_or_else(|| {
                Arc::new(InMemoryPlayerRepository::new(store_config.player_ttl))
            });
            let store = Arc::new(GameStore::new(
                room_repository,
                player_repository,
                store_config,
            ));
            RoomService::new(store, self.config).with_turn_picker(Arc::new(HostFirstTurnPicker))
        }
    }

    impl Default for RoomServiceBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
