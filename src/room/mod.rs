use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::shared::AppState;

// Public API - what other modules can use
pub use cleanup_task::{start_cleanup_task, CleanupConfig};
pub use service::{RoomService, SweepReport};
pub use store::{GameStore, StoreConfig};

pub mod cleanup_task;
pub mod generators;
mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod state;
pub mod store;
pub mod types;

/// Routes for matchmaking, play and health
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/room/join", post(handlers::join_room))
        .route("/room/status", get(handlers::room_status))
        .route("/game/select-digit", post(handlers::select_digit))
        .route("/game/set-secret", post(handlers::set_secret))
        .route("/game/guess", post(handlers::make_guess))
        .route("/game/leave", post(handlers::leave_room))
        .route("/game/history", get(handlers::guess_history))
        .route("/game/opponent-secret", post(handlers::opponent_secret))
        .route("/rooms/:room_id", delete(handlers::delete_room))
        .route("/health", get(handlers::health))
}
