// Library crate for the Bulls and Cows game server
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod game;
pub mod room;
pub mod shared;

// Re-export commonly used types for easier access in tests
pub use config::{DigitCountPolicy, FirstTurnPolicy, GameConfig, ServerConfig};
pub use room::models::{Phase, Player, Room};
pub use room::{router, GameStore, RoomService, StoreConfig};
pub use shared::{AppError, AppState};
