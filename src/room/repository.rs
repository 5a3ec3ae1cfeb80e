use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::models::{Player, Room};
use crate::shared::AppError;

/// Trait for room storage backends
#[async_trait]
pub trait RoomRepository {
    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, AppError>;
    async fn save_room(&self, room: &Room) -> Result<(), AppError>;
    async fn list_rooms(&self) -> Result<Vec<Room>, AppError>;

    /// Drops rooms that outlived the backend's inactivity TTL, returning how many went
    async fn purge_expired_rooms(&self) -> Result<usize, AppError>;
}

/// Trait for player storage backends
#[async_trait]
pub trait PlayerRepository {
    async fn get_player(&self, player_id: &str) -> Result<Option<Player>, AppError>;
    async fn save_player(&self, player: &Player) -> Result<(), AppError>;
    async fn purge_expired_players(&self) -> Result<usize, AppError>;
}

/// True when `timestamp` is older than `ttl`
pub(crate) fn is_expired(timestamp: DateTime<Utc>, ttl: Duration) -> bool {
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => Utc::now() - timestamp > ttl,
        Err(_) => false,
    }
}

/// In-memory implementation of RoomRepository
///
/// Rooms expire once their last activity is older than the configured TTL. Data is lost
/// when the process restarts, which is exactly the situation the room service recovers from.
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<String, Room>>,
    ttl: Duration,
}

impl InMemoryRoomRepository {
    pub fn new(ttl: Duration) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the current number of stored rooms, expired ones included
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Forgets every room, simulating a cold start of the backend
    pub async fn clear(&self) {
        self.rooms.write().await.clear();
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, AppError> {
        let rooms = self.rooms.read().await;
        let room = rooms
            .get(room_id)
            .filter(|room| !is_expired(room.last_activity, self.ttl))
            .cloned();

        match &room {
            Some(r) => debug!(room_id = %room_id, phase = %r.phase, "Room found in memory"),
            None => debug!(room_id = %room_id, "Room not found in memory"),
        }

        Ok(room)
    }

    #[instrument(skip(self, room), fields(room_id = %room.id))]
    async fn save_room(&self, room: &Room) -> Result<(), AppError> {
        let mut rooms = self.rooms.write().await;
        rooms.insert(room.id.clone(), room.clone());
        debug!(phase = %room.phase, "Room saved in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<Room>, AppError> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .values()
            .filter(|room| !is_expired(room.last_activity, self.ttl))
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn purge_expired_rooms(&self) -> Result<usize, AppError> {
        let mut rooms = self.rooms.write().await;
        let initial_count = rooms.len();
        rooms.retain(|_, room| !is_expired(room.last_activity, self.ttl));
        let removed = initial_count - rooms.len();
        debug!(removed = removed, "Expired rooms purged from memory");
        Ok(removed)
    }
}

/// In-memory implementation of PlayerRepository, expiring on `last_updated`
pub struct InMemoryPlayerRepository {
    players: RwLock<HashMap<String, Player>>,
    ttl: Duration,
}

impl InMemoryPlayerRepository {
    pub fn new(ttl: Duration) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn player_count(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn clear(&self) {
        self.players.write().await.clear();
    }
}

#[async_trait]
impl PlayerRepository for InMemoryPlayerRepository {
    #[instrument(skip(self))]
    async fn get_player(&self, player_id: &str) -> Result<Option<Player>, AppError> {
        let players = self.players.read().await;
        Ok(players
            .get(player_id)
            .filter(|player| !is_expired(player.last_updated, self.ttl))
            .cloned())
    }

    #[instrument(skip(self, player), fields(player_id = %player.id))]
    async fn save_player(&self, player: &Player) -> Result<(), AppError> {
        let mut players = self.players.write().await;
        players.insert(player.id.clone(), player.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn purge_expired_players(&self) -> Result<usize, AppError> {
        let mut players = self.players.write().await;
        let initial_count = players.len();
        players.retain(|_, player| !is_expired(player.last_updated, self.ttl));
        let removed = initial_count - players.len();
        debug!(removed = removed, "Expired players purged from memory");
        Ok(removed)
    }
}
