//! Tiered store adapter used by the room service.
//!
//! Every lookup goes to the primary repositories first, bounded by a timeout. Misses and
//! failures fall back to an in-process cache, and a room that neither tier knows is fabricated
//! on demand so callers see recovered state instead of an error.

use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::models::{Phase, Player, Room};
use super::repository::{is_expired, PlayerRepository, RoomRepository};
use crate::shared::AppError;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound on any single primary store call
    pub call_timeout: Duration,
    pub room_ttl: Duration,
    pub player_ttl: Duration,
    /// Digit count given to rooms fabricated after state loss
    pub recovery_digits: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(3),
            room_ttl: Duration::from_secs(60 * 60),   // 1 hour
            player_ttl: Duration::from_secs(30 * 60), // 30 minutes
            recovery_digits: 4,
        }
    }
}

/// Counters reported by the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHealth {
    pub cached_rooms: usize,
    pub cached_players: usize,
    pub degraded: bool,
}

/// Outcome of a purge pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub rooms: usize,
    pub players: usize,
}

pub struct GameStore {
    rooms: Arc<dyn RoomRepository + Send + Sync>,
    players: Arc<dyn PlayerRepository + Send + Sync>,
    room_cache: RwLock<HashMap<String, Room>>,
    player_cache: RwLock<HashMap<String, Player>>,
    config: StoreConfig,
    degraded: AtomicBool,
}

impl GameStore {
    pub fn new(
        rooms: Arc<dyn RoomRepository + Send + Sync>,
        players: Arc<dyn PlayerRepository + Send + Sync>,
        config: StoreConfig,
    ) -> Self {
        Self {
            rooms,
            players,
            room_cache: RwLock::new(HashMap::new()),
            player_cache: RwLock::new(HashMap::new()),
            config,
            degraded: AtomicBool::new(false),
        }
    }

    /// True when the last primary call failed or timed out
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Runs a primary store call under the configured timeout, tracking degraded mode
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(Ok(value)) => {
                self.degraded.store(false, Ordering::Relaxed);
                Ok(value)
            }
            Ok(Err(err)) => {
                warn!(operation = operation, error = %err, "Primary store call failed");
                self.degraded.store(true, Ordering::Relaxed);
                Err(err)
            }
            Err(_) => {
                warn!(
                    operation = operation,
                    timeout_ms = self.config.call_timeout.as_millis() as u64,
                    "Primary store call timed out"
                );
                self.degraded.store(true, Ordering::Relaxed);
                Err(AppError::StorageError(format!("{} timed out", operation)))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get_room(&self, room_id: &str) -> Option<Room> {
        match self.bounded("get_room", self.rooms.get_room(room_id)).await {
            Ok(Some(room)) => {
                self.room_cache
                    .write()
                    .await
                    .insert(room_id.to_string(), room.clone());
                Some(room)
            }
            Ok(None) | Err(_) => {
                let cached = self.cached_room(room_id).await;
                if cached.is_some() {
                    debug!(room_id = %room_id, "Room served from memory cache");
                }
                cached
            }
        }
    }

    async fn cached_room(&self, room_id: &str) -> Option<Room> {
        self.room_cache
            .read()
            .await
            .get(room_id)
            .filter(|room| !is_expired(room.last_activity, self.config.room_ttl))
            .cloned()
    }

    pub async fn room_exists(&self, room_id: &str) -> bool {
        self.get_room(room_id).await.is_some()
    }

    /// Writes a room and mirrors its players into the player store.
    ///
    /// Never fails: when the primary store is unavailable the write lands in the cache only.
    #[instrument(skip(self, room), fields(room_id = %room.id))]
    pub async fn save_room(&self, room: &mut Room) {
        let now = Utc::now();
        room.last_updated = now;
        for player in room.players.iter_mut() {
            player.last_updated = now;
        }

        self.room_cache
            .write()
            .await
            .insert(room.id.clone(), room.clone());
        if self
            .bounded("save_room", self.rooms.save_room(room))
            .await
            .is_err()
        {
            debug!("Room kept in memory cache only");
        }

        for player in &room.players {
            self.save_player(player).await;
        }
    }

    #[instrument(skip(self))]
    pub async fn get_player(&self, player_id: &str) -> Option<Player> {
        match self
            .bounded("get_player", self.players.get_player(player_id))
            .await
        {
            Ok(Some(player)) => {
                self.player_cache
                    .write()
                    .await
                    .insert(player_id.to_string(), player.clone());
                Some(player)
            }
            Ok(None) | Err(_) => self
                .player_cache
                .read()
                .await
                .get(player_id)
                .filter(|player| !is_expired(player.last_updated, self.config.player_ttl))
                .cloned(),
        }
    }

    async fn save_player(&self, player: &Player) {
        self.player_cache
            .write()
            .await
            .insert(player.id.clone(), player.clone());
        if self
            .bounded("save_player", self.players.save_player(player))
            .await
            .is_err()
        {
            debug!(player_id = %player.id, "Player kept in memory cache only");
        }
    }

    /// All live rooms: the primary's view plus anything only the cache still knows
    #[instrument(skip(self))]
    pub async fn list_rooms(&self) -> Vec<Room> {
        let mut rooms = self
            .bounded("list_rooms", self.rooms.list_rooms())
            .await
            .unwrap_or_default();

        let cache = self.room_cache.read().await;
        for cached in cache.values() {
            if !is_expired(cached.last_activity, self.config.room_ttl)
                && rooms.iter().all(|room| room.id != cached.id)
            {
                rooms.push(cached.clone());
            }
        }
        rooms
    }

    /// Loads a room, fabricating a fresh WAITING room when every tier has lost it.
    ///
    /// When `player_id` is given and the player is missing from the room, the player is
    /// restored from the player store or, for a recovered room still in WAITING, replaced by a
    /// placeholder. Otherwise a room only takes back a player whose stored record points at it.
    /// The returned flag tells the caller the room differs from what is stored.
    #[instrument(skip(self))]
    pub async fn load_or_recover(&self, room_id: &str, player_id: Option<&str>) -> (Room, bool) {
        let (mut room, fabricated) = match self.get_room(room_id).await {
            Some(room) => (room, false),
            None => {
                warn!(room_id = %room_id, "Room lost from every store tier, fabricating a new one");
                let mut room = Room::new(room_id.to_string());
                room.agreed_digit_count = Some(self.config.recovery_digits);
                room.recovered = true;
                (room, true)
            }
        };
        let mut dirty = fabricated;

        let Some(player_id) = player_id else {
            return (room, dirty);
        };
        if room.has_player(player_id) {
            return (room, dirty);
        }
        let Some(position) = room.free_position() else {
            return (room, dirty);
        };

        let restored = match self.get_player(player_id).await {
            Some(record) if record.room_id == room.id => Some(record),
            Some(record) => {
                debug!(
                    player_id = %player_id,
                    other_room = %record.room_id,
                    "Player belongs to another room, not restoring"
                );
                None
            }
            None if room.recovered && room.phase == Phase::Waiting => {
                Some(Player::placeholder(player_id, room.id.clone(), position))
            }
            None => None,
        };

        if let Some(mut player) = restored {
            if !room.position_is_free(player.position) {
                player.position = position;
            }
            info!(
                room_id = %room.id,
                player_id = %player.id,
                position = player.position,
                placeholder = player.recovered,
                "Player restored into room"
            );
            let rebuilt = room.recovered;
            room.players.push(player);
            // a rebuilt room takes the digit count its returning players agreed on
            if rebuilt {
                if let Some(count) = room.evidenced_digit_count() {
                    room.agreed_digit_count = Some(count);
                }
            }
            room.recovered = true;
            dirty = true;
        }

        (room, dirty)
    }

    /// Drops expired rooms and players from both tiers
    #[instrument(skip(self))]
    pub async fn purge_expired(&self) -> PurgeReport {
        let cached_rooms_removed = {
            let mut cache = self.room_cache.write().await;
            let before = cache.len();
            cache.retain(|_, room| !is_expired(room.last_activity, self.config.room_ttl));
            before - cache.len()
        };
        let cached_players_removed = {
            let mut cache = self.player_cache.write().await;
            let before = cache.len();
            cache.retain(|_, player| !is_expired(player.last_updated, self.config.player_ttl));
            before - cache.len()
        };

        let rooms = self
            .bounded("purge_expired_rooms", self.rooms.purge_expired_rooms())
            .await
            .unwrap_or(cached_rooms_removed);
        let players = self
            .bounded("purge_expired_players", self.players.purge_expired_players())
            .await
            .unwrap_or(cached_players_removed);

        PurgeReport { rooms, players }
    }

    pub async fn health(&self) -> StoreHealth {
        StoreHealth {
            cached_rooms: self.room_cache.read().await.len(),
            cached_players: self.player_cache.read().await.len(),
            degraded: self.is_degraded(),
        }
    }
}
