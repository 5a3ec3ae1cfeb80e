#![allow(dead_code)] // Test utilities may not all be used in every test

use std::sync::Arc;

use minddigit::{
    room::{
        generators::{HostFirstTurnPicker, RandomTurnPicker, TurnPicker},
        models::Player,
        repository::{InMemoryPlayerRepository, InMemoryRoomRepository},
        GameStore, RoomService, StoreConfig,
    },
    GameConfig,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// Always hands the first turn to the joiner (position 2)
pub struct GuestFirstTurnPicker;

impl TurnPicker for GuestFirstTurnPicker {
    fn pick(&self, players: &[Player]) -> usize {
        players.iter().position(|p| p.position == 2).unwrap_or(0)
    }
}

pub struct TestSetup {
    pub service: Arc<RoomService>,
    pub rooms: Arc<InMemoryRoomRepository>,
    pub players: Arc<InMemoryPlayerRepository>,
    config: GameConfig,
    store_config: StoreConfig,
    turn_picker: Arc<dyn TurnPicker>,
}

fn service_over(
    rooms: Arc<InMemoryRoomRepository>,
    players: Arc<InMemoryPlayerRepository>,
    store_config: StoreConfig,
    config: GameConfig,
    turn_picker: Arc<dyn TurnPicker>,
) -> Arc<RoomService> {
    let store = Arc::new(GameStore::new(rooms, players, store_config));
    Arc::new(RoomService::new(store, config).with_turn_picker(turn_picker))
}

impl TestSetup {
    fn build_service(&self) -> Arc<RoomService> {
        service_over(
            self.rooms.clone(),
            self.players.clone(),
            self.store_config.clone(),
            self.config.clone(),
            self.turn_picker.clone(),
        )
    }

    /// Simulates a process restart where the room store lost everything but player
    /// records survived
    pub async fn restart_losing_rooms(&mut self) {
        self.rooms.clear().await;
        self.service = self.build_service();
    }

    /// Simulates a cold start with every store tier empty
    pub async fn restart_losing_everything(&mut self) {
        self.rooms.clear().await;
        self.players.clear().await;
        self.service = self.build_service();
    }
}

pub struct TestSetupBuilder {
    config: GameConfig,
    store_config: StoreConfig,
    turn_picker: Arc<dyn TurnPicker>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: GameConfig::default(),
            store_config: StoreConfig::default(),
            turn_picker: Arc::new(HostFirstTurnPicker),
        }
    }

    pub fn with_config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store_config(mut self, store_config: StoreConfig) -> Self {
        self.store_config = store_config;
        self
    }

    pub fn with_guest_first(mut self) -> Self {
        self.turn_picker = Arc::new(GuestFirstTurnPicker);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.turn_picker = Arc::new(RandomTurnPicker::seeded(seed));
        self
    }

    pub fn build(self) -> TestSetup {
        let rooms = Arc::new(InMemoryRoomRepository::new(self.store_config.room_ttl));
        let players = Arc::new(InMemoryPlayerRepository::new(self.store_config.player_ttl));
        let service = service_over(
            rooms.clone(),
            players.clone(),
            self.store_config.clone(),
            self.config.clone(),
            self.turn_picker.clone(),
        );

        TestSetup {
            service,
            rooms,
            players,
            config: self.config,
            store_config: self.store_config,
            turn_picker: self.turn_picker,
        }
    }
}
