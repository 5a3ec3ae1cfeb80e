use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

use super::models::Player;
use crate::config::FirstTurnPolicy;

/// Trait for generating room codes
#[async_trait]
pub trait RoomCodeGenerator: Send + Sync {
    async fn generate(&self) -> String;
}

/// Pet name-based room codes, e.g. `brave-lynx`
pub struct PetNameRoomCodeGenerator;

impl PetNameRoomCodeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PetNameRoomCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomCodeGenerator for PetNameRoomCodeGenerator {
    async fn generate(&self) -> String {
        petname::Petnames::default().generate_one(2, "-")
    }
}

/// Trait for generating player identifiers
#[async_trait]
pub trait PlayerIdGenerator: Send + Sync {
    async fn generate(&self) -> String;
}

pub struct UuidPlayerIdGenerator;

impl UuidPlayerIdGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UuidPlayerIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlayerIdGenerator for UuidPlayerIdGenerator {
    async fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Chooses who guesses first once both secrets are set
pub trait TurnPicker: Send + Sync {
    /// Returns an index into `players`, which is never empty
    fn pick(&self, players: &[Player]) -> usize;
}

/// Uniform random choice; seedable so tests can pin the outcome
pub struct RandomTurnPicker {
    rng: Mutex<StdRng>,
}

impl RandomTurnPicker {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomTurnPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnPicker for RandomTurnPicker {
    fn pick(&self, players: &[Player]) -> usize {
        // a poisoned lock still holds a usable generator
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_range(0..players.len())
    }
}

/// Always the host (position 1), falling back to the first joined player
pub struct HostFirstTurnPicker;

impl TurnPicker for HostFirstTurnPicker {
    fn pick(&self, players: &[Player]) -> usize {
        players.iter().position(|p| p.is_host()).unwrap_or(0)
    }
}

/// Builds the picker matching the configured policy
pub fn turn_picker_for(policy: FirstTurnPolicy) -> Arc<dyn TurnPicker> {
    match policy {
        FirstTurnPolicy::Random => Arc::new(RandomTurnPicker::new()),
        FirstTurnPolicy::HostFirst => Arc::new(HostFirstTurnPicker),
    }
}
