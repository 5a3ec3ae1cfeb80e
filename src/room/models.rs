use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Maximum number of players in a room
pub const MAX_PLAYERS: usize = 2;

/// Stage of the match state machine
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    DigitSelection,
    SecretSetting,
    Playing,
    Finished,
}

/// Why a room reached FINISHED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    /// A guess scored full bulls
    Guessed,
    /// Connected players dropped to one or none
    Forfeit,
}

/// One entry of a player's own guess log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerGuess {
    pub guess: String,
    pub bulls: usize,
    pub cows: usize,
    pub timestamp: DateTime<Utc>,
}

/// One entry of the room-wide guess log. Entries are never modified after being appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessRecord {
    pub player_id: String,
    pub player_name: String,
    pub guess: String,
    pub bulls: usize,
    pub cows: usize,
    pub timestamp: DateTime<Utc>,
    /// 1-based position in the room history
    pub turn_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub room_id: String,
    /// 1 is the host, 2 the joiner
    pub position: u8,
    pub selected_digit_count: Option<usize>,
    pub secret: Option<String>,
    pub is_ready: bool,
    pub is_connected: bool,
    pub guess_history: Vec<PlayerGuess>,
    pub last_heartbeat: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Set on placeholder players fabricated after state loss
    pub recovered: bool,
}

impl Player {
    pub fn new(id: String, name: String, room_id: String, position: u8) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            room_id,
            position,
            selected_digit_count: None,
            secret: None,
            is_ready: false,
            is_connected: true,
            guess_history: Vec::new(),
            last_heartbeat: now,
            last_updated: now,
            recovered: false,
        }
    }

    /// Placeholder for a player whose record was lost, named `Player-XXXX` after its id
    pub fn placeholder(id: &str, room_id: String, position: u8) -> Self {
        let short: String = id.chars().take(4).collect();
        let mut player = Self::new(
            id.to_string(),
            format!("Player-{}", short.to_uppercase()),
            room_id,
            position,
        );
        player.recovered = true;
        player
    }

    pub fn is_host(&self) -> bool {
        self.position == 1
    }

    /// Digit selection, falling back to the secret's length for records that lost it
    pub fn effective_digit_count(&self) -> Option<usize> {
        self.selected_digit_count
            .or_else(|| self.secret.as_ref().map(|secret| secret.len()))
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    /// Join order; not necessarily position order
    pub players: Vec<Player>,
    pub phase: Phase,
    pub agreed_digit_count: Option<usize>,
    pub current_turn_player_id: Option<String>,
    pub history: Vec<GuessRecord>,
    pub winner_id: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub is_active: bool,
    /// Set once the room has been repaired or fabricated after state loss
    pub recovered: bool,
    pub created_at: DateTime<Utc>,
    /// Refreshed by every mutating action; drives expiry
    pub last_activity: DateTime<Utc>,
    /// Refreshed by every write to the store
    pub last_updated: DateTime<Utc>,
}

impl Room {
    /// Creates an empty room in WAITING
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            players: Vec::new(),
            phase: Phase::Waiting,
            agreed_digit_count: None,
            current_turn_player_id: None,
            history: Vec::new(),
            winner_id: None,
            finish_reason: None,
            is_active: true,
            recovered: false,
            created_at: now,
            last_activity: now,
            last_updated: now,
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    /// The other player of a two-player room
    pub fn opponent_of(&self, player_id: &str) -> Option<&Player> {
        if self.players.len() != MAX_PLAYERS || !self.has_player(player_id) {
            return None;
        }
        self.players.iter().find(|p| p.id != player_id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host())
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    pub fn connected_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_connected)
    }

    /// First free position in {1, 2}, if any
    pub fn free_position(&self) -> Option<u8> {
        (1..=MAX_PLAYERS as u8).find(|pos| self.players.iter().all(|p| p.position != *pos))
    }

    pub fn position_is_free(&self, position: u8) -> bool {
        (1..=MAX_PLAYERS as u8).contains(&position)
            && self.players.iter().all(|p| p.position != position)
    }

    /// A room matchmaking may place a new player into
    pub fn is_joinable(&self) -> bool {
        self.is_active
            && self.phase == Phase::Waiting
            && self.players.len() == 1
            && self.connected_players().count() == 1
            && !self.holds_seat_for_opponent()
    }

    /// A rebuilt room whose remaining player already made game choices keeps the free seat
    /// for the opponent those choices were made against
    pub fn holds_seat_for_opponent(&self) -> bool {
        self.recovered
            && self
                .players
                .iter()
                .any(|p| p.effective_digit_count().is_some())
    }

    /// Length of the secrets set so far, the host's first
    pub fn secret_digit_count(&self) -> Option<usize> {
        self.host()
            .and_then(|host| host.secret.as_deref())
            .or_else(|| self.players.iter().find_map(|p| p.secret.as_deref()))
            .map(str::len)
    }

    /// Digit count the players' own records point to. Secrets always have the agreed length;
    /// without one the host's selection decides.
    pub fn evidenced_digit_count(&self) -> Option<usize> {
        self.secret_digit_count()
            .or_else(|| self.host().and_then(|host| host.selected_digit_count))
            .or_else(|| self.players.iter().find_map(|p| p.selected_digit_count))
    }

    pub fn both_selected(&self) -> bool {
        self.players.len() == MAX_PLAYERS
            && self.players.iter().all(|p| p.selected_digit_count.is_some())
    }

    pub fn both_ready(&self) -> bool {
        self.players.len() == MAX_PLAYERS && self.players.iter().all(|p| p.secret.is_some())
    }

    /// Records activity for expiry purposes
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Moves the room to FINISHED; the turn pointer only lives in PLAYING
    pub fn finish(&mut self, winner_id: Option<String>, reason: FinishReason) {
        self.phase = Phase::Finished;
        self.winner_id = winner_id;
        self.finish_reason = Some(reason);
        self.current_turn_player_id = None;
    }
}
