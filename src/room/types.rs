use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{FinishReason, Phase, Player, PlayerGuess, Room};

/// Request payload for joining matchmaking.
/// A client retrying a join may send back the `playerId` it already received.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub player_name: String,
    #[serde(default)]
    pub player_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectDigitRequest {
    pub room_id: String,
    pub player_id: String,
    pub digits: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSecretRequest {
    pub room_id: String,
    pub player_id: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessRequest {
    pub room_id: String,
    pub player_id: String,
    pub guess: String,
}

/// Identifies a player within a room; used as body or query string
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayerRequest {
    pub room_id: String,
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResult {
    pub room_id: String,
    pub player_id: String,
    pub position: u8,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    pub phase: Phase,
    pub agreed_digit_count: Option<usize>,
}

impl From<&Room> for PhaseResult {
    fn from(room: &Room) -> Self {
        Self {
            phase: room.phase,
            agreed_digit_count: room.agreed_digit_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessResult {
    pub guess: String,
    pub bulls: usize,
    pub cows: usize,
    pub is_win: bool,
    /// Whose guess is next; absent once the game is over
    pub next_turn: Option<String>,
    pub phase: Phase,
    pub turn_index: usize,
}

/// What any player may see about a player in their room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: String,
    pub name: String,
    pub position: u8,
    pub is_host: bool,
    pub is_ready: bool,
    pub is_connected: bool,
    pub has_selected_digits: bool,
    pub selected_digit_count: Option<usize>,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            player_id: player.id.clone(),
            name: player.name.clone(),
            position: player.position,
            is_host: player.is_host(),
            is_ready: player.is_ready,
            is_connected: player.is_connected,
            has_selected_digits: player.selected_digit_count.is_some(),
            selected_digit_count: player.selected_digit_count,
        }
    }
}

/// The caller's own record, including their secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnPlayerView {
    #[serde(flatten)]
    pub player: PlayerView,
    pub secret: Option<String>,
    pub guess_history: Vec<PlayerGuess>,
}

/// Read-only view of a room for one of its players. Never contains the opponent's secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub phase: Phase,
    pub agreed_digit_count: Option<usize>,
    pub current_turn: Option<String>,
    pub is_your_turn: bool,
    pub winner_id: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub players: Vec<PlayerView>,
    pub you: OwnPlayerView,
    pub history_length: usize,
    pub recovered: bool,
    pub last_activity: DateTime<Utc>,
}

impl RoomSnapshot {
    /// Builds the snapshot seen by `player_id`, or None when they are not in the room
    pub fn for_player(room: &Room, player_id: &str) -> Option<Self> {
        let me = room.player(player_id)?;

        let mut players: Vec<PlayerView> = room.players.iter().map(PlayerView::from).collect();
        players.sort_by_key(|p| p.position);

        Some(Self {
            room_id: room.id.clone(),
            phase: room.phase,
            agreed_digit_count: room.agreed_digit_count,
            current_turn: room.current_turn_player_id.clone(),
            is_your_turn: room.current_turn_player_id.as_deref() == Some(player_id),
            winner_id: room.winner_id.clone(),
            finish_reason: room.finish_reason,
            players,
            you: OwnPlayerView {
                player: PlayerView::from(me),
                secret: me.secret.clone(),
                guess_history: me.guess_history.clone(),
            },
            history_length: room.history.len(),
            recovered: room.recovered,
            last_activity: room.last_activity,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryView {
    pub turn: usize,
    pub player_id: String,
    pub player_name: String,
    pub guess: String,
    pub bulls: usize,
    pub cows: usize,
    pub timestamp: DateTime<Utc>,
    pub is_you: bool,
    /// Compact form such as `2B 1C`
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMeta {
    pub room_id: String,
    pub phase: Phase,
    pub current_turn: Option<String>,
    pub is_your_turn: bool,
    pub total_guesses: usize,
    pub your_guesses: usize,
    pub opponent_guesses: usize,
    pub winner_id: Option<String>,
    pub is_winner: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub entries: Vec<HistoryEntryView>,
    pub meta: HistoryMeta,
}

impl HistoryView {
    pub fn for_player(room: &Room, player_id: &str) -> Self {
        let mut entries: Vec<HistoryEntryView> = room
            .history
            .iter()
            .map(|record| HistoryEntryView {
                turn: record.turn_index,
                player_id: record.player_id.clone(),
                player_name: record.player_name.clone(),
                guess: record.guess.clone(),
                bulls: record.bulls,
                cows: record.cows,
                timestamp: record.timestamp,
                is_you: record.player_id == player_id,
                result: format!("{}B {}C", record.bulls, record.cows),
            })
            .collect();
        entries.sort_by_key(|entry| entry.turn);

        let your_guesses = entries.iter().filter(|e| e.is_you).count();
        Self {
            meta: HistoryMeta {
                room_id: room.id.clone(),
                phase: room.phase,
                current_turn: room.current_turn_player_id.clone(),
                is_your_turn: room.current_turn_player_id.as_deref() == Some(player_id),
                total_guesses: entries.len(),
                your_guesses,
                opponent_guesses: entries.len() - your_guesses,
                winner_id: room.winner_id.clone(),
                is_winner: room.winner_id.as_deref() == Some(player_id),
            },
            entries,
        }
    }
}

/// Revealed to the losing player once the game is over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentSecret {
    pub opponent_id: String,
    pub opponent_name: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub room_count: usize,
    pub player_count: usize,
    /// Rooms the in-process cache could serve if the primary store went away
    pub cached_rooms: usize,
    pub primary_available: bool,
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::models::GuessRecord;

    fn playing_room() -> Room {
        let mut room = Room::new("bold-fox".to_string());
        let mut alice = Player::new("p1".into(), "Alice".into(), room.id.clone(), 1);
        alice.secret = Some("1234".into());
        let mut bob = Player::new("p2".into(), "Bob".into(), room.id.clone(), 2);
        bob.secret = Some("5678".into());
        // join order deliberately differs from position order
        room.players = vec![bob, alice];
        room.phase = Phase::Playing;
        room.current_turn_player_id = Some("p1".into());
        room
    }

    #[test]
    fn test_snapshot_hides_opponent_secret() {
        let room = playing_room();
        let snapshot = RoomSnapshot::for_player(&room, "p1").unwrap();

        assert_eq!(snapshot.you.secret.as_deref(), Some("1234"));
        assert!(snapshot.is_your_turn);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("5678"));
        assert_eq!(snapshot.players[0].player_id, "p1"); // sorted by position
    }

    #[test]
    fn test_snapshot_for_stranger_is_none() {
        assert!(RoomSnapshot::for_player(&playing_room(), "p3").is_none());
    }

    #[test]
    fn test_history_view_counts_and_result_format() {
        let mut room = playing_room();
        for (i, (player, guess, bulls, cows)) in [("p1", "5679", 3, 0), ("p2", "1243", 2, 2)]
            .into_iter()
            .enumerate()
        {
            room.history.push(GuessRecord {
                player_id: player.into(),
                player_name: player.into(),
                guess: guess.into(),
                bulls,
                cows,
                timestamp: Utc::now(),
                turn_index: i + 1,
            });
        }

        let view = HistoryView::for_player(&room, "p2");
        assert_eq!(view.meta.total_guesses, 2);
        assert_eq!(view.meta.your_guesses, 1);
        assert_eq!(view.meta.opponent_guesses, 1);
        assert_eq!(view.entries[1].result, "2B 2C");
        assert!(view.entries[1].is_you);
        assert!(!view.meta.is_your_turn);
    }
}
