use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use super::{
    generators::{
        turn_picker_for, PetNameRoomCodeGenerator, PlayerIdGenerator, RoomCodeGenerator,
        TurnPicker, UuidPlayerIdGenerator,
    },
    models::{FinishReason, GuessRecord, Phase, Player, PlayerGuess, Room},
    repository::is_expired,
    state,
    store::GameStore,
    types::{
        GuessResult, HealthReport, HistoryView, JoinRequest, JoinResult, OpponentSecret,
        PhaseResult, RoomSnapshot,
    },
};
use crate::config::{DigitCountPolicy, GameConfig};
use crate::game::{score, Score};
use crate::shared::AppError;

/// How many generated room codes may collide with live rooms before giving up
const MAX_ROOM_CODE_ATTEMPTS: usize = 16;
const MAX_PLAYER_NAME_LEN: usize = 20;

/// Outcome of one cleanup sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_rooms: usize,
    pub expired_players: usize,
    pub disconnected_players: usize,
}

/// One async mutex per room id; operations on the same room run one at a time
#[derive(Default)]
struct RoomLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    async fn acquire(&self, room_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(room_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forgets locks nobody is holding or waiting on
    async fn prune(&self) {
        self.locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Room lifecycle manager: matchmaking, the phase transitions and recovery of lost state
pub struct RoomService {
    store: Arc<GameStore>,
    config: GameConfig,
    room_codes: Arc<dyn RoomCodeGenerator>,
    player_ids: Arc<dyn PlayerIdGenerator>,
    turn_picker: Arc<dyn TurnPicker>,
    room_locks: RoomLocks,
    // join reads many rooms before writing one, so it is serialized on its own
    matchmaking: Mutex<()>,
}

impl RoomService {
    pub fn new(store: Arc<GameStore>, config: GameConfig) -> Self {
        let turn_picker = turn_picker_for(config.first_turn);
        Self {
            store,
            config,
            room_codes: Arc::new(PetNameRoomCodeGenerator::new()),
            player_ids: Arc::new(UuidPlayerIdGenerator::new()),
            turn_picker,
            room_locks: RoomLocks::default(),
            matchmaking: Mutex::new(()),
        }
    }

    pub fn with_room_code_generator(mut self, generator: Arc<dyn RoomCodeGenerator>) -> Self {
        self.room_codes = generator;
        self
    }

    pub fn with_player_id_generator(mut self, generator: Arc<dyn PlayerIdGenerator>) -> Self {
        self.player_ids = generator;
        self
    }

    pub fn with_turn_picker(mut self, picker: Arc<dyn TurnPicker>) -> Self {
        self.turn_picker = picker;
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Loads a room through the store's recovery path and repairs it, persisting any change
    async fn load(&self, room_id: &str, player_id: Option<&str>) -> Room {
        let (mut room, mut dirty) = self.store.load_or_recover(room_id, player_id).await;
        if state::repair(&mut room) {
            dirty = true;
        }
        if dirty {
            self.store.save_room(&mut room).await;
        }
        room
    }

    /// Places the caller in the oldest waiting room, or opens a new room for them
    #[instrument(skip(self, request), fields(player_name = %request.player_name))]
    pub async fn join(&self, request: JoinRequest) -> Result<JoinResult, AppError> {
        let name = request.player_name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Player name is required".to_string()));
        }
        if name.chars().count() > MAX_PLAYER_NAME_LEN {
            return Err(AppError::InvalidInput(format!(
                "Player name must be at most {} characters",
                MAX_PLAYER_NAME_LEN
            )));
        }

        if let Some(player_id) = request.player_id.as_deref() {
            if let Some(existing) = self.rejoin(player_id).await {
                debug!(player_id = %player_id, room_id = %existing.room_id, "Join replayed");
                return Ok(existing);
            }
        }

        let _matchmaking = self.matchmaking.lock().await;

        let mut candidates: Vec<Room> = self
            .store
            .list_rooms()
            .await
            .into_iter()
            .filter(Room::is_joinable)
            .collect();
        candidates.sort_by_key(|room| room.created_at);

        for candidate in candidates {
            let _guard = self.room_locks.acquire(&candidate.id).await;
            let mut room = self.load(&candidate.id, None).await;
            if !room.is_joinable() {
                continue;
            }
            let Some(position) = room.free_position() else {
                continue;
            };

            let player_id = self.player_ids.generate().await;
            room.players.push(Player::new(
                player_id.clone(),
                name.to_string(),
                room.id.clone(),
                position,
            ));
            room.phase = Phase::DigitSelection;
            room.touch();
            self.store.save_room(&mut room).await;

            info!(room_id = %room.id, player_id = %player_id, "Player joined waiting room");
            return Ok(JoinResult {
                room_id: room.id,
                player_id,
                position,
                phase: room.phase,
            });
        }

        let room_id = self.unused_room_code().await?;
        let _guard = self.room_locks.acquire(&room_id).await;
        let player_id = self.player_ids.generate().await;

        let mut room = Room::new(room_id.clone());
        room.players.push(Player::new(
            player_id.clone(),
            name.to_string(),
            room_id.clone(),
            1,
        ));
        self.store.save_room(&mut room).await;

        info!(room_id = %room_id, player_id = %player_id, "Room created");
        Ok(JoinResult {
            room_id,
            player_id,
            position: 1,
            phase: room.phase,
        })
    }

    /// The membership a retried join refers to, if it is still live
    async fn rejoin(&self, player_id: &str) -> Option<JoinResult> {
        let record = self.store.get_player(player_id).await?;
        let _guard = self.room_locks.acquire(&record.room_id).await;
        let room = self.store.get_room(&record.room_id).await?;
        let player = room.player(player_id)?;

        if !room.is_active || room.phase == Phase::Finished || !player.is_connected {
            return None;
        }
        Some(JoinResult {
            room_id: room.id.clone(),
            player_id: player.id.clone(),
            position: player.position,
            phase: room.phase,
        })
    }

    async fn unused_room_code(&self) -> Result<String, AppError> {
        for attempt in 1..=MAX_ROOM_CODE_ATTEMPTS {
            let code = self.room_codes.generate().await;
            if !self.store.room_exists(&code).await {
                return Ok(code);
            }
            debug!(room_id = %code, attempt = attempt, "Room code already in use");
        }
        warn!(
            attempts = MAX_ROOM_CODE_ATTEMPTS,
            "Could not generate an unused room code"
        );
        Err(AppError::Internal)
    }

    #[instrument(skip(self))]
    pub async fn select_digit_count(
        &self,
        room_id: &str,
        player_id: &str,
        count: usize,
    ) -> Result<PhaseResult, AppError> {
        require_ids(room_id, player_id)?;
        let _guard = self.room_locks.acquire(room_id).await;
        let mut room = self.load(room_id, Some(player_id)).await;
        let player = require_player(&room, player_id)?;

        // a retry that arrives after the transition it caused
        if room.phase > Phase::DigitSelection && player.selected_digit_count == Some(count) {
            return Ok(PhaseResult::from(&room));
        }
        require_phase(&room, Phase::DigitSelection)?;
        self.config.code_rules.check_digit_count(count)?;

        if self.config.digit_policy == DigitCountPolicy::RequireMatch {
            if let Some(theirs) = room
                .opponent_of(player_id)
                .and_then(|opponent| opponent.selected_digit_count)
            {
                if theirs != count {
                    return Err(AppError::Conflict(format!(
                        "Digit count {} does not match the opponent's choice of {}",
                        count, theirs
                    )));
                }
            }
        }

        if let Some(player) = room.player_mut(player_id) {
            player.selected_digit_count = Some(count);
        }
        room.touch();

        if room.both_selected() {
            let agreed = match self.config.digit_policy {
                DigitCountPolicy::HostChoice => room
                    .host()
                    .and_then(|host| host.selected_digit_count)
                    .unwrap_or(count),
                DigitCountPolicy::RequireMatch => count,
            };
            room.agreed_digit_count = Some(agreed);
            room.phase = Phase::SecretSetting;
            info!(room_id = %room.id, agreed_digit_count = agreed, "Digit count agreed");
        }

        self.store.save_room(&mut room).await;
        Ok(PhaseResult::from(&room))
    }

    #[instrument(skip(self, secret))]
    pub async fn set_secret(
        &self,
        room_id: &str,
        player_id: &str,
        secret: &str,
    ) -> Result<PhaseResult, AppError> {
        require_ids(room_id, player_id)?;
        let _guard = self.room_locks.acquire(room_id).await;
        let mut room = self.load(room_id, Some(player_id)).await;
        let player = require_player(&room, player_id)?;

        if room.phase > Phase::SecretSetting && player.secret.as_deref() == Some(secret) {
            return Ok(PhaseResult::from(&room));
        }
        require_phase(&room, Phase::SecretSetting)?;
        let digits = room.agreed_digit_count.ok_or(AppError::Internal)?;
        self.config.code_rules.check_secret(secret, digits)?;

        if let Some(player) = room.player_mut(player_id) {
            player.secret = Some(secret.to_string());
            player.is_ready = true;
        }
        room.touch();

        if room.both_ready() {
            let index = self.turn_picker.pick(&room.players);
            let first = room
                .players
                .get(index)
                .or_else(|| room.players.first())
                .map(|p| p.id.clone());
            room.phase = Phase::Playing;
            room.current_turn_player_id = first;
            info!(
                room_id = %room.id,
                first_turn = ?room.current_turn_player_id,
                "Both secrets set, game started"
            );
        }

        self.store.save_room(&mut room).await;
        Ok(PhaseResult::from(&room))
    }

    #[instrument(skip(self))]
    pub async fn guess(
        &self,
        room_id: &str,
        player_id: &str,
        guess: &str,
    ) -> Result<GuessResult, AppError> {
        require_ids(room_id, player_id)?;
        let _guard = self.room_locks.acquire(room_id).await;
        let mut room = self.load(room_id, Some(player_id)).await;
        let player = require_player(&room, player_id)?;
        let player_name = player.name.clone();

        if let Some(replayed) = replayed_guess(&room, player_id, guess) {
            debug!(room_id = %room.id, "Guess replayed");
            return Ok(replayed);
        }
        require_phase(&room, Phase::Playing)?;

        // the opening guess may come from either side
        if let Some(turn) = room.current_turn_player_id.as_deref() {
            if turn != player_id && !room.history.is_empty() {
                return Err(AppError::NotYourTurn {
                    current_turn: Some(turn.to_string()),
                });
            }
        }

        let digits = room.agreed_digit_count.ok_or(AppError::Internal)?;
        self.config.code_rules.check_guess(guess, digits)?;

        let (opponent_id, opponent_secret) = match room.opponent_of(player_id) {
            Some(opponent) => match &opponent.secret {
                Some(secret) => (opponent.id.clone(), secret.clone()),
                None => return Err(AppError::OpponentNotReady),
            },
            None => return Err(AppError::OpponentNotReady),
        };

        let Score { bulls, cows } = score(guess, &opponent_secret);
        let now = Utc::now();
        let record = GuessRecord {
            player_id: player_id.to_string(),
            player_name,
            guess: guess.to_string(),
            bulls,
            cows,
            timestamp: now,
            turn_index: room.history.len() + 1,
        };
        room.history.push(record.clone());
        if let Some(player) = room.player_mut(player_id) {
            player.guess_history.push(PlayerGuess {
                guess: guess.to_string(),
                bulls,
                cows,
                timestamp: now,
            });
        }

        if (Score { bulls, cows }).is_win(digits) {
            room.finish(Some(player_id.to_string()), FinishReason::Guessed);
            info!(room_id = %room.id, winner = %player_id, turns = record.turn_index, "Game won");
        } else {
            room.current_turn_player_id = Some(opponent_id);
        }
        room.touch();
        self.store.save_room(&mut room).await;

        Ok(guess_result(&room, &record))
    }

    #[instrument(skip(self))]
    pub async fn leave(&self, room_id: &str, player_id: &str) -> Result<(), AppError> {
        require_ids(room_id, player_id)?;
        let _guard = self.room_locks.acquire(room_id).await;
        let mut room = self.load(room_id, Some(player_id)).await;
        let player = require_player(&room, player_id)?;

        if !player.is_connected {
            return Ok(());
        }
        if let Some(player) = room.player_mut(player_id) {
            player.is_connected = false;
        }
        settle_after_disconnect(&mut room);
        room.touch();
        self.store.save_room(&mut room).await;

        info!(room_id = %room.id, player_id = %player_id, phase = %room.phase, "Player left");
        Ok(())
    }

    /// Closes a room for good: it is marked inactive and everyone in it is disconnected.
    /// A room that is already closed is reported as missing.
    #[instrument(skip(self))]
    pub async fn delete_room(&self, room_id: &str) -> Result<(), AppError> {
        if room_id.trim().is_empty() {
            return Err(AppError::InvalidInput("roomId is required".to_string()));
        }
        let _guard = self.room_locks.acquire(room_id).await;
        let mut room = match self.store.get_room(room_id).await {
            Some(room) if room.is_active => room,
            _ => return Err(AppError::NotFound(format!("Room {} not found", room_id))),
        };

        for player in room.players.iter_mut() {
            player.is_connected = false;
        }
        settle_after_disconnect(&mut room);
        room.touch();
        self.store.save_room(&mut room).await;

        info!(room_id = %room.id, phase = %room.phase, "Room deleted");
        Ok(())
    }

    /// Read-mostly view for polling clients; also refreshes the caller's heartbeat
    #[instrument(skip(self))]
    pub async fn status(&self, room_id: &str, player_id: &str) -> Result<RoomSnapshot, AppError> {
        require_ids(room_id, player_id)?;
        let _guard = self.room_locks.acquire(room_id).await;
        let mut room = self.load(room_id, Some(player_id)).await;
        require_player(&room, player_id)?;

        if let Some(player) = room.player_mut(player_id) {
            player.heartbeat();
        }
        self.store.save_room(&mut room).await;

        RoomSnapshot::for_player(&room, player_id).ok_or_else(|| not_in_room(room_id, player_id))
    }

    #[instrument(skip(self))]
    pub async fn history(&self, room_id: &str, player_id: &str) -> Result<HistoryView, AppError> {
        require_ids(room_id, player_id)?;
        let _guard = self.room_locks.acquire(room_id).await;
        let room = self.load(room_id, Some(player_id)).await;
        require_player(&room, player_id)?;

        Ok(HistoryView::for_player(&room, player_id))
    }

    /// Reveals the opponent's secret to the losing side of a finished game
    #[instrument(skip(self))]
    pub async fn opponent_secret(
        &self,
        room_id: &str,
        player_id: &str,
    ) -> Result<OpponentSecret, AppError> {
        require_ids(room_id, player_id)?;
        let _guard = self.room_locks.acquire(room_id).await;
        let room = self.load(room_id, Some(player_id)).await;
        require_player(&room, player_id)?;
        require_phase(&room, Phase::Finished)?;

        if room.winner_id.as_deref() == Some(player_id) {
            return Err(AppError::Conflict(
                "The winner cannot request the opponent's secret".to_string(),
            ));
        }
        let opponent = room
            .opponent_of(player_id)
            .ok_or_else(|| AppError::NotFound("Opponent not found".to_string()))?;
        let secret = opponent
            .secret
            .clone()
            .ok_or_else(|| AppError::NotFound("Opponent secret not available".to_string()))?;

        Ok(OpponentSecret {
            opponent_id: opponent.id.clone(),
            opponent_name: opponent.name.clone(),
            secret,
        })
    }

    /// Purges expired records and disconnects players whose heartbeat went stale
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> SweepReport {
        let purged = self.store.purge_expired().await;
        let mut report = SweepReport {
            expired_rooms: purged.rooms,
            expired_players: purged.players,
            disconnected_players: 0,
        };

        let timeout = self.config.heartbeat_timeout;
        for listed in self.store.list_rooms().await {
            let has_stale = listed
                .connected_players()
                .any(|p| is_expired(p.last_heartbeat, timeout));
            if !has_stale {
                continue;
            }

            let _guard = self.room_locks.acquire(&listed.id).await;
            let Some(mut room) = self.store.get_room(&listed.id).await else {
                continue;
            };
            let mut dropped = 0;
            for player in room.players.iter_mut() {
                if player.is_connected && is_expired(player.last_heartbeat, timeout) {
                    player.is_connected = false;
                    dropped += 1;
                    info!(room_id = %listed.id, player_id = %player.id, "Heartbeat timed out");
                }
            }
            if dropped == 0 {
                continue;
            }
            settle_after_disconnect(&mut room);
            self.store.save_room(&mut room).await;
            report.disconnected_players += dropped;
        }

        self.room_locks.prune().await;
        report
    }

    pub async fn health(&self) -> HealthReport {
        let rooms = self.store.list_rooms().await;
        let player_count = rooms.iter().map(|room| room.players.len()).sum();
        let store = self.store.health().await;

        HealthReport {
            status: if store.degraded { "degraded" } else { "ok" }.to_string(),
            room_count: rooms.len(),
            player_count,
            cached_rooms: store.cached_rooms,
            primary_available: !store.degraded,
            degraded: store.degraded,
        }
    }
}

/// Forfeit rule shared by leave and heartbeat timeout
fn settle_after_disconnect(room: &mut Room) {
    let connected: Vec<String> = room.connected_players().map(|p| p.id.clone()).collect();
    if connected.len() > 1 {
        return;
    }
    room.is_active = false;
    if room.phase == Phase::Finished {
        return;
    }

    let winner = connected.into_iter().next();
    info!(room_id = %room.id, winner = ?winner, "Room finished by forfeit");
    room.finish(winner, FinishReason::Forfeit);
}

/// Recognizes a guess that was already applied: the newest history entry is the caller's
/// with the same digits and the caller has no pending turn
fn replayed_guess(room: &Room, player_id: &str, guess: &str) -> Option<GuessResult> {
    if !matches!(room.phase, Phase::Playing | Phase::Finished) {
        return None;
    }
    let last = room.history.last()?;
    let turn_moved_on = room.phase == Phase::Finished
        || room.current_turn_player_id.as_deref() != Some(player_id);
    if last.player_id == player_id && last.guess == guess && turn_moved_on {
        Some(guess_result(room, last))
    } else {
        None
    }
}

fn guess_result(room: &Room, record: &GuessRecord) -> GuessResult {
    let is_win = Score {
        bulls: record.bulls,
        cows: record.cows,
    }
    .is_win(record.guess.len());
    GuessResult {
        guess: record.guess.clone(),
        bulls: record.bulls,
        cows: record.cows,
        is_win,
        next_turn: room.current_turn_player_id.clone(),
        phase: room.phase,
        turn_index: record.turn_index,
    }
}

fn require_ids(room_id: &str, player_id: &str) -> Result<(), AppError> {
    if room_id.trim().is_empty() {
        return Err(AppError::InvalidInput("roomId is required".to_string()));
    }
    if player_id.trim().is_empty() {
        return Err(AppError::InvalidInput("playerId is required".to_string()));
    }
    Ok(())
}

fn require_player<'a>(room: &'a Room, player_id: &str) -> Result<&'a Player, AppError> {
    room.player(player_id)
        .ok_or_else(|| not_in_room(&room.id, player_id))
}

fn require_phase(room: &Room, expected: Phase) -> Result<(), AppError> {
    if room.phase != expected {
        return Err(AppError::InvalidState {
            expected,
            actual: room.phase,
        });
    }
    Ok(())
}

fn not_in_room(room_id: &str, player_id: &str) -> AppError {
    AppError::NotFound(format!("Player {} is not in room {}", player_id, room_id))
}
