// Room consistency checks. The stored phase label is never trusted on its own: it must match the
// phase that the player data supports, and the derived fields each phase needs must be present.
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::models::{FinishReason, Phase, Room, MAX_PLAYERS};

/// Result of validating a room against its player data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateCheck {
    pub valid: bool,
    pub reason: Option<String>,
}

impl StateCheck {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Highest phase the room's data supports, ignoring the stored label
pub fn derive_phase(room: &Room) -> Phase {
    let has_winner = room
        .winner_id
        .as_deref()
        .is_some_and(|winner| room.has_player(winner));
    if has_winner {
        return Phase::Finished;
    }
    if room.players.len() < MAX_PLAYERS {
        return Phase::Waiting;
    }
    if !room
        .players
        .iter()
        .all(|p| p.effective_digit_count().is_some())
    {
        return Phase::DigitSelection;
    }
    if !room.players.iter().all(|p| p.secret.is_some()) {
        return Phase::SecretSetting;
    }
    Phase::Playing
}

pub fn validate(room: &Room) -> StateCheck {
    if room.players.len() > MAX_PLAYERS {
        return StateCheck::invalid(format!("room holds {} players", room.players.len()));
    }
    if !positions_consistent(room) {
        return StateCheck::invalid("player positions are not a unique subset of {1, 2}");
    }
    if let Some(player) = room
        .players
        .iter()
        .find(|p| p.secret.is_some() && p.selected_digit_count.is_none())
    {
        return StateCheck::invalid(format!(
            "player {} has a secret but no digit selection",
            player.id
        ));
    }

    // FINISHED is terminal; whatever it holds is kept as is
    if room.phase == Phase::Finished {
        return StateCheck::ok();
    }

    if let Some(count) = room.secret_digit_count().or(room.agreed_digit_count) {
        if let Some(player) = room
            .players
            .iter()
            .find(|p| p.secret.as_ref().is_some_and(|secret| secret.len() != count))
        {
            return StateCheck::invalid(format!(
                "player {} has a secret that is not {} digits long",
                player.id, count
            ));
        }
        if room.agreed_digit_count.is_some_and(|agreed| agreed != count) {
            return StateCheck::invalid(format!(
                "agreed digit count differs from the {}-digit secrets",
                count
            ));
        }
    }

    if let Some(winner) = room.winner_id.as_deref() {
        if !room.has_player(winner) {
            return StateCheck::invalid(format!("winner {} is not in the room", winner));
        }
    }

    let derived = derive_phase(room);
    if room.phase != derived {
        return StateCheck::invalid(format!(
            "phase {} does not match room data (expected {})",
            room.phase, derived
        ));
    }

    match room.phase {
        Phase::Waiting | Phase::DigitSelection => {
            if room.current_turn_player_id.is_some() {
                return StateCheck::invalid("turn is set outside PLAYING");
            }
        }
        Phase::SecretSetting => {
            if room.agreed_digit_count.is_none() {
                return StateCheck::invalid("SECRET_SETTING needs an agreed digit count");
            }
            if room.current_turn_player_id.is_some() {
                return StateCheck::invalid("turn is set outside PLAYING");
            }
        }
        Phase::Playing => {
            if room.agreed_digit_count.is_none() {
                return StateCheck::invalid("PLAYING needs an agreed digit count");
            }
            match room.current_turn_player_id.as_deref() {
                None => return StateCheck::invalid("PLAYING needs a current turn"),
                Some(turn) if !room.has_player(turn) => {
                    return StateCheck::invalid(format!("current turn {} is not in the room", turn))
                }
                Some(_) => {}
            }
        }
        Phase::Finished => {}
    }

    StateCheck::ok()
}

/// Rewrites an inconsistent room to the phase its data supports and fills missing derived
/// fields. Returns whether anything changed; a valid room is left untouched, so repairing
/// twice is the same as repairing once.
pub fn repair(room: &mut Room) -> bool {
    let check = validate(room);
    if check.valid {
        return false;
    }

    let reason = check.reason.unwrap_or_default();
    warn!(room_id = %room.id, phase = %room.phase, reason = %reason, "Repairing room state");

    if room.players.len() > MAX_PLAYERS {
        room.players.truncate(MAX_PLAYERS);
    }
    if !positions_consistent(room) {
        for (index, player) in room.players.iter_mut().enumerate() {
            player.position = index as u8 + 1;
        }
    }
    for player in room.players.iter_mut() {
        if player.selected_digit_count.is_none() {
            player.selected_digit_count = player.secret.as_ref().map(|s| s.len());
        }
    }

    if room.phase != Phase::Finished {
        let winner_present = room
            .winner_id
            .as_deref()
            .is_some_and(|winner| room.has_player(winner));
        if !winner_present {
            room.winner_id = None;
            room.finish_reason = None;
        }

        reconcile_digit_count(room);

        let derived = derive_phase(room);
        room.phase = derived;
        match derived {
            Phase::Waiting | Phase::DigitSelection => {
                room.current_turn_player_id = None;
            }
            Phase::SecretSetting => {
                room.current_turn_player_id = None;
                backfill_digit_count(room);
            }
            Phase::Playing => {
                backfill_digit_count(room);
                let turn_valid = room
                    .current_turn_player_id
                    .as_deref()
                    .is_some_and(|turn| room.has_player(turn));
                if !turn_valid {
                    room.current_turn_player_id = resumed_turn(room);
                }
            }
            Phase::Finished => {
                room.current_turn_player_id = None;
                room.finish_reason.get_or_insert(FinishReason::Guessed);
            }
        }
    }

    room.recovered = true;
    debug!(room_id = %room.id, phase = %room.phase, "Room state repaired");
    true
}

fn positions_consistent(room: &Room) -> bool {
    let mut seen = HashSet::new();
    room.players
        .iter()
        .all(|p| (1..=MAX_PLAYERS as u8).contains(&p.position) && seen.insert(p.position))
}

/// Secrets fix the agreed count. A secret of another length is dropped so its owner sets it
/// again.
fn reconcile_digit_count(room: &mut Room) {
    let Some(count) = room.secret_digit_count() else {
        return;
    };
    room.agreed_digit_count = Some(count);
    for player in room.players.iter_mut() {
        if player.secret.as_ref().is_some_and(|secret| secret.len() != count) {
            warn!(
                room_id = %room.id,
                player_id = %player.id,
                "Dropping secret of the wrong length"
            );
            player.secret = None;
            player.is_ready = false;
        }
    }
}

/// The player with fewer guesses moves next; the host breaks a tie
fn resumed_turn(room: &Room) -> Option<String> {
    room.players
        .iter()
        .min_by_key(|p| (p.guess_history.len(), p.position))
        .map(|p| p.id.clone())
}

/// Host's selection first, otherwise whichever player selected
fn backfill_digit_count(room: &mut Room) {
    if room.agreed_digit_count.is_some() {
        return;
    }
    room.agreed_digit_count = room
        .host()
        .and_then(|host| host.effective_digit_count())
        .or_else(|| room.players.iter().find_map(|p| p.effective_digit_count()));
}
