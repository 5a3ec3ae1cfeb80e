use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::types::{
    GuessRequest, GuessResult, HealthReport, HistoryView, JoinRequest, JoinResult,
    OpponentSecret, PhaseResult, RoomPlayerRequest, RoomSnapshot, SelectDigitRequest,
    SetSecretRequest,
};
use crate::shared::{AppError, AppState};

/// HTTP handler for matchmaking
///
/// POST /room/join
/// Returns the room and player ids the client must send with every later call
#[instrument(name = "join_room", skip(state, request))]
pub async fn join_room(
    State(state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResult>, AppError> {
    let joined = state.room_service.join(request).await?;

    info!(
        room_id = %joined.room_id,
        position = joined.position,
        "Player placed in room"
    );

    Ok(Json(joined))
}

/// GET /room/status?roomId=..&playerId=..
#[instrument(name = "room_status", skip(state))]
pub async fn room_status(
    State(state): State<AppState>,
    Query(query): Query<RoomPlayerRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = state
        .room_service
        .status(&query.room_id, &query.player_id)
        .await?;
    Ok(Json(snapshot))
}

/// POST /game/select-digit
#[instrument(name = "select_digit", skip(state))]
pub async fn select_digit(
    State(state): State<AppState>,
    Json(request): Json<SelectDigitRequest>,
) -> Result<Json<PhaseResult>, AppError> {
    let result = state
        .room_service
        .select_digit_count(&request.room_id, &request.player_id, request.digits)
        .await?;
    Ok(Json(result))
}

/// POST /game/set-secret
#[instrument(name = "set_secret", skip(state, request), fields(room_id = %request.room_id))]
pub async fn set_secret(
    State(state): State<AppState>,
    Json(request): Json<SetSecretRequest>,
) -> Result<Json<PhaseResult>, AppError> {
    let result = state
        .room_service
        .set_secret(&request.room_id, &request.player_id, &request.secret)
        .await?;
    Ok(Json(result))
}

/// POST /game/guess
#[instrument(name = "make_guess", skip(state))]
pub async fn make_guess(
    State(state): State<AppState>,
    Json(request): Json<GuessRequest>,
) -> Result<Json<GuessResult>, AppError> {
    let result = state
        .room_service
        .guess(&request.room_id, &request.player_id, &request.guess)
        .await?;
    Ok(Json(result))
}

/// POST /game/leave
#[instrument(name = "leave_room", skip(state))]
pub async fn leave_room(
    State(state): State<AppState>,
    Json(request): Json<RoomPlayerRequest>,
) -> Result<StatusCode, AppError> {
    state
        .room_service
        .leave(&request.room_id, &request.player_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /rooms/:room_id
#[instrument(name = "delete_room", skip(state))]
pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.room_service.delete_room(&room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /game/history?roomId=..&playerId=..
#[instrument(name = "guess_history", skip(state))]
pub async fn guess_history(
    State(state): State<AppState>,
    Query(query): Query<RoomPlayerRequest>,
) -> Result<Json<HistoryView>, AppError> {
    let view = state
        .room_service
        .history(&query.room_id, &query.player_id)
        .await?;
    Ok(Json(view))
}

/// POST /game/opponent-secret
#[instrument(name = "opponent_secret", skip(state))]
pub async fn opponent_secret(
    State(state): State<AppState>,
    Json(request): Json<RoomPlayerRequest>,
) -> Result<Json<OpponentSecret>, AppError> {
    let revealed = state
        .room_service
        .opponent_secret(&request.room_id, &request.player_id)
        .await?;
    Ok(Json(revealed))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.room_service.health().await)
}
