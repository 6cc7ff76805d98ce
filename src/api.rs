//! HTTP API endpoints polled by the browser UI.
//!
//! Handlers validate everything that can be checked without storage (room code shape,
//! positive ids, well-formed JSON) and hand off to [`AppState`].

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;

use crate::code::RoomCode;
use crate::error::{GameError, GameResult};
use crate::protocol::*;
use crate::state::AppState;
use crate::store::AnswerWrite;
use crate::types::RoomSettings;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rooms", post(create_room))
        .route("/rooms/join", post(join_room))
        .route("/rooms/{room_code}", get(get_room))
        .route("/rooms/{room_code}/start", post(start_game))
        .route("/rooms/{room_code}/answers", post(submit_answer))
        .route("/rooms/{room_code}/questions", get(round_questions))
        .route(
            "/rooms/{room_code}/votes",
            get(vote_summary).post(submit_vote),
        )
        .route("/rooms/{room_code}/next-round", post(next_round))
        .route("/rooms/{room_code}/leave", patch(leave_room))
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> GameResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| GameError::Validation(e.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> GameResult<T> {
    params
        .map(|Query(value)| value)
        .map_err(|e| GameError::Validation(e.body_text()))
}

fn room_code(raw: &str) -> GameResult<RoomCode> {
    RoomCode::parse(raw).map_err(|e| GameError::Validation(e.to_string()))
}

fn positive_id(value: i64, field: &str) -> GameResult<i64> {
    if value > 0 {
        Ok(value)
    } else {
        Err(GameError::Validation(format!(
            "{} must be a positive integer",
            field
        )))
    }
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /rooms
async fn create_room(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RoomSettings>, JsonRejection>,
) -> GameResult<Response> {
    let settings = body(payload)?;
    let (room, host) = state.create_room(settings).await?;

    let session = RoomSession {
        player_data: PlayerData::new(&host, &room),
        room_data: RoomData::from(&room),
    };
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

/// POST /rooms/join
async fn join_room(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JoinRoomRequest>, JsonRejection>,
) -> GameResult<Response> {
    let request = body(payload)?;
    let code = room_code(&request.room_code)?;
    let (room, player) = state.join_room(&code).await?;

    let session = RoomSession {
        player_data: PlayerData::new(&player, &room),
        room_data: RoomData::from(&room),
    };
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

/// GET /rooms/{room_code}?includeAI=true&nameType=fake
async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
    params: Result<Query<RoomQuery>, QueryRejection>,
) -> GameResult<Json<RoomSnapshot>> {
    let code = room_code(&raw_code)?;
    let params = query(params)?;

    let snapshot = state
        .room_snapshot(&code, params.include_ai, params.name_type)
        .await?;
    Ok(Json(snapshot))
}

/// POST /rooms/{room_code}/start
async fn start_game(
    State(state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> GameResult<Json<GameStarted>> {
    let code = room_code(&raw_code)?;
    let request = body(payload)?;
    let player_id = positive_id(request.player_id, "playerId")?;

    Ok(Json(state.start_game(&code, player_id).await?))
}

/// POST /rooms/{room_code}/answers
async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> GameResult<Response> {
    let code = room_code(&raw_code)?;
    let request = body(payload)?;
    let player_id = positive_id(request.player_id, "playerId")?;
    let question_id = positive_id(request.question_id, "questionId")?;

    let write = state
        .submit_answer(&code, player_id, question_id, &request.answer)
        .await?;
    let response = match write {
        AnswerWrite::Inserted => (StatusCode::CREATED, Json(Ack::new("Answer submitted"))),
        AnswerWrite::Updated => (StatusCode::OK, Json(Ack::new("Answer updated"))),
    };
    Ok(response.into_response())
}

/// GET /rooms/{room_code}/questions?round=N
async fn round_questions(
    State(state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
    params: Result<Query<QuestionsQuery>, QueryRejection>,
) -> GameResult<Json<QuestionsResponse>> {
    let code = room_code(&raw_code)?;
    let params = query(params)?;

    Ok(Json(state.round_questions(&code, params.round).await?))
}

/// POST /rooms/{room_code}/votes
async fn submit_vote(
    State(state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> GameResult<Response> {
    let code = room_code(&raw_code)?;
    let request = body(payload)?;
    let voter = positive_id(request.player_id, "playerId")?;
    let target = positive_id(request.voted_player_id, "votedPlayerId")?;

    state.submit_vote(&code, voter, target).await?;
    Ok((StatusCode::CREATED, Json(Ack::new("Vote recorded"))).into_response())
}

/// GET /rooms/{room_code}/votes
async fn vote_summary(
    State(state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
) -> GameResult<Json<VoteSummary>> {
    let code = room_code(&raw_code)?;
    Ok(Json(state.vote_summary(&code).await?))
}

/// POST /rooms/{room_code}/next-round
async fn next_round(
    State(state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> GameResult<Response> {
    let code = room_code(&raw_code)?;
    let request = body(payload)?;
    let player_id = positive_id(request.player_id, "playerId")?;

    let outcome = state.next_round(&code, player_id).await?;
    let status = match outcome {
        NextRound::Started { .. } => StatusCode::CREATED,
        NextRound::GameComplete { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome)).into_response())
}

/// PATCH /rooms/{room_code}/leave
async fn leave_room(
    State(state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> GameResult<Json<Ack>> {
    let code = room_code(&raw_code)?;
    let request = body(payload)?;
    let player_id = positive_id(request.player_id, "playerId")?;

    state.leave_room(&code, player_id).await?;
    Ok(Json(Ack::new("Left the room")))
}
