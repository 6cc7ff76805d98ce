//! Request and response bodies of the HTTP API. Everything on the wire is camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Phase;
use crate::types::*;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_code: String,
}

/// Body of host and player actions that only identify the caller
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    pub player_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub player_id: i64,
    pub question_id: i64,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub player_id: i64,
    pub voted_player_id: i64,
}

/// Which name the room snapshot shows for each player
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NameType {
    #[default]
    Real,
    Fake,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomQuery {
    #[serde(default, rename = "includeAI")]
    pub include_ai: bool,
    #[serde(default, rename = "nameType")]
    pub name_type: NameType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionsQuery {
    pub round: Option<u32>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    pub id: PlayerId,
    pub room_id: RoomId,
    pub real_name: String,
    pub is_host: bool,
    pub join_time: DateTime<Utc>,
}

impl PlayerData {
    pub fn new(player: &Player, room: &Room) -> Self {
        Self {
            id: player.id,
            room_id: player.room_id,
            real_name: player.real_name.clone(),
            is_host: player.id == room.host_id,
            join_time: player.join_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomData {
    pub room_id: RoomId,
    pub room_code: String,
    pub room_state: RoomState,
    pub host_id: PlayerId,
    pub settings: RoomSettings,
    pub room_round: u32,
    pub round_start_time: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Room> for RoomData {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.id,
            room_code: room.code.to_string(),
            room_state: room.status.state(),
            host_id: room.host_id,
            settings: room.settings.clone(),
            room_round: room.status.round_number(),
            round_start_time: room.status.round().map(|r| r.started_at),
            expires_at: room.expires_at,
        }
    }
}

/// Returned when a player creates or joins a room
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSession {
    pub player_data: PlayerData,
    pub room_data: RoomData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: PlayerId,
    /// Real or fake name depending on the requested name type
    pub name: Option<String>,
    pub is_lost: bool,
    pub join_time: DateTime<Utc>,
    /// Present only when the AI player was asked for
    #[serde(rename = "isAI", skip_serializing_if = "Option::is_none")]
    pub is_ai: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room: RoomData,
    pub players: Vec<PlayerSummary>,
    pub phase: Option<Phase>,
    pub server_now: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_eliminated: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStarted {
    pub room_code: String,
    pub room_state: RoomState,
    pub round_number: u32,
    pub questions_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerData {
    pub player_id: PlayerId,
    pub player_name: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundQuestionData {
    pub id: QuestionId,
    pub content: String,
    pub player_answers: Vec<AnswerData>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsResponse {
    pub round: u32,
    pub questions: Vec<RoundQuestionData>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVote {
    pub voter_id: PlayerId,
    pub voter_name: Option<String>,
    pub voted_player_id: PlayerId,
    pub voted_player_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub votes: Vec<CastVote>,
    pub round_complete: bool,
    pub eliminated_player: Option<PlayerId>,
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NextRound {
    #[serde(rename_all = "camelCase")]
    Started { round_number: u32 },
    #[serde(rename_all = "camelCase")]
    GameComplete {
        game_complete: bool,
        ai_eliminated: bool,
        human_winner: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}
