//! Storage boundary.
//!
//! Every method of [`GameStore`] is one atomic unit of work: either all of its effects become
//! visible to other callers or none do. Callers compute random choices and AI completions up
//! front and hand the store a finished plan, so no lock is held across slow I/O.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::code::RoomCode;
use crate::types::*;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Room code {0} is already in use")]
    CodeTaken(RoomCode),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Storage failure: {0}")]
    Backend(String),
}

/// Everything needed to open a room
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub code: RoomCode,
    pub settings: RoomSettings,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A fully prepared round, applied in one step by [`GameStore::commit_round`]
#[derive(Debug, Clone)]
pub struct RoundPlan {
    pub room_id: RoomId,
    /// `Start` for the first round, `Advance` for every later one
    pub transition: Transition,
    /// Round number the room must still be on; guards against concurrent commits
    pub expected_round: u32,
    pub fake_names: Vec<(PlayerId, String)>,
    pub question_ids: Vec<QuestionId>,
    pub ai_answers: Vec<PlayerAnswer>,
    pub ai_vote: Option<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerWrite {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    PlayerLeft,
    /// The host left, so everyone was removed and the room completed
    RoomClosed,
}

#[async_trait]
pub trait GameStore: Send + Sync {
    /// Insert the room with its host and AI players. Fails with [`StoreError::CodeTaken`]
    /// when a live room already holds the code.
    async fn create_room(&self, new_room: NewRoom) -> StoreResult<(Room, Player)>;

    /// Live (non-expired) room holding `code`
    async fn room_by_code(&self, code: &RoomCode, now: DateTime<Utc>)
        -> StoreResult<Option<Room>>;

    /// All players ever seated in the room, in join order
    async fn players(&self, room_id: RoomId) -> StoreResult<Vec<Player>>;

    /// Seat a new human while the room is waiting and below `max_players`
    async fn join_room(&self, room_id: RoomId, now: DateTime<Utc>) -> StoreResult<Player>;

    async fn questions_for_theme(&self, theme: &str) -> StoreResult<Vec<Question>>;

    /// Questions already linked to the room in any round
    async fn used_question_ids(&self, room_id: RoomId) -> StoreResult<HashSet<QuestionId>>;

    /// Apply a start or advance: status, vote reset, names, questions, AI answers and AI vote
    async fn commit_round(&self, plan: RoundPlan) -> StoreResult<Room>;

    /// Questions of one round, in selection order
    async fn round_questions(&self, room_id: RoomId, round: u32) -> StoreResult<Vec<Question>>;

    /// Answers by players of the room to the given questions, oldest first
    async fn answers(
        &self,
        room_id: RoomId,
        question_ids: &[QuestionId],
    ) -> StoreResult<Vec<PlayerAnswer>>;

    /// Insert or overwrite the answer keyed by `(player_id, question_id)`
    async fn upsert_answer(&self, answer: PlayerAnswer) -> StoreResult<AnswerWrite>;

    /// Record `voter`'s choice and bump `target`'s tally together
    async fn record_vote(
        &self,
        room_id: RoomId,
        round: u32,
        voter: PlayerId,
        target: PlayerId,
    ) -> StoreResult<()>;

    /// Resolve the round's elimination unless already resolved. Returns the outcome that
    /// ends up recorded, which is the earlier one if another caller got there first.
    async fn record_elimination(
        &self,
        room_id: RoomId,
        round: u32,
        eliminated: Option<PlayerId>,
    ) -> StoreResult<Option<PlayerId>>;

    /// Move an in-progress room on `expected_round` to completed
    async fn finish_room(&self, room_id: RoomId, expected_round: u32) -> StoreResult<Room>;

    async fn leave_room(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        now: DateTime<Utc>,
    ) -> StoreResult<LeaveOutcome>;
}
