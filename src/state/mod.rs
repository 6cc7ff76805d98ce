mod answer;
mod questions;
mod room;
mod round;
mod vote;

pub use answer::{ai_answer_delay, ai_instructions, sanitize_role, truncate_at_word_boundary};
pub use questions::select_questions;
pub use vote::{pick_ai_vote, pick_eliminated};

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::code::{CodeSource, RandomCodes, RoomCode};
use crate::config::ServerConfig;
use crate::error::{GameError, GameResult};
use crate::llm::{LlmConfig, LlmProvider};
use crate::store::GameStore;
use crate::types::*;

/// Shared application state. Holds no game data itself; everything lives in the store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GameStore>,
    /// Writes the AI player's answers; starting a round fails without one
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub llm_config: LlmConfig,
    pub config: ServerConfig,
    pub clock: Arc<dyn Clock>,
    pub codes: Arc<dyn CodeSource>,
}

impl AppState {
    pub fn new(store: Arc<dyn GameStore>, config: ServerConfig) -> Self {
        Self {
            store,
            llm: None,
            llm_config: LlmConfig::default(),
            config,
            clock: Arc::new(SystemClock),
            codes: Arc::new(RandomCodes),
        }
    }

    pub fn with_llm(mut self, provider: Arc<dyn LlmProvider>, llm_config: LlmConfig) -> Self {
        self.llm = Some(provider);
        self.llm_config = llm_config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Non-expired room holding `code`
    pub(crate) async fn live_room(&self, code: &RoomCode) -> GameResult<Room> {
        self.store
            .room_by_code(code, self.now())
            .await?
            .ok_or_else(GameError::room_not_found)
    }
}

/// Player of the room who has not left
pub(crate) fn active_player(
    players: &[Player],
    player_id: PlayerId,
    now: DateTime<Utc>,
) -> GameResult<&Player> {
    players
        .iter()
        .find(|p| p.id == player_id && p.is_active(now))
        .ok_or_else(GameError::player_not_found)
}

pub(crate) fn ensure_host(room: &Room, player_id: PlayerId, action: &str) -> GameResult<()> {
    if room.host_id != player_id {
        return Err(GameError::Forbidden(format!(
            "Only the host can {}",
            action
        )));
    }
    Ok(())
}

/// The round a room is currently playing
pub(crate) fn current_round(room: &Room) -> GameResult<Round> {
    match room.status {
        RoomStatus::InProgress(round) => Ok(round),
        RoomStatus::Waiting => Err(GameError::Conflict(
            TransitionError::NotStarted.to_string(),
        )),
        RoomStatus::Completed(_) => Err(GameError::Conflict(
            TransitionError::Completed.to_string(),
        )),
    }
}

/// Humans still present and not eliminated
pub(crate) fn humans_in_play(players: &[Player], now: DateTime<Utc>) -> usize {
    players
        .iter()
        .filter(|p| p.is_active_human(now) && !p.is_lost)
        .count()
}
