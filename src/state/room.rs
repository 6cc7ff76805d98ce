use super::{active_player, AppState};
use crate::clock::round_phase;
use crate::code::{RoomCode, MAX_CODE_ATTEMPTS};
use crate::error::{GameError, GameResult};
use crate::protocol::{NameType, PlayerSummary, RoomData, RoomSnapshot};
use crate::store::{LeaveOutcome, NewRoom, StoreError};
use crate::types::*;

impl AppState {
    /// Open a room with its host and AI player
    pub async fn create_room(&self, settings: RoomSettings) -> GameResult<(Room, Player)> {
        settings.validate().map_err(GameError::Validation)?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let now = self.now();
            let new_room = NewRoom {
                code: self.codes.next_code(),
                settings: settings.clone(),
                created_at: now,
                expires_at: now + self.config.room_ttl(),
            };

            match self.store.create_room(new_room).await {
                Ok((room, host)) => {
                    tracing::info!(
                        "Room {} created (id {}, theme {})",
                        room.code,
                        room.id,
                        room.settings.theme
                    );
                    return Ok((room, host));
                }
                Err(StoreError::CodeTaken(code)) => {
                    tracing::debug!("Room code {} taken (attempt {})", code, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!("No free room code after {} attempts", MAX_CODE_ATTEMPTS);
        Err(GameError::CodeSpaceExhausted)
    }

    /// Seat a new human in a waiting room
    pub async fn join_room(&self, code: &RoomCode) -> GameResult<(Room, Player)> {
        let room = self.live_room(code).await?;
        let player = self.store.join_room(room.id, self.now()).await?;

        tracing::info!("{} joined room {}", player.real_name, room.code);
        Ok((room, player))
    }

    /// Room details and its present players, as seen right now
    pub async fn room_snapshot(
        &self,
        code: &RoomCode,
        include_ai: bool,
        name_type: NameType,
    ) -> GameResult<RoomSnapshot> {
        let room = self.live_room(code).await?;
        let players = self.store.players(room.id).await?;
        let now = self.now();

        let phase = match room.status {
            RoomStatus::InProgress(round) => Some(round_phase(&round, &room.settings, now)),
            _ => None,
        };
        let ai_eliminated = match room.status {
            RoomStatus::Completed(_) => {
                Some(players.iter().any(|p| p.id == room.ai_id && p.is_lost))
            }
            _ => None,
        };

        // The AI stays anonymous until the game is over: during play it only shows up
        // under its fake name, and never flagged
        let revealed = room.status.state() == RoomState::Completed;
        let show_ai = include_ai && (revealed || name_type == NameType::Fake);

        let players = players
            .iter()
            .filter(|p| p.is_active(now))
            .filter(|p| show_ai || !p.is_ai)
            .map(|p| PlayerSummary {
                id: p.id,
                name: match name_type {
                    NameType::Real => Some(p.real_name.clone()),
                    NameType::Fake => p.fake_name.clone(),
                },
                is_lost: p.is_lost,
                join_time: p.join_time,
                is_ai: (include_ai && revealed).then_some(p.is_ai),
            })
            .collect();

        Ok(RoomSnapshot {
            room: RoomData::from(&room),
            players,
            phase,
            server_now: now,
            ai_eliminated,
        })
    }

    /// A player leaves for good; the host leaving closes the room for everyone
    pub async fn leave_room(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
    ) -> GameResult<LeaveOutcome> {
        let room = self.live_room(code).await?;
        let now = self.now();

        let players = self.store.players(room.id).await?;
        if active_player(&players, player_id, now)?.is_ai {
            return Err(GameError::Forbidden(
                "The AI player cannot leave the room".to_string(),
            ));
        }

        let outcome = self.store.leave_room(room.id, player_id, now).await?;
        match outcome {
            LeaveOutcome::RoomClosed => {
                tracing::info!("Host left, room {} closed", room.code)
            }
            LeaveOutcome::PlayerLeft => {
                tracing::info!("Player {} left room {}", player_id, room.code)
            }
        }
        Ok(outcome)
    }
}
