use rand::seq::SliceRandom;
use rand::Rng;

use super::answer::schedule_ai_answers;
use super::vote::pick_ai_vote;
use super::{active_player, current_round, ensure_host, humans_in_play, AppState};
use crate::clock::{round_phase, Phase};
use crate::code::RoomCode;
use crate::error::{GameError, GameResult};
use crate::protocol::{GameStarted, NextRound};
use crate::store::RoundPlan;
use crate::types::*;

/// Anonymous names for `count` players, all distinct, in random order
fn fake_names<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(count);
    while names.len() < count {
        let candidate = petname::petname(2, " ")
            .map(|name| title_case(&name))
            .unwrap_or_else(|| format!("Guest {}", names.len() + 1));
        if !names.contains(&candidate) {
            names.push(candidate);
        }
    }
    names.shuffle(rng);
    names
}

fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl AppState {
    /// Host starts round one
    pub async fn start_game(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
    ) -> GameResult<GameStarted> {
        let room = self.live_room(code).await?;
        let players = self.store.players(room.id).await?;
        let now = self.now();

        active_player(&players, player_id, now)?;
        ensure_host(&room, player_id, "start the game")?;
        if room.status != RoomStatus::Waiting {
            let reason = match room.status {
                RoomStatus::Completed(_) => TransitionError::Completed,
                _ => TransitionError::AlreadyStarted,
            };
            return Err(GameError::Conflict(reason.to_string()));
        }
        if humans_in_play(&players, now) < MIN_PLAYERS as usize {
            return Err(GameError::Conflict(format!(
                "Need at least {} players to start a game",
                MIN_PLAYERS
            )));
        }

        let (room, questions_count) = self.prepare_round(&room, &players).await?;
        tracing::info!(
            "Game started in room {} with {} questions per round",
            room.code,
            questions_count
        );

        Ok(GameStarted {
            room_code: room.code.to_string(),
            room_state: room.status.state(),
            round_number: room.status.round_number(),
            questions_count,
        })
    }

    /// Host moves on once the current round is over, or ends the game
    pub async fn next_round(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
    ) -> GameResult<NextRound> {
        let room = self.live_room(code).await?;
        let players = self.store.players(room.id).await?;
        let now = self.now();

        active_player(&players, player_id, now)?;
        ensure_host(&room, player_id, "start the next round")?;
        let round = current_round(&room)?;
        if round_phase(&round, &room.settings, now) != Phase::RoundComplete {
            return Err(GameError::Conflict(format!(
                "Round {} is still in progress",
                round.number
            )));
        }

        self.resolve_round(&room, &round).await?;
        let players = self.store.players(room.id).await?;

        let humans_left = humans_in_play(&players, now);
        let ai_eliminated = players.iter().any(|p| p.id == room.ai_id && p.is_lost);
        if humans_left <= 1 || ai_eliminated {
            self.store.finish_room(room.id, round.number).await?;
            let human_winner = ai_eliminated && humans_left > 0;
            tracing::info!(
                "Game in room {} completed after round {} (AI eliminated: {})",
                room.code,
                round.number,
                ai_eliminated
            );
            return Ok(NextRound::GameComplete {
                game_complete: true,
                ai_eliminated,
                human_winner,
            });
        }

        let (room, _) = self.prepare_round(&room, &players).await?;
        let round_number = room.status.round_number();
        tracing::info!("Room {} moved on to round {}", room.code, round_number);
        Ok(NextRound::Started { round_number })
    }

    /// Everything a new round needs, computed up front and committed in one step.
    /// Round one also hands out fake names.
    async fn prepare_round(&self, room: &Room, players: &[Player]) -> GameResult<(Room, usize)> {
        let expected_round = room.status.round_number();
        let questions = self.draw_round_questions(room).await?;
        let texts = self.synthesize_answers(room, &questions).await?;

        // The round starts once the AI has its answers ready
        let started_at = self.now();
        let transition = if expected_round == 0 {
            Transition::Start { at: started_at }
        } else {
            Transition::Advance { at: started_at }
        };

        let fake_names = if expected_round == 0 {
            let seated: Vec<PlayerId> = players
                .iter()
                .filter(|p| p.is_active(started_at))
                .map(|p| p.id)
                .collect();
            let names = fake_names(seated.len(), &mut rand::rng());
            seated.into_iter().zip(names).collect()
        } else {
            Vec::new()
        };

        let ai_answers = schedule_ai_answers(
            room.ai_id,
            &questions,
            texts,
            started_at,
            room.settings.time_per_round,
        );
        let ai_vote = pick_ai_vote(players, started_at, &mut rand::rng());

        let plan = RoundPlan {
            room_id: room.id,
            transition,
            expected_round,
            fake_names,
            question_ids: questions.iter().map(|q| q.id).collect(),
            ai_answers,
            ai_vote,
        };
        let room = self.store.commit_round(plan).await?;
        Ok((room, questions.len()))
    }
}
