use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;

use super::{active_player, current_round, AppState};
use crate::clock::{round_phase, Phase};
use crate::code::RoomCode;
use crate::error::{GameError, GameResult};
use crate::protocol::{CastVote, VoteSummary};
use crate::types::*;

/// Player to eliminate: one of those tied on the most votes, chosen at random.
/// `None` when nobody received a vote.
pub fn pick_eliminated<R: Rng + ?Sized>(players: &[Player], rng: &mut R) -> Option<PlayerId> {
    let highest = players.iter().map(|p| p.votes).max().filter(|&v| v > 0)?;
    let tied: Vec<PlayerId> = players
        .iter()
        .filter(|p| p.votes == highest)
        .map(|p| p.id)
        .collect();
    tied.choose(rng).copied()
}

/// The AI's vote: any human still in the game
pub fn pick_ai_vote<R: Rng + ?Sized>(
    players: &[Player],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<PlayerId> {
    let candidates: Vec<PlayerId> = players
        .iter()
        .filter(|p| p.is_active_human(now) && !p.is_lost)
        .map(|p| p.id)
        .collect();
    candidates.choose(rng).copied()
}

impl AppState {
    pub async fn submit_vote(
        &self,
        code: &RoomCode,
        voter_id: PlayerId,
        target_id: PlayerId,
    ) -> GameResult<()> {
        if voter_id == target_id {
            return Err(GameError::Validation(
                "You cannot vote for yourself".to_string(),
            ));
        }

        let room = self.live_room(code).await?;
        let round = current_round(&room)?;
        let now = self.now();
        if round_phase(&round, &room.settings, now) == Phase::RoundComplete {
            return Err(GameError::Conflict(
                "Voting for this round has closed".to_string(),
            ));
        }

        let players = self.store.players(room.id).await?;
        let voter = active_player(&players, voter_id, now)?;
        if voter.is_ai {
            return Err(GameError::Forbidden("The AI player votes on its own".to_string()));
        }
        if voter.is_lost {
            return Err(GameError::Forbidden(
                "Eliminated players cannot vote".to_string(),
            ));
        }
        if voter.has_voted() {
            return Err(GameError::Conflict(
                "You have already voted in this round".to_string(),
            ));
        }

        let target = players
            .iter()
            .find(|p| p.id == target_id && p.is_active(now))
            .ok_or_else(|| GameError::NotFound("Voted player not found in this room".to_string()))?;
        if target.is_lost {
            return Err(GameError::Conflict(
                "That player has already been eliminated".to_string(),
            ));
        }

        self.store
            .record_vote(room.id, round.number, voter_id, target_id)
            .await?;
        tracing::debug!(
            "Player {} voted for {} in room {} round {}",
            voter_id,
            target_id,
            room.code,
            round.number
        );
        Ok(())
    }

    /// Tally of the current round. Once the round is over its elimination is settled here,
    /// exactly once no matter how many clients poll.
    pub async fn vote_summary(&self, code: &RoomCode) -> GameResult<VoteSummary> {
        let room = self.live_room(code).await?;
        let now = self.now();

        let Some(round) = room.status.round().copied() else {
            return Ok(VoteSummary {
                votes: Vec::new(),
                round_complete: false,
                eliminated_player: None,
                phase: None,
            });
        };

        let phase = round_phase(&round, &room.settings, now);
        let round_complete = phase == Phase::RoundComplete;
        let eliminated_player = match room.status {
            RoomStatus::InProgress(_) if round_complete => {
                self.resolve_round(&room, &round).await?
            }
            _ => round.eliminated(),
        };

        let players = self.store.players(room.id).await?;
        let names: HashMap<PlayerId, Option<String>> = players
            .iter()
            .map(|p| (p.id, p.fake_name.clone()))
            .collect();

        let votes = players
            .iter()
            // The AI votes at round start; keep that quiet until answering is over
            .filter(|p| !(p.is_ai && phase == Phase::Answering))
            .filter_map(|p| {
                let voted = p.voted_player_id?;
                Some(CastVote {
                    voter_id: p.id,
                    voter_name: p.fake_name.clone(),
                    voted_player_id: voted,
                    voted_player_name: names.get(&voted).cloned().flatten(),
                })
            })
            .collect();

        Ok(VoteSummary {
            votes,
            round_complete,
            eliminated_player,
            phase: Some(phase),
        })
    }

    /// Settle who is out this round. A round already settled keeps its earlier outcome.
    pub(crate) async fn resolve_round(
        &self,
        room: &Room,
        round: &Round,
    ) -> GameResult<Option<PlayerId>> {
        if round.is_resolved() {
            return Ok(round.eliminated());
        }

        let players = self.store.players(room.id).await?;
        let candidate = pick_eliminated(&players, &mut rand::rng());
        let eliminated = self
            .store
            .record_elimination(room.id, round.number, candidate)
            .await?;

        match eliminated {
            Some(player_id) => tracing::info!(
                "Round {} in room {}: player {} eliminated",
                round.number,
                room.code,
                player_id
            ),
            None => tracing::info!(
                "Round {} in room {}: no votes, nobody eliminated",
                round.number,
                room.code
            ),
        }
        Ok(eliminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{settings, TestGame};
    use chrono::Duration;
    use std::collections::HashSet;

    fn player(id: PlayerId, votes: u32) -> Player {
        let now = Utc::now();
        Player {
            id,
            room_id: 1,
            real_name: Player::display_name(id as usize),
            fake_name: None,
            is_ai: false,
            is_lost: false,
            votes,
            voted_player_id: None,
            join_time: now,
            leave_time: now + Duration::hours(1),
        }
    }

    #[test]
    fn test_tie_break_stays_within_the_top() {
        let players = vec![player(1, 2), player(2, 2), player(3, 1), player(4, 0)];
        let mut rng = rand::rng();
        let mut seen = HashSet::new();

        for _ in 0..200 {
            let picked = pick_eliminated(&players, &mut rng).unwrap();
            assert!(picked == 1 || picked == 2);
            seen.insert(picked);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_no_votes_no_elimination() {
        let players = vec![player(1, 0), player(2, 0)];
        assert_eq!(pick_eliminated(&players, &mut rand::rng()), None);
        assert_eq!(pick_eliminated(&[], &mut rand::rng()), None);
    }

    #[test]
    fn test_ai_vote_targets_humans_in_play() {
        let now = Utc::now();
        let mut ai = player(1, 0);
        ai.is_ai = true;
        let mut lost = player(2, 0);
        lost.is_lost = true;
        let mut gone = player(3, 0);
        gone.leave_time = now - Duration::seconds(1);
        let players = vec![ai, lost, gone, player(4, 0)];

        for _ in 0..20 {
            assert_eq!(pick_ai_vote(&players, now, &mut rand::rng()), Some(4));
        }
        assert_eq!(pick_ai_vote(&players[..3], now, &mut rand::rng()), None);
    }

    #[tokio::test]
    async fn test_vote_rules() {
        let game = TestGame::new();
        let (room, host) = game.state.create_room(settings(1)).await.unwrap();
        let (_, guest) = game.state.join_room(&room.code).await.unwrap();

        let early = game.state.submit_vote(&room.code, host.id, guest.id).await;
        assert!(matches!(early, Err(GameError::Conflict(_))));

        game.state.start_game(&room.code, host.id).await.unwrap();

        let self_vote = game.state.submit_vote(&room.code, host.id, host.id).await;
        assert!(matches!(self_vote, Err(GameError::Validation(_))));

        let stranger = game.state.submit_vote(&room.code, host.id, 9999).await;
        assert!(matches!(stranger, Err(GameError::NotFound(_))));

        game.state
            .submit_vote(&room.code, host.id, guest.id)
            .await
            .unwrap();
        let again = game.state.submit_vote(&room.code, host.id, room.ai_id).await;
        assert!(matches!(again, Err(GameError::Conflict(msg)) if msg.contains("already voted")));

        let as_ai = game.state.submit_vote(&room.code, room.ai_id, host.id).await;
        assert!(matches!(as_ai, Err(GameError::Forbidden(_))));

        game.clock.advance(Duration::seconds(75));
        let late = game.state.submit_vote(&room.code, guest.id, room.ai_id).await;
        assert!(matches!(late, Err(GameError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_ai_vote_hidden_while_answering() {
        let game = TestGame::new();
        let (room, host) = game.state.create_room(settings(1)).await.unwrap();
        game.state.join_room(&room.code).await.unwrap();
        game.state.start_game(&room.code, host.id).await.unwrap();

        let answering = game.state.vote_summary(&room.code).await.unwrap();
        assert_eq!(answering.phase, Some(Phase::Answering));
        assert!(answering.votes.is_empty());

        game.clock.advance(Duration::seconds(45));
        let voting = game.state.vote_summary(&room.code).await.unwrap();
        assert_eq!(voting.phase, Some(Phase::Voting));
        assert_eq!(voting.votes.len(), 1);
        assert_eq!(voting.votes[0].voter_id, room.ai_id);
        assert!(!voting.round_complete);
        assert_eq!(voting.eliminated_player, None);
    }

    #[tokio::test]
    async fn test_elimination_is_decided_once() {
        let game = TestGame::new();
        let (room, host) = game
            .state
            .create_room(RoomSettings {
                max_players: 4,
                ..settings(1)
            })
            .await
            .unwrap();
        let (_, p2) = game.state.join_room(&room.code).await.unwrap();
        let (_, p3) = game.state.join_room(&room.code).await.unwrap();
        game.state.start_game(&room.code, host.id).await.unwrap();

        game.state.submit_vote(&room.code, host.id, p2.id).await.unwrap();
        game.state.submit_vote(&room.code, p2.id, p3.id).await.unwrap();
        game.state.submit_vote(&room.code, p3.id, host.id).await.unwrap();

        game.clock.advance(Duration::seconds(75));
        let (first, second) = tokio::join!(
            game.state.vote_summary(&room.code),
            game.state.vote_summary(&room.code)
        );
        let first = first.unwrap();
        let second = second.unwrap();

        assert!(first.round_complete);
        assert!(first.eliminated_player.is_some());
        assert_eq!(first.eliminated_player, second.eliminated_player);

        for _ in 0..5 {
            let again = game.state.vote_summary(&room.code).await.unwrap();
            assert_eq!(again.eliminated_player, first.eliminated_player);
        }

        let players = game.state.store.players(room.id).await.unwrap();
        let lost: Vec<PlayerId> = players.iter().filter(|p| p.is_lost).map(|p| p.id).collect();
        assert_eq!(lost, vec![first.eliminated_player.unwrap()]);
    }
}
