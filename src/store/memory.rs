use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::*;
use crate::questions::QuestionSeed;

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, Room>,
    players: BTreeMap<PlayerId, Player>,
    questions: BTreeMap<QuestionId, Question>,
    room_questions: Vec<RoomQuestion>,
    answers: HashMap<(PlayerId, QuestionId), PlayerAnswer>,
    last_room_id: RoomId,
    last_player_id: PlayerId,
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

impl Tables {
    fn room(&self, room_id: RoomId) -> StoreResult<&Room> {
        self.rooms.get(&room_id).ok_or(StoreError::NotFound("Room"))
    }

    fn room_player(&self, room_id: RoomId, player_id: PlayerId) -> StoreResult<&Player> {
        self.players
            .get(&player_id)
            .filter(|p| p.room_id == room_id)
            .ok_or(StoreError::NotFound("Player"))
    }

    fn players_in(&self, room_id: RoomId) -> impl Iterator<Item = &Player> {
        self.players.values().filter(move |p| p.room_id == room_id)
    }
}

/// In-process store; a single lock over all tables makes every call atomic
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions(seeds: Vec<QuestionSeed>) -> Self {
        let questions = seeds
            .into_iter()
            .zip(1..)
            .map(|(seed, id)| {
                (
                    id,
                    Question {
                        id,
                        theme: seed.theme,
                        content: seed.content,
                        views: 0,
                    },
                )
            })
            .collect();

        Self {
            tables: RwLock::new(Tables {
                questions,
                ..Tables::default()
            }),
        }
    }

    pub async fn question(&self, question_id: QuestionId) -> Option<Question> {
        self.tables.read().await.questions.get(&question_id).cloned()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn create_room(&self, new_room: NewRoom) -> StoreResult<(Room, Player)> {
        let mut tables = self.tables.write().await;

        let taken = tables
            .rooms
            .values()
            .any(|r| r.code == new_room.code && r.is_live(new_room.created_at));
        if taken {
            return Err(StoreError::CodeTaken(new_room.code));
        }

        let room_id = next_id(&mut tables.last_room_id);
        let host_id = next_id(&mut tables.last_player_id);
        let ai_id = next_id(&mut tables.last_player_id);

        let seat = |id: PlayerId, real_name: String, is_ai: bool| Player {
            id,
            room_id,
            real_name,
            fake_name: None,
            is_ai,
            is_lost: false,
            votes: 0,
            voted_player_id: None,
            join_time: new_room.created_at,
            leave_time: new_room.expires_at,
        };
        let host = seat(host_id, Player::display_name(1), false);
        let ai = seat(ai_id, "AI".to_string(), true);

        let room = Room {
            id: room_id,
            code: new_room.code,
            host_id,
            ai_id,
            settings: new_room.settings,
            status: RoomStatus::Waiting,
            created_at: new_room.created_at,
            expires_at: new_room.expires_at,
        };

        tables.players.insert(host_id, host.clone());
        tables.players.insert(ai_id, ai);
        tables.rooms.insert(room_id, room.clone());

        Ok((room, host))
    }

    async fn room_by_code(
        &self,
        code: &RoomCode,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Room>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rooms
            .values()
            .find(|r| &r.code == code && r.is_live(now))
            .cloned())
    }

    async fn players(&self, room_id: RoomId) -> StoreResult<Vec<Player>> {
        let tables = self.tables.read().await;
        Ok(tables.players_in(room_id).cloned().collect())
    }

    async fn join_room(&self, room_id: RoomId, now: DateTime<Utc>) -> StoreResult<Player> {
        let mut tables = self.tables.write().await;
        let room = tables.room(room_id)?;

        match room.status {
            RoomStatus::Waiting => {}
            RoomStatus::InProgress(_) => return Err(TransitionError::AlreadyStarted.into()),
            RoomStatus::Completed(_) => return Err(TransitionError::Completed.into()),
        }

        let active_humans = tables
            .players_in(room_id)
            .filter(|p| p.is_active_human(now))
            .count();
        if active_humans >= room.settings.max_players as usize {
            return Err(StoreError::Conflict("Room is full".to_string()));
        }

        let seated_humans = tables.players_in(room_id).filter(|p| !p.is_ai).count();
        let leave_time = room.expires_at;

        let player = Player {
            id: next_id(&mut tables.last_player_id),
            room_id,
            real_name: Player::display_name(seated_humans + 1),
            fake_name: None,
            is_ai: false,
            is_lost: false,
            votes: 0,
            voted_player_id: None,
            join_time: now,
            leave_time,
        };
        tables.players.insert(player.id, player.clone());

        Ok(player)
    }

    async fn questions_for_theme(&self, theme: &str) -> StoreResult<Vec<Question>> {
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .values()
            .filter(|q| q.theme == theme)
            .cloned()
            .collect())
    }

    async fn used_question_ids(&self, room_id: RoomId) -> StoreResult<HashSet<QuestionId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .room_questions
            .iter()
            .filter(|rq| rq.room_id == room_id)
            .map(|rq| rq.question_id)
            .collect())
    }

    async fn commit_round(&self, plan: RoundPlan) -> StoreResult<Room> {
        let mut tables = self.tables.write().await;
        let room = tables.room(plan.room_id)?;

        // Validate everything before touching any table
        if room.status.round_number() != plan.expected_round {
            return Err(StoreError::Conflict(
                "Round changed while the next one was being prepared".to_string(),
            ));
        }
        let status = room.status.transition(plan.transition)?;
        let round = status.round_number();

        let used: HashSet<QuestionId> = tables
            .room_questions
            .iter()
            .filter(|rq| rq.room_id == plan.room_id)
            .map(|rq| rq.question_id)
            .collect();
        for question_id in &plan.question_ids {
            if !tables.questions.contains_key(question_id) {
                return Err(StoreError::NotFound("Question"));
            }
            if used.contains(question_id) {
                return Err(StoreError::Conflict(format!(
                    "Question {} was already used in this room",
                    question_id
                )));
            }
        }
        for (player_id, _) in &plan.fake_names {
            tables.room_player(plan.room_id, *player_id)?;
        }
        for answer in &plan.ai_answers {
            tables.room_player(plan.room_id, answer.player_id)?;
            if !plan.question_ids.contains(&answer.question_id) {
                return Err(StoreError::Backend(format!(
                    "AI answer for question {} outside the round",
                    answer.question_id
                )));
            }
        }
        let ai_id = room.ai_id;
        if let Some(target) = plan.ai_vote {
            tables.room_player(plan.room_id, target)?;
        }

        for player in tables.players.values_mut() {
            if player.room_id == plan.room_id {
                player.votes = 0;
                player.voted_player_id = None;
            }
        }
        for (player_id, name) in plan.fake_names {
            if let Some(player) = tables.players.get_mut(&player_id) {
                player.fake_name = Some(name);
            }
        }
        for question_id in &plan.question_ids {
            if let Some(question) = tables.questions.get_mut(question_id) {
                question.views += 1;
            }
            tables.room_questions.push(RoomQuestion {
                room_id: plan.room_id,
                round,
                question_id: *question_id,
            });
        }
        for answer in plan.ai_answers {
            tables
                .answers
                .insert((answer.player_id, answer.question_id), answer);
        }
        if let Some(target) = plan.ai_vote {
            if let Some(ai) = tables.players.get_mut(&ai_id) {
                ai.voted_player_id = Some(target);
            }
            if let Some(voted) = tables.players.get_mut(&target) {
                voted.votes += 1;
            }
        }

        let room = tables
            .rooms
            .get_mut(&plan.room_id)
            .ok_or(StoreError::NotFound("Room"))?;
        room.status = status;
        Ok(room.clone())
    }

    async fn round_questions(&self, room_id: RoomId, round: u32) -> StoreResult<Vec<Question>> {
        let tables = self.tables.read().await;
        Ok(tables
            .room_questions
            .iter()
            .filter(|rq| rq.room_id == room_id && rq.round == round)
            .filter_map(|rq| tables.questions.get(&rq.question_id).cloned())
            .collect())
    }

    async fn answers(
        &self,
        room_id: RoomId,
        question_ids: &[QuestionId],
    ) -> StoreResult<Vec<PlayerAnswer>> {
        let tables = self.tables.read().await;
        let mut answers: Vec<PlayerAnswer> = tables
            .answers
            .values()
            .filter(|a| question_ids.contains(&a.question_id))
            .filter(|a| {
                tables
                    .players
                    .get(&a.player_id)
                    .is_some_and(|p| p.room_id == room_id)
            })
            .cloned()
            .collect();
        answers.sort_by_key(|a| (a.created_at, a.player_id));
        Ok(answers)
    }

    async fn upsert_answer(&self, answer: PlayerAnswer) -> StoreResult<AnswerWrite> {
        let mut tables = self.tables.write().await;
        match tables.answers.get_mut(&(answer.player_id, answer.question_id)) {
            Some(existing) => {
                existing.content = answer.content;
                Ok(AnswerWrite::Updated)
            }
            None => {
                tables
                    .answers
                    .insert((answer.player_id, answer.question_id), answer);
                Ok(AnswerWrite::Inserted)
            }
        }
    }

    async fn record_vote(
        &self,
        room_id: RoomId,
        round: u32,
        voter: PlayerId,
        target: PlayerId,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let room = tables.room(room_id)?;

        match room.status {
            RoomStatus::InProgress(current)
                if current.number == round && !current.is_resolved() => {}
            _ => {
                return Err(StoreError::Conflict(
                    "Round is no longer open for votes".to_string(),
                ))
            }
        }
        if tables.room_player(room_id, voter)?.has_voted() {
            return Err(StoreError::Conflict(
                "You have already voted in this round".to_string(),
            ));
        }
        tables.room_player(room_id, target)?;

        if let Some(player) = tables.players.get_mut(&voter) {
            player.voted_player_id = Some(target);
        }
        if let Some(player) = tables.players.get_mut(&target) {
            player.votes += 1;
        }
        Ok(())
    }

    async fn record_elimination(
        &self,
        room_id: RoomId,
        round: u32,
        eliminated: Option<PlayerId>,
    ) -> StoreResult<Option<PlayerId>> {
        let mut tables = self.tables.write().await;
        let room = tables.room(room_id)?;

        let current = room
            .status
            .round()
            .copied()
            .filter(|r| r.number == round)
            .ok_or_else(|| StoreError::Conflict(format!("Round {} is not current", round)))?;
        if current.is_resolved() {
            return Ok(current.eliminated());
        }

        let status = room
            .status
            .transition(Transition::Resolve { eliminated })?;
        if let Some(player_id) = eliminated {
            tables.room_player(room_id, player_id)?;
            if let Some(player) = tables.players.get_mut(&player_id) {
                player.is_lost = true;
            }
        }
        if let Some(room) = tables.rooms.get_mut(&room_id) {
            room.status = status;
        }
        Ok(eliminated)
    }

    async fn finish_room(&self, room_id: RoomId, expected_round: u32) -> StoreResult<Room> {
        let mut tables = self.tables.write().await;
        let room = tables
            .rooms
            .get_mut(&room_id)
            .ok_or(StoreError::NotFound("Room"))?;

        if room.status.round_number() != expected_round {
            return Err(StoreError::Conflict(
                "Round changed while the game was being completed".to_string(),
            ));
        }
        room.status = room.status.transition(Transition::Finish)?;
        Ok(room.clone())
    }

    async fn leave_room(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        now: DateTime<Utc>,
    ) -> StoreResult<LeaveOutcome> {
        let mut tables = self.tables.write().await;
        let room = tables.room(room_id)?;
        let host_id = room.host_id;
        let status = room.status;

        if !tables.room_player(room_id, player_id)?.is_active(now) {
            return Err(StoreError::NotFound("Player"));
        }

        if player_id != host_id {
            if let Some(player) = tables.players.get_mut(&player_id) {
                player.leave_time = now;
            }
            return Ok(LeaveOutcome::PlayerLeft);
        }

        for player in tables.players.values_mut() {
            if player.room_id == room_id && player.is_active(now) {
                player.leave_time = now;
            }
        }
        if status.state() != RoomState::Completed {
            let closed = status.transition(Transition::Finish)?;
            if let Some(room) = tables.rooms.get_mut(&room_id) {
                room.status = closed;
            }
        }
        Ok(LeaveOutcome::RoomClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn seeds() -> Vec<QuestionSeed> {
        ["one", "two", "three"]
            .into_iter()
            .map(|c| QuestionSeed {
                theme: "general".to_string(),
                content: c.to_string(),
            })
            .collect()
    }

    fn new_room(code: &str, now: DateTime<Utc>) -> NewRoom {
        NewRoom {
            code: RoomCode::parse(code).unwrap(),
            settings: RoomSettings {
                max_players: 2,
                questions_per_round: 1,
                time_per_round: 45,
                time_per_vote: 30,
                theme: "general".to_string(),
                ai_role: None,
            },
            created_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    fn start_plan(room: &Room, now: DateTime<Utc>, target: PlayerId) -> RoundPlan {
        RoundPlan {
            room_id: room.id,
            transition: Transition::Start { at: now },
            expected_round: 0,
            fake_names: vec![(room.host_id, "Quiet Fox".to_string())],
            question_ids: vec![1],
            ai_answers: vec![PlayerAnswer {
                player_id: room.ai_id,
                question_id: 1,
                content: "popcorn i guess".to_string(),
                created_at: now + Duration::seconds(20),
            }],
            ai_vote: Some(target),
        }
    }

    #[tokio::test]
    async fn test_create_room_seats_host_and_ai() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (room, host) = store.create_room(new_room("ABCD", now)).await.unwrap();

        assert_eq!(room.host_id, host.id);
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(host.real_name, "Player 1");

        let players = store.players(room.id).await.unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players.iter().filter(|p| p.is_ai).count(), 1);
        assert_eq!(players.iter().find(|p| p.is_ai).unwrap().id, room.ai_id);
    }

    #[tokio::test]
    async fn test_code_collision_only_against_live_rooms() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_room(new_room("ABCD", now)).await.unwrap();

        let clash = store.create_room(new_room("ABCD", now)).await;
        assert!(matches!(clash, Err(StoreError::CodeTaken(_))));

        // Once the first room expired the code is free again
        let later = now + Duration::hours(2);
        assert!(store.create_room(new_room("ABCD", later)).await.is_ok());

        let found = store
            .room_by_code(&RoomCode::parse("ABCD").unwrap(), later)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.created_at, later);
    }

    #[tokio::test]
    async fn test_join_respects_capacity() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (room, _) = store.create_room(new_room("ABCD", now)).await.unwrap();

        let second = store.join_room(room.id, now).await.unwrap();
        assert_eq!(second.real_name, "Player 2");

        let full = store.join_room(room.id, now).await;
        assert!(matches!(full, Err(StoreError::Conflict(msg)) if msg == "Room is full"));
    }

    #[tokio::test]
    async fn test_commit_round_applies_plan() {
        let store = MemoryStore::with_questions(seeds());
        let now = Utc::now();
        let (room, _) = store.create_room(new_room("ABCD", now)).await.unwrap();
        let guest = store.join_room(room.id, now).await.unwrap();

        let committed = store
            .commit_round(start_plan(&room, now, guest.id))
            .await
            .unwrap();
        assert_eq!(committed.status.round_number(), 1);

        let players = store.players(room.id).await.unwrap();
        let ai = players.iter().find(|p| p.is_ai).unwrap();
        let voted = players.iter().find(|p| p.id == guest.id).unwrap();
        assert_eq!(ai.voted_player_id, Some(guest.id));
        assert_eq!(voted.votes, 1);

        assert_eq!(store.question(1).await.unwrap().views, 1);
        assert_eq!(store.round_questions(room.id, 1).await.unwrap().len(), 1);
        assert_eq!(store.answers(room.id, &[1]).await.unwrap().len(), 1);

        // Replaying the same plan must not apply twice
        let replay = store.commit_round(start_plan(&room, now, guest.id)).await;
        assert!(matches!(replay, Err(StoreError::Conflict(_))));
        assert_eq!(store.question(1).await.unwrap().views, 1);
    }

    #[tokio::test]
    async fn test_commit_round_is_all_or_nothing() {
        let store = MemoryStore::with_questions(seeds());
        let now = Utc::now();
        let (room, _) = store.create_room(new_room("ABCD", now)).await.unwrap();

        let mut plan = start_plan(&room, now, 999);
        plan.question_ids = vec![1, 2];
        let result = store.commit_round(plan).await;
        assert!(matches!(result, Err(StoreError::NotFound("Player"))));

        let room = store
            .room_by_code(&room.code, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(room.status, RoomStatus::Waiting);
        assert!(store.used_question_ids(room.id).await.unwrap().is_empty());
        assert_eq!(store.question(1).await.unwrap().views, 0);
    }

    #[tokio::test]
    async fn test_vote_after_elimination_is_rejected() {
        let store = MemoryStore::with_questions(seeds());
        let now = Utc::now();
        let (room, host) = store.create_room(new_room("ABCD", now)).await.unwrap();
        let guest = store.join_room(room.id, now).await.unwrap();
        store
            .commit_round(start_plan(&room, now, guest.id))
            .await
            .unwrap();

        store
            .record_elimination(room.id, 1, Some(guest.id))
            .await
            .unwrap();
        let late = store.record_vote(room.id, 1, host.id, room.ai_id).await;
        assert!(matches!(late, Err(StoreError::Conflict(_))));

        let players = store.players(room.id).await.unwrap();
        let ai = players.iter().find(|p| p.id == room.ai_id).unwrap();
        let host = players.iter().find(|p| p.id == host.id).unwrap();
        assert_eq!(ai.votes, 0);
        assert_eq!(host.voted_player_id, None);
    }

    #[tokio::test]
    async fn test_double_vote_rejected() {
        let store = MemoryStore::with_questions(seeds());
        let now = Utc::now();
        let (room, host) = store.create_room(new_room("ABCD", now)).await.unwrap();
        let guest = store.join_room(room.id, now).await.unwrap();
        store
            .commit_round(start_plan(&room, now, guest.id))
            .await
            .unwrap();

        store
            .record_vote(room.id, 1, host.id, guest.id)
            .await
            .unwrap();
        let again = store.record_vote(room.id, 1, host.id, room.ai_id).await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));

        let players = store.players(room.id).await.unwrap();
        let guest = players.iter().find(|p| p.id == guest.id).unwrap();
        // AI vote plus the host's vote
        assert_eq!(guest.votes, 2);
    }

    #[tokio::test]
    async fn test_elimination_recorded_once() {
        let store = MemoryStore::with_questions(seeds());
        let now = Utc::now();
        let (room, host) = store.create_room(new_room("ABCD", now)).await.unwrap();
        let guest = store.join_room(room.id, now).await.unwrap();
        store
            .commit_round(start_plan(&room, now, guest.id))
            .await
            .unwrap();

        let first = store
            .record_elimination(room.id, 1, Some(guest.id))
            .await
            .unwrap();
        let second = store
            .record_elimination(room.id, 1, Some(host.id))
            .await
            .unwrap();
        assert_eq!(first, Some(guest.id));
        assert_eq!(second, Some(guest.id));

        let players = store.players(room.id).await.unwrap();
        assert!(players.iter().find(|p| p.id == guest.id).unwrap().is_lost);
        assert!(!players.iter().find(|p| p.id == host.id).unwrap().is_lost);
    }

    #[tokio::test]
    async fn test_host_leaving_closes_room() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (room, host) = store.create_room(new_room("ABCD", now)).await.unwrap();
        let guest = store.join_room(room.id, now).await.unwrap();

        assert_eq!(
            store.leave_room(room.id, guest.id, now).await.unwrap(),
            LeaveOutcome::PlayerLeft
        );
        // A player who left cannot leave again
        assert!(matches!(
            store.leave_room(room.id, guest.id, now).await,
            Err(StoreError::NotFound("Player"))
        ));

        assert_eq!(
            store.leave_room(room.id, host.id, now).await.unwrap(),
            LeaveOutcome::RoomClosed
        );
        let room = store
            .room_by_code(&room.code, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(room.status, RoomStatus::Completed(None));
        let players = store.players(room.id).await.unwrap();
        assert!(players.iter().all(|p| !p.is_active(now)));
    }
}
