use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

use super::AppState;
use crate::code::RoomCode;
use crate::error::{GameError, GameResult};
use crate::protocol::{AnswerData, QuestionsResponse, RoundQuestionData};
use crate::types::*;

/// Pick `count` distinct questions from `pool` that the room has not seen yet.
/// Returns `None` when fewer than `count` remain.
pub fn select_questions<R: Rng + ?Sized>(
    pool: &[Question],
    used: &HashSet<QuestionId>,
    count: usize,
    rng: &mut R,
) -> Option<Vec<Question>> {
    let fresh: Vec<&Question> = pool.iter().filter(|q| !used.contains(&q.id)).collect();
    if fresh.len() < count {
        return None;
    }
    Some(fresh.choose_multiple(rng, count).map(|q| (*q).clone()).collect())
}

impl AppState {
    /// Fresh questions for the room's next round, chosen before anything is committed
    pub(crate) async fn draw_round_questions(&self, room: &Room) -> GameResult<Vec<Question>> {
        let pool = self
            .store
            .questions_for_theme(&room.settings.theme)
            .await?;
        let used = self.store.used_question_ids(room.id).await?;
        let count = room.settings.questions_per_round as usize;

        select_questions(&pool, &used, count, &mut rand::rng()).ok_or_else(|| {
            GameError::Conflict(format!(
                "Not enough unused questions left for theme '{}'",
                room.settings.theme
            ))
        })
    }

    /// Questions of a round with the answers that are visible right now.
    /// Without an explicit round the current one is used.
    pub async fn round_questions(
        &self,
        code: &RoomCode,
        round: Option<u32>,
    ) -> GameResult<QuestionsResponse> {
        if round == Some(0) {
            return Err(GameError::Validation(
                "round must be a positive integer".to_string(),
            ));
        }

        let room = self.live_room(code).await?;
        let round = round.unwrap_or_else(|| room.status.round_number());
        let now = self.now();

        let questions = self.store.round_questions(room.id, round).await?;
        let question_ids: Vec<QuestionId> = questions.iter().map(|q| q.id).collect();
        let answers = self.store.answers(room.id, &question_ids).await?;
        let names: HashMap<PlayerId, Option<String>> = self
            .store
            .players(room.id)
            .await?
            .into_iter()
            .map(|p| (p.id, p.fake_name))
            .collect();

        let mut by_question: HashMap<QuestionId, Vec<AnswerData>> = HashMap::new();
        for answer in answers.into_iter().filter(|a| a.is_visible(now)) {
            by_question
                .entry(answer.question_id)
                .or_default()
                .push(AnswerData {
                    player_id: answer.player_id,
                    player_name: names.get(&answer.player_id).cloned().flatten(),
                    content: answer.content,
                    timestamp: answer.created_at,
                });
        }

        let questions = questions
            .into_iter()
            .map(|q| RoundQuestionData {
                player_answers: by_question.remove(&q.id).unwrap_or_default(),
                id: q.id,
                content: q.content,
            })
            .collect();

        Ok(QuestionsResponse { round, questions })
    }
}
