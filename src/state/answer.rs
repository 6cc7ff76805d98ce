use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use rand::Rng;

use super::{active_player, current_round, AppState};
use crate::clock::{round_phase, Phase};
use crate::code::RoomCode;
use crate::config::DEFAULT_AI_ROLE;
use crate::error::{GameError, GameResult};
use crate::llm::{GenerateRequest, LlmError, LlmProvider};
use crate::store::AnswerWrite;
use crate::types::*;

const MAX_ROLE_CHARS: usize = 100;
/// Simulated typing speed of the AI player
const CHARS_PER_TYPING_SECOND: i64 = 10;

/// Make a room's persona safe to splice into the AI instructions
pub fn sanitize_role(role: &str) -> String {
    let stripped: String = role
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\\' | '"' | '`' | '\'' | '\n' | '\r' | '\t' | '<' | '>' | '{' | '}'
            )
        })
        .collect();
    let capped: String = stripped.trim().chars().take(MAX_ROLE_CHARS).collect();
    let capped = capped.trim_end();

    if capped.is_empty() {
        DEFAULT_AI_ROLE.to_string()
    } else {
        capped.to_string()
    }
}

/// System instructions that keep the AI player in character
pub fn ai_instructions(role: &str) -> String {
    format!(
        "You are a contestant in a party game and must pass as one of the human players. \
         Answer as a {role} would, with that person's knowledge and vocabulary.\n\
         Rules:\n\
         1. Never say or hint that you are an AI.\n\
         2. Keep the same personality and knowledge level in every answer.\n\
         3. Now and then be unsure of yourself or get a small detail wrong.\n\
         4. Write casually. Fragments, slang and the odd typo are fine.\n\
         5. Do not sound polished or overly exact.\n\
         6. Stay under {max} characters; around 100 is typical.\n\
         7. Reply with the answer only, the way a real player would type it.",
        role = sanitize_role(role),
        max = MAX_ANSWER_CHARS,
    )
}

/// Cut `text` to at most `max_chars` characters without splitting a word.
/// Empty when the first word alone is longer than the limit.
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let Some((cut, next)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let head = &text[..cut];
    if next.is_whitespace() {
        return head.trim_end().to_string();
    }
    match head.rfind(char::is_whitespace) {
        Some(boundary) => head[..boundary].trim_end().to_string(),
        None => String::new(),
    }
}

/// How long after the round start the AI's answer shows up: at least the time it would
/// take to type, never past the answering window.
pub fn ai_answer_delay<R: Rng + ?Sized>(
    answer: &str,
    time_per_round: u32,
    rng: &mut R,
) -> Duration {
    let window_ms = i64::from(time_per_round) * 1000;
    let typing_ms = answer.chars().count() as i64 * 1000 / CHARS_PER_TYPING_SECOND;
    let earliest = typing_ms.min(window_ms);

    Duration::milliseconds(rng.random_range(earliest..=window_ms))
}

impl AppState {
    /// Ask the provider for one in-character answer per question, all at once.
    /// Any failure or empty answer fails the whole batch.
    pub(crate) async fn synthesize_answers(
        &self,
        room: &Room,
        questions: &[Question],
    ) -> GameResult<Vec<String>> {
        let provider: &dyn LlmProvider = self.llm.as_deref().ok_or_else(|| {
            LlmError::ConfigError("No LLM provider configured".to_string())
        })?;

        let role = room
            .settings
            .ai_role
            .as_deref()
            .unwrap_or(&self.config.default_ai_role);
        let instructions = ai_instructions(role);

        let requests = questions.iter().map(|question| {
            let request = GenerateRequest {
                instructions: instructions.clone(),
                prompt: question.content.clone(),
                max_tokens: Some(self.llm_config.default_max_tokens),
                timeout: self.llm_config.default_timeout,
            };
            async move {
                let response = provider.generate(request).await?;
                let text = truncate_at_word_boundary(&response.text, MAX_ANSWER_CHARS);
                if text.is_empty() {
                    return Err(LlmError::ParseError("Empty completion".to_string()));
                }
                tracing::debug!(
                    "AI answer from {} in {}ms",
                    response.metadata.provider,
                    response.metadata.latency_ms
                );
                Ok(text)
            }
        });

        try_join_all(requests).await.map_err(|e| {
            tracing::error!(
                "Provider {} failed for room {}: {}",
                provider.name(),
                room.code,
                e
            );
            GameError::Completion(e)
        })
    }

    /// Save a human answer for a question of the current round
    pub async fn submit_answer(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        question_id: QuestionId,
        content: &str,
    ) -> GameResult<AnswerWrite> {
        let content = content.trim();
        if content.is_empty() {
            return Err(GameError::Validation("Answer cannot be empty".to_string()));
        }
        if content.chars().count() > MAX_ANSWER_CHARS {
            return Err(GameError::Validation(format!(
                "Answer must be at most {} characters",
                MAX_ANSWER_CHARS
            )));
        }

        let room = self.live_room(code).await?;
        let round = current_round(&room)?;
        let now = self.now();

        let players = self.store.players(room.id).await?;
        let player = active_player(&players, player_id, now)?;
        if player.is_ai {
            return Err(GameError::Forbidden(
                "The AI player cannot submit answers".to_string(),
            ));
        }
        if player.is_lost {
            return Err(GameError::Forbidden(
                "Eliminated players cannot answer".to_string(),
            ));
        }

        let in_round = self
            .store
            .round_questions(room.id, round.number)
            .await?
            .iter()
            .any(|q| q.id == question_id);
        if !in_round {
            return Err(GameError::NotFound(
                "Question is not part of the current round".to_string(),
            ));
        }
        if round_phase(&round, &room.settings, now) != Phase::Answering {
            return Err(GameError::Conflict(
                "The answering window for this round has closed".to_string(),
            ));
        }

        let write = self
            .store
            .upsert_answer(PlayerAnswer {
                player_id,
                question_id,
                content: content.to_string(),
                created_at: now,
            })
            .await?;
        tracing::debug!(
            "Answer {:?} for question {} by player {}",
            write,
            question_id,
            player_id
        );
        Ok(write)
    }
}

/// AI answers stamped relative to the round start
pub(crate) fn schedule_ai_answers(
    ai_id: PlayerId,
    questions: &[Question],
    texts: Vec<String>,
    started_at: DateTime<Utc>,
    time_per_round: u32,
) -> Vec<PlayerAnswer> {
    let mut rng = rand::rng();
    questions
        .iter()
        .zip(texts)
        .map(|(question, content)| PlayerAnswer {
            player_id: ai_id,
            question_id: question.id,
            created_at: started_at + ai_answer_delay(&content, time_per_round, &mut rng),
            content,
        })
        .collect()
}
