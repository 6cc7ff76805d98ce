use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::code::RoomCode;

/// Numeric row ids, always positive
pub type RoomId = i64;
pub type PlayerId = i64;
pub type QuestionId = i64;

/// Longest answer a player may submit, in characters
pub const MAX_ANSWER_CHARS: usize = 200;

pub const MIN_PLAYERS: u32 = 2;
pub const MAX_PLAYERS: u32 = 8;
pub const MAX_QUESTIONS_PER_ROUND: u32 = 3;
pub const MIN_PHASE_SECONDS: u32 = 10;
pub const MAX_PHASE_SECONDS: u32 = 1200;
const MAX_THEME_CHARS: usize = 32;
const MAX_ROLE_CHARS: usize = 200;

/// Wire name of a room's lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Waiting,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub max_players: u32,
    pub questions_per_round: u32,
    /// Answering window in seconds
    pub time_per_round: u32,
    /// Voting window in seconds
    pub time_per_vote: u32,
    pub theme: String,
    /// Persona the AI player imitates; the server default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_role: Option<String>,
}

impl RoomSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(format!(
                "maxPlayers must be between {} and {}",
                MIN_PLAYERS, MAX_PLAYERS
            ));
        }
        if !(1..=MAX_QUESTIONS_PER_ROUND).contains(&self.questions_per_round) {
            return Err(format!(
                "questionsPerRound must be between 1 and {}",
                MAX_QUESTIONS_PER_ROUND
            ));
        }
        for (field, value) in [
            ("timePerRound", self.time_per_round),
            ("timePerVote", self.time_per_vote),
        ] {
            if !(MIN_PHASE_SECONDS..=MAX_PHASE_SECONDS).contains(&value) {
                return Err(format!(
                    "{} must be between {} and {} seconds",
                    field, MIN_PHASE_SECONDS, MAX_PHASE_SECONDS
                ));
            }
        }
        let theme_ok = !self.theme.is_empty()
            && self.theme.len() <= MAX_THEME_CHARS
            && self
                .theme
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !theme_ok {
            return Err("theme must be a short lowercase identifier".to_string());
        }
        if let Some(role) = &self.ai_role {
            if role.chars().count() > MAX_ROLE_CHARS {
                return Err(format!("aiRole must be at most {} characters", MAX_ROLE_CHARS));
            }
        }
        Ok(())
    }

    pub fn answering_window(&self) -> Duration {
        Duration::seconds(i64::from(self.time_per_round))
    }

    pub fn voting_window(&self) -> Duration {
        Duration::seconds(i64::from(self.time_per_vote))
    }
}

/// Result of the elimination vote for one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Pending,
    Resolved { eliminated: Option<PlayerId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    pub number: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: RoundOutcome,
}

impl Round {
    fn begin(number: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            number,
            started_at,
            outcome: RoundOutcome::Pending,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, RoundOutcome::Resolved { .. })
    }

    pub fn eliminated(&self) -> Option<PlayerId> {
        match self.outcome {
            RoundOutcome::Resolved { eliminated } => eliminated,
            RoundOutcome::Pending => None,
        }
    }
}

/// Authoritative lifecycle of a room. Only [`RoomStatus::transition`] produces new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Waiting,
    InProgress(Round),
    /// Terminal; keeps the last round played, if any
    Completed(Option<Round>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start { at: DateTime<Utc> },
    Resolve { eliminated: Option<PlayerId> },
    Advance { at: DateTime<Utc> },
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Game has already started")]
    AlreadyStarted,
    #[error("Game has not started yet")]
    NotStarted,
    #[error("Game is already completed")]
    Completed,
    #[error("Round {0} has already been resolved")]
    AlreadyResolved(u32),
    #[error("Round {0} has not been resolved yet")]
    Unresolved(u32),
}

impl RoomStatus {
    pub fn transition(&self, transition: Transition) -> Result<RoomStatus, TransitionError> {
        use RoomStatus::*;

        match (self, transition) {
            (Completed(_), _) => Err(TransitionError::Completed),

            (Waiting, Transition::Start { at }) => Ok(InProgress(Round::begin(1, at))),
            (Waiting, Transition::Finish) => Ok(Completed(None)),
            (Waiting, _) => Err(TransitionError::NotStarted),

            (InProgress(_), Transition::Start { .. }) => Err(TransitionError::AlreadyStarted),
            (InProgress(round), Transition::Resolve { eliminated }) => {
                if round.is_resolved() {
                    return Err(TransitionError::AlreadyResolved(round.number));
                }
                Ok(InProgress(Round {
                    outcome: RoundOutcome::Resolved { eliminated },
                    ..*round
                }))
            }
            (InProgress(round), Transition::Advance { at }) => {
                if !round.is_resolved() {
                    return Err(TransitionError::Unresolved(round.number));
                }
                Ok(InProgress(Round::begin(round.number + 1, at)))
            }
            (InProgress(round), Transition::Finish) => Ok(Completed(Some(*round))),
        }
    }

    pub fn state(&self) -> RoomState {
        match self {
            RoomStatus::Waiting => RoomState::Waiting,
            RoomStatus::InProgress(_) => RoomState::InProgress,
            RoomStatus::Completed(_) => RoomState::Completed,
        }
    }

    /// Current round, or the last one played once the room is completed
    pub fn round(&self) -> Option<&Round> {
        match self {
            RoomStatus::Waiting => None,
            RoomStatus::InProgress(round) => Some(round),
            RoomStatus::Completed(round) => round.as_ref(),
        }
    }

    pub fn round_number(&self) -> u32 {
        self.round().map_or(0, |r| r.number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub ai_id: PlayerId,
    pub settings: RoomSettings,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Room {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub room_id: RoomId,
    pub real_name: String,
    pub fake_name: Option<String>,
    pub is_ai: bool,
    pub is_lost: bool,
    /// Votes received in the current round
    pub votes: u32,
    /// Whom this player voted for in the current round
    pub voted_player_id: Option<PlayerId>,
    pub join_time: DateTime<Utc>,
    /// A leave time in the future means the player is still in the room
    pub leave_time: DateTime<Utc>,
}

impl Player {
    /// Sequential lobby name for the n-th human in a room (1-based)
    pub fn display_name(n: usize) -> String {
        format!("Player {}", n)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.leave_time > now
    }

    pub fn is_active_human(&self, now: DateTime<Utc>) -> bool {
        !self.is_ai && self.is_active(now)
    }

    /// Still present and not eliminated
    pub fn in_play(&self, now: DateTime<Utc>) -> bool {
        self.is_active(now) && !self.is_lost
    }

    pub fn has_voted(&self) -> bool {
        self.voted_player_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub theme: String,
    pub content: String,
    /// Number of rounds, across all rooms, this question was picked for
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomQuestion {
    pub room_id: RoomId,
    pub round: u32,
    pub question_id: QuestionId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerAnswer {
    pub player_id: PlayerId,
    pub question_id: QuestionId,
    pub content: String,
    /// For the AI this lies in the future until its simulated typing is done
    pub created_at: DateTime<Utc>,
}

impl PlayerAnswer {
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.created_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RoomSettings {
        RoomSettings {
            max_players: 4,
            questions_per_round: 1,
            time_per_round: 45,
            time_per_vote: 30,
            theme: "general".to_string(),
            ai_role: None,
        }
    }

    #[test]
    fn test_settings_validation() {
        assert!(settings().validate().is_ok());

        let too_many = RoomSettings {
            max_players: 9,
            ..settings()
        };
        assert!(too_many.validate().unwrap_err().contains("maxPlayers"));

        let no_questions = RoomSettings {
            questions_per_round: 0,
            ..settings()
        };
        assert!(no_questions.validate().is_err());

        let short_vote = RoomSettings {
            time_per_vote: 5,
            ..settings()
        };
        assert!(short_vote.validate().unwrap_err().contains("timePerVote"));

        let bad_theme = RoomSettings {
            theme: "General Knowledge".to_string(),
            ..settings()
        };
        assert!(bad_theme.validate().unwrap_err().contains("theme"));
    }

    #[test]
    fn test_full_lifecycle_transitions() {
        let t0 = Utc::now();
        let status = RoomStatus::Waiting;

        let status = status.transition(Transition::Start { at: t0 }).unwrap();
        assert_eq!(status.state(), RoomState::InProgress);
        assert_eq!(status.round_number(), 1);

        let status = status
            .transition(Transition::Resolve {
                eliminated: Some(7),
            })
            .unwrap();
        assert_eq!(status.round().unwrap().eliminated(), Some(7));

        let t1 = t0 + Duration::seconds(90);
        let status = status.transition(Transition::Advance { at: t1 }).unwrap();
        let round = status.round().unwrap();
        assert_eq!(round.number, 2);
        assert_eq!(round.started_at, t1);
        assert_eq!(round.outcome, RoundOutcome::Pending);

        let status = status.transition(Transition::Finish).unwrap();
        assert_eq!(status.state(), RoomState::Completed);
        assert_eq!(status.round_number(), 2);
    }

    #[test]
    fn test_invalid_transitions() {
        let t0 = Utc::now();
        let waiting = RoomStatus::Waiting;
        assert_eq!(
            waiting.transition(Transition::Advance { at: t0 }),
            Err(TransitionError::NotStarted)
        );

        let started = waiting.transition(Transition::Start { at: t0 }).unwrap();
        assert_eq!(
            started.transition(Transition::Start { at: t0 }),
            Err(TransitionError::AlreadyStarted)
        );
        // Cannot skip a round without resolving its elimination
        assert_eq!(
            started.transition(Transition::Advance { at: t0 }),
            Err(TransitionError::Unresolved(1))
        );

        let resolved = started
            .transition(Transition::Resolve { eliminated: None })
            .unwrap();
        assert_eq!(
            resolved.transition(Transition::Resolve {
                eliminated: Some(3)
            }),
            Err(TransitionError::AlreadyResolved(1))
        );

        let done = resolved.transition(Transition::Finish).unwrap();
        assert_eq!(
            done.transition(Transition::Finish),
            Err(TransitionError::Completed)
        );
    }

    #[test]
    fn test_waiting_room_can_be_closed() {
        let status = RoomStatus::Waiting.transition(Transition::Finish).unwrap();
        assert_eq!(status, RoomStatus::Completed(None));
        assert_eq!(status.round_number(), 0);
    }

    #[test]
    fn test_answer_visibility() {
        let now = Utc::now();
        let answer = PlayerAnswer {
            player_id: 1,
            question_id: 1,
            content: "hm".to_string(),
            created_at: now + Duration::seconds(5),
        };
        assert!(!answer.is_visible(now));
        assert!(answer.is_visible(now + Duration::seconds(5)));
    }
}
