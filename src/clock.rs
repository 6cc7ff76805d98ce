//! Round phases are derived from timestamps on every read; nothing is scheduled.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Mutex;

use crate::types::{Round, RoomSettings};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Answering,
    Voting,
    RoundComplete,
}

pub fn phase_at(
    started_at: DateTime<Utc>,
    answering: Duration,
    voting: Duration,
    now: DateTime<Utc>,
) -> Phase {
    let answers_close = started_at + answering;
    if now < answers_close {
        Phase::Answering
    } else if now < answers_close + voting {
        Phase::Voting
    } else {
        Phase::RoundComplete
    }
}

/// Phase of `round` under the room's configured windows
pub fn round_phase(round: &Round, settings: &RoomSettings, now: DateTime<Utc>) -> Phase {
    phase_at(
        round.started_at,
        settings.answering_window(),
        settings.voting_window(),
        now,
    )
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_boundaries() {
        let start = Utc::now();
        let answering = Duration::seconds(45);
        let voting = Duration::seconds(30);

        assert_eq!(phase_at(start, answering, voting, start), Phase::Answering);
        assert_eq!(
            phase_at(start, answering, voting, start + Duration::seconds(44)),
            Phase::Answering
        );
        assert_eq!(
            phase_at(start, answering, voting, start + Duration::seconds(45)),
            Phase::Voting
        );
        assert_eq!(
            phase_at(start, answering, voting, start + Duration::seconds(74)),
            Phase::Voting
        );
        assert_eq!(
            phase_at(start, answering, voting, start + Duration::seconds(75)),
            Phase::RoundComplete
        );
    }

    #[test]
    fn test_manual_clock() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(10));
        assert_eq!(clock.now(), start + Duration::seconds(10));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_phase_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&Phase::RoundComplete).unwrap(),
            "\"roundComplete\""
        );
    }
}
