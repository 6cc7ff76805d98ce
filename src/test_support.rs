//! Fixtures shared by unit and integration tests.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::ManualClock;
use crate::code::{CodeSource, RoomCode};
use crate::config::ServerConfig;
use crate::llm::{
    GenerateRequest, GenerateResponse, LlmConfig, LlmError, LlmProvider, LlmResult,
    ResponseMetadata,
};
use crate::questions::QuestionSeed;
use crate::state::AppState;
use crate::store::MemoryStore;
use crate::types::RoomSettings;

/// Answers every prompt with the same text
pub struct CannedProvider {
    reply: String,
    calls: AtomicUsize,
}

impl CannedProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for CannedProvider {
    async fn generate(&self, _request: GenerateRequest) -> LlmResult<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GenerateResponse {
            text: self.reply.clone(),
            metadata: ResponseMetadata {
                provider: "canned".to_string(),
                model: "canned".to_string(),
                tokens_used: None,
                latency_ms: 0,
            },
        })
    }

    fn name(&self) -> &str {
        "canned"
    }
}

/// Times out on every request
pub struct FailingProvider;

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        Err(LlmError::Timeout(request.timeout))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Always hands out the same code
pub struct FixedCodes(RoomCode);

impl FixedCodes {
    pub fn new(code: RoomCode) -> Self {
        Self(code)
    }
}

impl CodeSource for FixedCodes {
    fn next_code(&self) -> RoomCode {
        self.0.clone()
    }
}

pub fn sample_questions() -> Vec<QuestionSeed> {
    let general = [
        "What did you have for breakfast?",
        "What is the best way to spend a rainy afternoon?",
        "Which smell reminds you of childhood?",
        "What is a skill you wish you had?",
        "Where would you go on a free weekend trip?",
        "What is the most overrated food?",
        "What song is stuck in your head lately?",
        "What was your first job?",
    ];
    let quirky = [
        "If socks could talk, what would they complain about?",
        "Which kitchen utensil would win in a fight?",
    ];

    general
        .iter()
        .map(|c| ("general", c))
        .chain(quirky.iter().map(|c| ("quirky", c)))
        .map(|(theme, content)| QuestionSeed {
            theme: theme.to_string(),
            content: content.to_string(),
        })
        .collect()
}

/// 45 second answering window, 30 second vote, general theme, up to three players
pub fn settings(questions_per_round: u32) -> RoomSettings {
    RoomSettings {
        max_players: 3,
        questions_per_round,
        time_per_round: 45,
        time_per_vote: 30,
        theme: "general".to_string(),
        ai_role: None,
    }
}

/// App state over an in-memory store with a hand-driven clock
pub struct TestGame {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

impl TestGame {
    pub fn new() -> Self {
        Self::with_provider(Arc::new(CannedProvider::new(
            "probably toast with way too much butter",
        )))
    }

    pub fn with_provider(provider: Arc<dyn LlmProvider>) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemoryStore::with_questions(sample_questions()));
        let llm_config = LlmConfig {
            default_timeout: Duration::from_secs(1),
            ..LlmConfig::default()
        };

        let state = AppState::new(store.clone(), ServerConfig::default())
            .with_llm(provider, llm_config)
            .with_clock(clock.clone());

        Self {
            state: Arc::new(state),
            clock,
            store,
        }
    }
}

impl Default for TestGame {
    fn default() -> Self {
        Self::new()
    }
}
