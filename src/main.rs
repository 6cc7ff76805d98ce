use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turing_game::{
    api, config::ServerConfig, llm, questions, state::AppState, store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turing_game=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Turing Game server...");

    let config = ServerConfig::from_env()?;

    let bank = questions::load_question_bank(config.questions_path.as_deref())?;
    tracing::info!("Loaded {} questions", bank.len());
    let store = Arc::new(MemoryStore::with_questions(bank));

    let mut state = AppState::new(store, config.clone());

    let llm_config = llm::LlmConfig::from_env();
    match llm_config.build_provider() {
        Ok(provider) => {
            tracing::info!("AI player answers via {}", provider.name());
            state = state.with_llm(provider, llm_config);
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize LLM provider: {}. Games cannot be started.",
                e
            );
        }
    }

    let app = api::router(Arc::new(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
