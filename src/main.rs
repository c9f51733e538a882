use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bluffdash::{
    api,
    config::ServerConfig,
    questions::{QuestionBank, QuestionSource},
    state::AppState,
    ws,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bluffdash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting bluffdash...");

    let config = ServerConfig::from_env();

    let bank = match QuestionBank::load(&config.questions_path) {
        Ok(bank) => {
            tracing::info!(
                "Loaded {} questions from {}",
                bank.len(),
                config.questions_path.display()
            );
            bank
        }
        Err(e) => {
            tracing::warn!(
                "Failed to load question bank from {}: {}. Using the bundled sample.",
                config.questions_path.display(),
                e
            );
            QuestionBank::sample()
        }
    };
    let questions: Arc<dyn QuestionSource> = Arc::new(bank);

    let state = Arc::new(AppState::new(questions, config.game.clone()));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(api::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
