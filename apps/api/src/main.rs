mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod routes;
mod speech;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreKind};
use crate::db::create_pool;
use crate::interview::backend::LlmGenerationBackend;
use crate::interview::InterviewEngine;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::speech::{AudioStore, OpenAiSpeechClient};
use crate::state::AppState;
use crate::store::{InterviewStore, MemoryInterviewStore, PgInterviewStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the durable store
    let store: Arc<dyn InterviewStore> = match config.store {
        StoreKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required when STORE=postgres")?;
            Arc::new(PgInterviewStore::new(create_pool(url).await?))
        }
        StoreKind::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryInterviewStore::new())
        }
    };

    // Initialize S3 / MinIO for question and answer audio
    let s3 = build_s3_client(&config).await;
    let audio = AudioStore::new(s3, config.s3_bucket.clone());
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize LLM client and generation backend
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let backend = Arc::new(LlmGenerationBackend::new(llm));

    // Initialize speech services
    let speech = Arc::new(OpenAiSpeechClient::new(config.openai_api_key.clone(), audio)?);
    info!("Speech client initialized");

    let engine = InterviewEngine::new(
        store,
        backend,
        speech.clone(),
        speech,
        config.engine.clone(),
    );
    info!(
        "Interview engine ready: {} questions per round, pass threshold {}, failed rounds: {:?}",
        config.engine.max_questions_per_round,
        config.engine.default_pass_threshold,
        config.engine.failed_round_policy
    );

    let state = AppState {
        engine: Arc::new(engine),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "interview-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
