use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use docqa_rag::openai::{OPENAI_API_BASE, api_key_from_env};
use docqa_rag::{
    AnswerPipeline, Indexer, OpenAICompletionProvider, OpenAIEmbeddingProvider, RagConfig,
    RetryPolicy,
};
use docqa_server::server::DEFAULT_MAX_UPLOAD_BYTES;
use docqa_server::{AppState, ServerConfig, run_server};

#[derive(Parser, Debug)]
#[command(name = "docqa-server", about = "Upload a Markdown file and ask questions about it")]
struct ServerCli {
    /// Interface to bind.
    #[arg(long, env = "DOCQA_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "DOCQA_PORT", default_value_t = 8000)]
    port: u16,

    /// Largest accepted upload, in bytes.
    #[arg(long, env = "DOCQA_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Base URL for OpenAI-compatible endpoints.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_API_BASE)]
    openai_base_url: String,

    /// Embedding model identifier.
    #[arg(long, env = "DOCQA_EMBEDDING_MODEL", default_value = docqa_rag::config::DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Chat model used to write answers.
    #[arg(long, env = "DOCQA_COMPLETION_MODEL", default_value = docqa_rag::config::DEFAULT_COMPLETION_MODEL)]
    completion_model: String,

    /// Number of chunks retrieved per question.
    #[arg(long, env = "DOCQA_TOP_K", default_value_t = 3)]
    top_k: usize,

    /// Minimum best-match similarity before an answer is generated.
    #[arg(long, env = "DOCQA_RELEVANCE_THRESHOLD", default_value_t = 0.7)]
    relevance_threshold: f32,

    /// Seconds before a single OpenAI request times out.
    #[arg(long, env = "DOCQA_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Retries for transient OpenAI failures.
    #[arg(long, env = "DOCQA_MAX_RETRIES", default_value_t = 1)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    docqa_telemetry::init_telemetry("docqa-server");
    let cli = ServerCli::parse();

    let config = RagConfig::builder()
        .top_k(cli.top_k)
        .relevance_threshold(cli.relevance_threshold)
        .embedding_model_id(&cli.embedding_model)
        .completion_model_id(&cli.completion_model)
        .retry(RetryPolicy {
            timeout: Duration::from_secs(cli.timeout_secs),
            max_retries: cli.max_retries,
            ..RetryPolicy::default()
        })
        .build()
        .context("invalid configuration")?;

    let api_key = api_key_from_env()?;
    let embedder = Arc::new(
        OpenAIEmbeddingProvider::new(api_key.clone())?
            .with_model(&config.embedding_model_id)
            .with_base_url(&cli.openai_base_url),
    );
    let completion = Arc::new(
        OpenAICompletionProvider::new(api_key)?
            .with_model(&config.completion_model_id)
            .with_base_url(&cli.openai_base_url),
    );

    let indexer = Arc::new(Indexer::new(config.clone(), embedder.clone())?);
    let pipeline = Arc::new(
        AnswerPipeline::builder()
            .config(config)
            .embedding_provider(embedder)
            .completion_provider(completion)
            .build()?,
    );

    run_server(
        ServerConfig { host: cli.host, port: cli.port, max_upload_bytes: cli.max_upload_bytes },
        AppState::new(indexer, pipeline),
    )
    .await
}
