use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use docqa_rag::config::{DEFAULT_COMPLETION_MODEL, DEFAULT_EMBEDDING_MODEL};
use docqa_rag::openai::OPENAI_API_BASE;
use docqa_rag::{RagConfig, RetryPolicy};

#[derive(Parser, Debug)]
#[command(name = "docqa", version, about = "Index a Markdown library and ask questions about it")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the persisted index.
    #[arg(long, global = true, env = "DOCQA_INDEX_DIR", default_value = "chroma")]
    pub index_dir: PathBuf,

    #[command(flatten)]
    pub rag: RagArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a question from the indexed documents.
    Query {
        /// The question to answer.
        query_text: String,
    },
    /// Rebuild the index from every Markdown file in the data directory.
    Index {
        /// Directory scanned recursively for `.md` files.
        #[arg(long, env = "DOCQA_DATA_DIR", default_value = "data/books")]
        data_dir: PathBuf,
    },
    /// Print an embedding and the similarity between two words or phrases.
    Compare {
        first: String,
        second: String,
    },
}

/// Retrieval and provider settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct RagArgs {
    /// Base URL for OpenAI-compatible endpoints.
    #[arg(long, global = true, env = "OPENAI_BASE_URL", default_value = OPENAI_API_BASE)]
    pub openai_base_url: String,

    /// Embedding model identifier.
    #[arg(long, global = true, env = "DOCQA_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Chat model used to write answers.
    #[arg(long, global = true, env = "DOCQA_COMPLETION_MODEL", default_value = DEFAULT_COMPLETION_MODEL)]
    pub completion_model: String,

    /// Maximum chunk size in characters.
    #[arg(long, global = true, env = "DOCQA_CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, global = true, env = "DOCQA_CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question.
    #[arg(long, global = true, env = "DOCQA_TOP_K", default_value_t = 3)]
    pub top_k: usize,

    /// Minimum best-match similarity before an answer is generated.
    #[arg(long, global = true, env = "DOCQA_RELEVANCE_THRESHOLD", default_value_t = 0.7)]
    pub relevance_threshold: f32,

    /// Seconds before a single OpenAI request times out.
    #[arg(long, global = true, env = "DOCQA_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Retries for transient OpenAI failures.
    #[arg(long, global = true, env = "DOCQA_MAX_RETRIES", default_value_t = 1)]
    pub max_retries: u32,
}

impl RagArgs {
    /// Validated pipeline configuration from these arguments.
    pub fn to_config(&self) -> docqa_rag::Result<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .relevance_threshold(self.relevance_threshold)
            .embedding_model_id(&self.embedding_model)
            .completion_model_id(&self.completion_model)
            .retry(RetryPolicy {
                timeout: Duration::from_secs(self.timeout_secs),
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            })
            .build()
    }
}
