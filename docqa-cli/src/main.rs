use std::sync::Arc;

use clap::Parser;
use docqa_cli::{Cli, Command, RagArgs, run_compare, run_index, run_query};
use docqa_rag::openai::api_key_from_env;
use docqa_rag::{
    AnswerPipeline, Indexer, OpenAICompletionProvider, OpenAIEmbeddingProvider, RagConfig,
};

fn embedder(args: &RagArgs, config: &RagConfig) -> anyhow::Result<OpenAIEmbeddingProvider> {
    Ok(OpenAIEmbeddingProvider::new(api_key_from_env()?)?
        .with_model(&config.embedding_model_id)
        .with_base_url(&args.openai_base_url))
}

fn pipeline(args: &RagArgs, config: &RagConfig) -> anyhow::Result<AnswerPipeline> {
    let completion = OpenAICompletionProvider::new(api_key_from_env()?)?
        .with_model(&config.completion_model_id)
        .with_base_url(&args.openai_base_url);
    Ok(AnswerPipeline::builder()
        .config(config.clone())
        .embedding_provider(Arc::new(embedder(args, config)?))
        .completion_provider(Arc::new(completion))
        .build()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    docqa_telemetry::init_telemetry("docqa");
    let cli = Cli::parse();
    let config = cli.rag.to_config()?;
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Command::Query { query_text } => {
            run_query(&cli.index_dir, query_text, || pipeline(&cli.rag, &config), &mut stdout).await
        }
        Command::Index { data_dir } => {
            let indexer = Indexer::new(config.clone(), Arc::new(embedder(&cli.rag, &config)?))?;
            run_index(&indexer, data_dir, &cli.index_dir, &mut stdout).await
        }
        Command::Compare { first, second } => {
            let embedder = embedder(&cli.rag, &config)?;
            run_compare(&embedder, &config.retry, first, second, &mut stdout).await
        }
    }
}
