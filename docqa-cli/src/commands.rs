//! Command implementations. Each writes its user-facing output to `out`.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use docqa_rag::{
    AnswerPipeline, EmbeddingProvider, Indexer, RagError, RetryPolicy, VectorIndex,
    cosine_similarity, load_documents,
};
use tracing::info;

/// Printed when there is no index or nothing relevant was retrieved.
pub const NO_MATCHES_MESSAGE: &str = "Unable to find matching results.";

const RULE: &str = "--------------------------------------------------";

/// Answer `query` from the index in `index_dir`.
///
/// The query is validated and the index opened before `make_pipeline` is
/// called, so an empty library never needs provider credentials.
pub async fn run_query<F>(
    index_dir: &Path,
    query: &str,
    make_pipeline: F,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<AnswerPipeline>,
{
    AnswerPipeline::validate_query(query)?;

    let index = match VectorIndex::load(index_dir).await {
        Ok(index) => index,
        Err(RagError::IndexNotReady(reason)) => {
            info!(%reason, "no index to query");
            writeln!(out, "{NO_MATCHES_MESSAGE}")?;
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to open index"),
    };

    let pipeline = make_pipeline()?;
    let answer = pipeline.answer(&index, query).await?;
    if !answer.is_answered() {
        writeln!(out, "{NO_MATCHES_MESSAGE}")?;
        return Ok(());
    }

    writeln!(out, "Response:")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "{}", answer.text)?;
    writeln!(out)?;
    writeln!(out, "Sources:")?;
    writeln!(out, "{RULE}")?;
    for citation in &answer.sources {
        writeln!(out, "- {} (score {:.3})", citation.source, citation.score)?;
    }
    Ok(())
}

/// Rebuild the index in `index_dir` from the Markdown files under `data_dir`.
pub async fn run_index(
    indexer: &Indexer,
    data_dir: &Path,
    index_dir: &Path,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let documents = load_documents(data_dir)
        .with_context(|| format!("failed to load documents from {}", data_dir.display()))?;
    let stats = indexer.build_index(&documents, index_dir).await?;

    writeln!(out, "Split {} documents into {} chunks.", stats.documents, stats.chunks)?;
    writeln!(out, "Saved {} chunks to {}.", stats.chunks, stats.location.display())?;
    Ok(())
}

/// Print the head and length of `first`'s embedding and its similarity to `second`.
pub async fn run_compare(
    embedder: &dyn EmbeddingProvider,
    retry: &RetryPolicy,
    first: &str,
    second: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let a = retry.run("embedding", || embedder.embed(first)).await?;
    let b = retry.run("embedding", || embedder.embed(second)).await?;

    let head: Vec<f32> = a.iter().take(5).copied().collect();
    writeln!(out, "Vector for '{first}': {head:?}")?;
    writeln!(out, "Vector length: {}", a.len())?;
    writeln!(out, "Comparing ({first}, {second}): {}", cosine_similarity(&a, &b))?;
    Ok(())
}
