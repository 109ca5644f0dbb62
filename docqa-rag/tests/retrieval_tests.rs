//! Integration tests for indexing and the retrieval-answer pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use docqa_rag::testing::{FailingEmbedder, HashEmbedder, KeywordEmbedder, RecordingCompletion};
use docqa_rag::{
    AnswerOutcome, AnswerPipeline, Document, Indexer, NO_RELEVANT_CONTEXT_ANSWER, RagConfig,
    RagError, VectorIndex, load_documents,
};
use proptest::prelude::*;

fn pipeline_with(
    config: RagConfig,
    embedder: Arc<dyn docqa_rag::EmbeddingProvider>,
    completion: Arc<RecordingCompletion>,
) -> AnswerPipeline {
    AnswerPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .completion_provider(completion)
        .build()
        .unwrap()
}

/// Distinct single-chunk documents.
fn arb_texts() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::hash_set("[a-z]{4,10}( [a-z]{2,10}){0,6}", 1..12)
        .prop_map(|set: HashSet<String>| set.into_iter().collect())
}

/// **Round trip**: querying the literal text of an indexed chunk returns that
/// chunk first with maximal score.
mod prop_round_trip {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn literal_chunk_text_is_top_hit(texts in arb_texts(), pick in any::<prop::sample::Index>()) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let embedder = Arc::new(HashEmbedder::default());
            let documents: Vec<Document> = texts
                .iter()
                .enumerate()
                .map(|(i, text)| Document::new(format!("doc{i}.md"), text.clone()))
                .collect();
            let target = pick.index(documents.len());

            let (index, hits) = rt.block_on(async {
                let indexer = Indexer::new(RagConfig::default(), embedder.clone()).unwrap();
                let index = indexer.embed_documents(&documents).await.unwrap();
                let pipeline = pipeline_with(
                    RagConfig::default(),
                    embedder.clone(),
                    Arc::new(RecordingCompletion::default()),
                );
                let hits = pipeline.retrieve(&index, &texts[target]).await.unwrap();
                (index, hits)
            });

            prop_assert_eq!(index.len(), documents.len());
            prop_assert_eq!(&hits[0].entry.text, &texts[target]);
            prop_assert!((hits[0].score - 1.0).abs() < 1e-5);
            prop_assert!(hits.iter().skip(1).all(|h| h.score < hits[0].score));
        }
    }
}

/// **Gate**: whenever the best score is below the threshold the answer is
/// canned, has no sources and the completion API is not called, for any k.
mod prop_gate {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn below_threshold_is_gated_for_any_k(top_k in 1usize..20, docs in 1usize..8) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let embedder = Arc::new(KeywordEmbedder::default());
            let completion = Arc::new(RecordingCompletion::default());
            let config = RagConfig::builder().top_k(top_k).build().unwrap();

            let answer = rt.block_on(async {
                let documents: Vec<Document> = (0..docs)
                    .map(|i| Document::new(format!("tea{i}.md"), format!("The Hatter poured tea, cup {i}.")))
                    .collect();
                let index = Indexer::new(config.clone(), embedder.clone())
                    .unwrap()
                    .embed_documents(&documents)
                    .await
                    .unwrap();
                pipeline_with(config, embedder, completion.clone())
                    .answer(&index, "What is the capital of France?")
                    .await
                    .unwrap()
            });

            prop_assert_eq!(answer.outcome, AnswerOutcome::NoRelevantContext);
            prop_assert_eq!(answer.text.as_str(), NO_RELEVANT_CONTEXT_ANSWER);
            prop_assert!(answer.sources.is_empty());
            prop_assert_eq!(completion.calls(), 0);
        }

        #[test]
        fn passing_gate_cites_min_k_results_descending(
            texts in arb_texts(),
            top_k in 1usize..15,
            pick in any::<prop::sample::Index>(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let embedder = Arc::new(HashEmbedder::default());
            let completion = Arc::new(RecordingCompletion::default());
            let config = RagConfig::builder().top_k(top_k).build().unwrap();
            let target = pick.index(texts.len());

            let answer = rt.block_on(async {
                let documents: Vec<Document> = texts
                    .iter()
                    .enumerate()
                    .map(|(i, text)| Document::new(format!("doc{i}.md"), text.clone()))
                    .collect();
                let index = Indexer::new(config.clone(), embedder.clone())
                    .unwrap()
                    .embed_documents(&documents)
                    .await
                    .unwrap();
                pipeline_with(config, embedder, completion.clone())
                    .answer(&index, &texts[target])
                    .await
                    .unwrap()
            });

            prop_assert_eq!(answer.outcome, AnswerOutcome::Answered);
            prop_assert_eq!(answer.sources.len(), top_k.min(texts.len()));
            prop_assert!(answer.sources.windows(2).all(|w| w[0].score >= w[1].score));
            prop_assert_eq!(completion.calls(), 1);
        }
    }
}

#[tokio::test]
async fn rebuilding_twice_gives_the_same_top_result() {
    let data = tempfile::tempdir().unwrap();
    std::fs::write(data.path().join("alice.md"), "Alice fell down the rabbit hole.").unwrap();
    std::fs::write(data.path().join("tea.md"), "The Hatter and the March Hare had tea.").unwrap();
    let location = data.path().join("chroma");

    let embedder = Arc::new(HashEmbedder::default());
    let indexer = Indexer::new(RagConfig::default(), embedder.clone()).unwrap();
    let pipeline = pipeline_with(
        RagConfig::default(),
        embedder,
        Arc::new(RecordingCompletion::default()),
    );
    let documents = load_documents(data.path()).unwrap();

    let mut tops = Vec::new();
    for _ in 0..2 {
        let stats = indexer.build_index(&documents, &location).await.unwrap();
        assert_eq!(stats.chunks, 2);
        let index = VectorIndex::load(&location).await.unwrap();
        assert_eq!(index.len(), 2);
        let hits = pipeline.retrieve(&index, "The Hatter and the March Hare had tea.").await.unwrap();
        tops.push((hits[0].entry.id.clone(), hits[0].score));
    }
    assert_eq!(tops[0], tops[1]);
}

#[tokio::test]
async fn alice_question_is_answered_from_the_book() {
    let data = tempfile::tempdir().unwrap();
    std::fs::write(
        data.path().join("alice.md"),
        "Alice fell down the rabbit hole and met the White Rabbit.",
    )
    .unwrap();
    let location = data.path().join("chroma");

    let embedder = Arc::new(KeywordEmbedder::default());
    let completion = Arc::new(RecordingCompletion::default());
    Indexer::new(RagConfig::default(), embedder.clone())
        .unwrap()
        .build_index(&load_documents(data.path()).unwrap(), &location)
        .await
        .unwrap();

    let pipeline = pipeline_with(RagConfig::default(), embedder, completion.clone());
    let answer = pipeline.answer_persisted(&location, "Who did Alice meet?").await.unwrap();

    assert!(answer.is_answered());
    assert!(answer.text.contains("White Rabbit"));
    assert_eq!(answer.sources.len(), 1);
    assert!(answer.sources[0].preview.contains("White Rabbit"));
    assert!(answer.sources[0].source.ends_with("alice.md"));
    assert!(answer.sources[0].score >= 0.7);
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn empty_query_and_missing_index_never_reach_completion() {
    let dir = tempfile::tempdir().unwrap();
    let completion = Arc::new(RecordingCompletion::default());
    let pipeline = pipeline_with(
        RagConfig::default(),
        Arc::new(KeywordEmbedder::default()),
        completion.clone(),
    );

    let err = pipeline.answer_persisted(dir.path(), "").await.unwrap_err();
    assert!(err.is_validation());
    let err = pipeline.answer_persisted(dir.path(), "Who is Alice?").await.unwrap_err();
    assert!(matches!(err, RagError::IndexNotReady(_)));
    assert_eq!(completion.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_embedding_failure_is_retried_once() {
    let embedder = Arc::new(FailingEmbedder::transient());
    let indexer = Indexer::new(RagConfig::default(), embedder.clone()).unwrap();
    let err = indexer
        .embed_documents(&[Document::new("a.md", "Alice")])
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(embedder.calls(), 2);
}
