//! Property tests for recursive chunking.

use docqa_rag::{Chunker, Document, RecursiveChunker};
use proptest::prelude::*;

/// Text mixing words, sentences, lines and paragraphs, plus a few multi-byte characters.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            4 => "[a-zé]{1,12}",
            3 => Just(" ".to_string()),
            1 => Just(". ".to_string()),
            1 => Just("\n".to_string()),
            1 => Just("\n\n".to_string()),
        ],
        0..120,
    )
    .prop_map(|parts| parts.concat())
}

/// Chunk size together with an overlap strictly smaller than it.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (2usize..80).prop_flat_map(|size| (Just(size), 0..size))
}

mod prop_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_cover_text_in_order_within_size(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&Document::new("doc", text.clone()));
            let chars: Vec<char> = text.chars().collect();

            if chars.is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            prop_assert_eq!(chunks[0].start_index, 0);
            let mut covered_to = 0;
            for (i, chunk) in chunks.iter().enumerate() {
                let len = chunk.text.chars().count();
                prop_assert!(len >= 1 && len <= size, "chunk {} has {} chars", i, len);
                prop_assert!(chunk.start_index <= covered_to, "gap before chunk {}", i);

                let expected: String =
                    chars[chunk.start_index..chunk.start_index + len].iter().collect();
                prop_assert_eq!(&chunk.text, &expected);

                if i > 0 {
                    prop_assert!(chunk.start_index > chunks[i - 1].start_index);
                }
                covered_to = covered_to.max(chunk.start_index + len);
            }
            prop_assert_eq!(covered_to, chars.len());
        }

        #[test]
        fn short_text_is_a_single_chunk(
            text in "[a-z .\n]{1,40}",
            overlap in 0usize..10,
        ) {
            let chunker = RecursiveChunker::new(40, overlap).unwrap();
            let chunks = chunker.chunk(&Document::new("doc", text.clone()));
            prop_assert_eq!(chunks.len(), 1);
            prop_assert_eq!(&chunks[0].text, &text);
            prop_assert_eq!(chunks[0].start_index, 0);
        }
    }
}

#[test]
fn default_sizes_split_a_book_length_document() {
    let paragraph = "Alice was beginning to get very tired of sitting by her sister on the bank. ";
    let text = format!("{}\n\n", paragraph.repeat(5)).repeat(20);
    let chunker = RecursiveChunker::new(1000, 200).unwrap();
    let chunks = chunker.chunk(&Document::new("alice.md", text.clone()));

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.text.chars().count() <= 1000));
    assert!(chunks.iter().all(|c| c.metadata.get("source").map(String::as_str) == Some("alice.md")));
    let last = chunks.last().unwrap();
    assert_eq!(last.start_index + last.text.chars().count(), text.chars().count());
}
