//! Offload and retrieval through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mcprt_content::{ContentStore, estimate_tokens};
use mcprt_core::{CaptionError, ContentBlock, ContentKind, ImageCaptioner, RuntimeError};
use tempfile::TempDir;

fn store(max_tokens: usize) -> (TempDir, ContentStore) {
    let dir = TempDir::new().unwrap();
    let store = ContentStore::open(dir.path(), max_tokens).unwrap();
    (dir, store)
}

fn reference(block: &ContentBlock) -> String {
    let text = block.as_text().expect("marker is text");
    let start = text.find("[Reference: ").expect("reference marker") + "[Reference: ".len();
    let end = text[start..].find(']').unwrap();
    text[start..start + end].to_string()
}

struct FixedCaptioner {
    calls: AtomicUsize,
    reply: Result<Option<String>, CaptionError>,
}

impl FixedCaptioner {
    fn new(reply: Result<Option<String>, CaptionError>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply,
        }
    }
}

#[async_trait]
impl ImageCaptioner for FixedCaptioner {
    async fn describe(&self, _data: &str, _mime_type: &str) -> Result<Option<String>, CaptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

#[tokio::test]
async fn test_small_text_passes_through() {
    let (_dir, store) = store(1000);
    let blocks = vec![ContentBlock::text("Hello world")];

    let result = store.process_content(blocks.clone()).await.unwrap();
    assert_eq!(result, blocks);
    assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_large_text_is_chunked_and_retrievable() {
    let (_dir, store) = store(10);
    let text = "word ".repeat(100);

    let result = store
        .process_content(vec![ContentBlock::text(text.clone())])
        .await
        .unwrap();
    assert_eq!(result.len(), 1);
    let marker = result[0].as_text().unwrap();
    assert!(marker.contains("[Content truncated:"));
    assert!(marker.contains("~125 tokens exceeds budget of 10 tokens, split into 13 chunks"));

    let ref_id = reference(&result[0]);
    let whole = store.get_content(&ref_id, None).await.unwrap();
    assert_eq!(whole.kind, ContentKind::Text);
    assert_eq!(whole.total_chunks, 13);
    assert_eq!(whole.chunk_index, None);
    assert_eq!(whole.block.as_text(), Some(text.as_str()));
    assert!(whole.block.as_text().unwrap().contains("word"));

    let mut rebuilt = String::new();
    for index in 0..13 {
        let chunk = store.get_content(&ref_id, Some(index)).await.unwrap();
        let chunk_text = chunk.block.as_text().unwrap();
        assert!(estimate_tokens(chunk_text) <= 10);
        rebuilt.push_str(chunk_text);
    }
    assert_eq!(rebuilt, text);
}

#[tokio::test]
async fn test_image_is_always_offloaded() {
    let (_dir, store) = store(10_000);

    let result = store
        .process_content(vec![ContentBlock::image("base64data", "image/png")])
        .await
        .unwrap();
    let marker = result[0].as_text().unwrap();
    assert!(marker.contains("[Image: image/png"));
    assert!(marker.contains("[Reference:"));
    assert!(!marker.contains("[Description:"));

    let stored = store.get_content(&reference(&result[0]), None).await.unwrap();
    assert_eq!(stored.block, ContentBlock::image("base64data", "image/png"));
    assert_eq!(stored.total_chunks, 1);
}

#[tokio::test]
async fn test_audio_marker_and_round_trip() {
    let (_dir, store) = store(10_000);

    let result = store
        .process_content(vec![ContentBlock::audio("UklGRg==", "audio/wav")])
        .await
        .unwrap();
    let marker = result[0].as_text().unwrap();
    assert!(marker.starts_with("[Audio: audio/wav, 4 bytes (base64)]"));

    let stored = store
        .get_content(&reference(&result[0]), Some(0))
        .await
        .unwrap();
    assert_eq!(stored.block, ContentBlock::audio("UklGRg==", "audio/wav"));
}

#[tokio::test]
async fn test_mixed_blocks_keep_order_and_length() {
    let (_dir, store) = store(5);
    let blocks = vec![
        ContentBlock::text("short"),
        ContentBlock::text("x".repeat(100)),
        ContentBlock::image("aGk=", "image/jpeg"),
    ];

    let result = store.process_content(blocks).await.unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result[0], ContentBlock::text("short"));
    assert!(result[1].as_text().unwrap().contains("split into 5 chunks"));
    assert!(result[2].as_text().unwrap().starts_with("[Image: image/jpeg, 2 bytes"));
}

#[tokio::test]
async fn test_caption_is_embedded_when_enabled() {
    let dir = TempDir::new().unwrap();
    let captioner = Arc::new(FixedCaptioner::new(Ok(Some("a red square".to_string()))));
    let store = ContentStore::open(dir.path(), 100)
        .unwrap()
        .with_captioner(captioner.clone())
        .describe_images(true);

    let result = store
        .process_content(vec![
            ContentBlock::image("aGk=", "image/png"),
            ContentBlock::audio("aGk=", "audio/wav"),
        ])
        .await
        .unwrap();

    assert!(result[0].as_text().unwrap().contains("[Description: a red square]"));
    assert!(!result[1].as_text().unwrap().contains("[Description:"));
    // Audio is never captioned.
    assert_eq!(captioner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_caption_failure_is_omitted() {
    let dir = TempDir::new().unwrap();
    let captioner = Arc::new(FixedCaptioner::new(Err(CaptionError("model offline".into()))));
    let store = ContentStore::open(dir.path(), 100)
        .unwrap()
        .with_captioner(captioner);

    let result = store
        .process_content_with(vec![ContentBlock::image("aGk=", "image/png")], 100, true)
        .await
        .unwrap();
    let marker = result[0].as_text().unwrap();
    assert!(marker.contains("[Reference:"));
    assert!(!marker.contains("[Description:"));
}

#[tokio::test]
async fn test_unknown_reference() {
    let (_dir, store) = store(10);

    let err = store
        .get_content("00000000-0000-4000-8000-000000000000", None)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ReferenceNotFound(_)));

    let err = store.get_content("../../etc", None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::ReferenceNotFound(_)));
}

#[tokio::test]
async fn test_chunk_index_out_of_range() {
    let (_dir, store) = store(10);
    let result = store
        .process_content(vec![ContentBlock::text("word ".repeat(100))])
        .await
        .unwrap();
    let ref_id = reference(&result[0]);

    let err = store.get_content(&ref_id, Some(13)).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::ChunkIndexOutOfRange { index: 13, total: 13, .. }
    ));
}

#[tokio::test]
async fn test_closed_store_rejects_operations() {
    let (_dir, store) = store(10);
    let result = store
        .process_content(vec![ContentBlock::image("aGk=", "image/png")])
        .await
        .unwrap();
    let ref_id = reference(&result[0]);

    store.close();
    assert!(store.is_closed());
    let err = store.get_content(&ref_id, None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Storage(ref m) if m.contains("closed")));
    let err = store
        .process_content(vec![ContentBlock::text("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Storage(_)));
    // Files survive close.
    assert!(store.root().join(&ref_id).is_dir());
}

#[tokio::test]
async fn test_concurrent_writers_get_distinct_references() {
    let (_dir, store) = store(1);
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let out = store
                .process_content(vec![ContentBlock::text(format!("payload number {i}"))])
                .await
                .unwrap();
            reference(&out[0])
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
}
