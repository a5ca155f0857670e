//! On-disk content store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<ref_id>/entry.json
//! <root>/<ref_id>/chunk-0
//! <root>/<ref_id>/chunk-1
//! ...
//! ```
//!
//! The entry directory is created with `create_dir`, so writing the same
//! `ref_id` twice fails instead of overwriting. `entry.json` is written
//! last; an entry without it is incomplete and reads as not found.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine;
use chrono::Utc;
use mcprt_core::{
    ContentBlock, ContentEntry, ContentKind, ImageCaptioner, NoopCaptioner, RetrievedContent,
    RuntimeError, RuntimeResult, RuntimeSettings, ensure_directory,
};
use uuid::Uuid;

use crate::chunking::{estimate_tokens, split_chunks};

const ENTRY_FILE: &str = "entry.json";

fn chunk_file(index: usize) -> String {
    format!("chunk-{index}")
}

fn storage(err: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::Storage(err.to_string())
}

/// Write-once store for oversized tool output.
pub struct ContentStore {
    root: PathBuf,
    max_tokens: usize,
    describe_images: bool,
    captioner: Arc<dyn ImageCaptioner>,
    closed: AtomicBool,
}

impl ContentStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, max_tokens: usize) -> RuntimeResult<Self> {
        let root = root.into();
        if max_tokens == 0 {
            return Err(RuntimeError::Internal(
                "content budget must be at least 1 token".to_string(),
            ));
        }
        ensure_directory(&root).map_err(storage)?;

        Ok(Self {
            root,
            max_tokens,
            describe_images: false,
            captioner: Arc::new(NoopCaptioner),
            closed: AtomicBool::new(false),
        })
    }

    /// Open the store described by runtime settings.
    pub fn from_settings(
        settings: &RuntimeSettings,
        captioner: Arc<dyn ImageCaptioner>,
    ) -> RuntimeResult<Self> {
        Ok(Self::open(&settings.offload_dir, settings.max_result_tokens)?
            .with_captioner(captioner)
            .describe_images(settings.describe_images))
    }

    #[must_use]
    pub fn with_captioner(mut self, captioner: Arc<dyn ImageCaptioner>) -> Self {
        self.captioner = captioner;
        self
    }

    #[must_use]
    pub const fn describe_images(mut self, enabled: bool) -> Self {
        self.describe_images = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn ensure_open(&self) -> RuntimeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RuntimeError::Storage("content store closed".to_string()));
        }
        Ok(())
    }

    /// Stop accepting reads and writes. Files stay on disk.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(root = %self.root.display(), "Content store closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Process blocks with the store's own budget and caption setting.
    pub async fn process_content(
        &self,
        blocks: Vec<ContentBlock>,
    ) -> RuntimeResult<Vec<ContentBlock>> {
        self.process_content_with(blocks, self.max_tokens, self.describe_images)
            .await
    }

    /// Rewrite each block, offloading what should not be returned inline.
    ///
    /// Text over `budget` is chunked and replaced by a marker. Images and
    /// audio are always stored and replaced by a marker. The output has the
    /// same length and order as the input.
    pub async fn process_content_with(
        &self,
        blocks: Vec<ContentBlock>,
        budget: usize,
        describe_images: bool,
    ) -> RuntimeResult<Vec<ContentBlock>> {
        self.ensure_open()?;
        let budget = budget.max(1);

        let mut processed = Vec::with_capacity(blocks.len());
        for block in blocks {
            let block = match block {
                ContentBlock::Text { text } => self.process_text(text, budget).await?,
                ContentBlock::Image { data, mime_type } => {
                    self.process_media(ContentKind::Image, data, mime_type, describe_images)
                        .await?
                }
                ContentBlock::Audio { data, mime_type } => {
                    self.process_media(ContentKind::Audio, data, mime_type, false)
                        .await?
                }
            };
            processed.push(block);
        }
        Ok(processed)
    }

    async fn process_text(&self, text: String, budget: usize) -> RuntimeResult<ContentBlock> {
        let estimate = estimate_tokens(&text);
        if estimate <= budget {
            return Ok(ContentBlock::Text { text });
        }

        let chunks = split_chunks(&text, budget);
        let entry = self
            .write_entry(ContentKind::Text, None, estimate, &chunks)
            .await?;
        Ok(ContentBlock::text(text_marker(&entry, budget)))
    }

    async fn process_media(
        &self,
        kind: ContentKind,
        data: String,
        mime_type: String,
        describe: bool,
    ) -> RuntimeResult<ContentBlock> {
        let entry = self
            .write_entry(
                kind,
                Some(mime_type.clone()),
                estimate_tokens(&data),
                &[data.as_str()],
            )
            .await?;

        let description = if describe {
            self.caption(&entry.ref_id, &data, &mime_type).await
        } else {
            None
        };

        Ok(ContentBlock::text(media_marker(
            &entry,
            &mime_type,
            decoded_len(&data),
            description.as_deref(),
        )))
    }

    async fn caption(&self, ref_id: &str, data: &str, mime_type: &str) -> Option<String> {
        match self.captioner.describe(data, mime_type).await {
            Ok(description) => description.filter(|d| !d.trim().is_empty()),
            Err(e) => {
                tracing::warn!(ref_id = %ref_id, error = %e, "Image description failed");
                None
            }
        }
    }

    async fn write_entry(
        &self,
        kind: ContentKind,
        mime_type: Option<String>,
        estimated_tokens: usize,
        chunks: &[&str],
    ) -> RuntimeResult<ContentEntry> {
        let ref_id = Uuid::new_v4().to_string();
        let dir = self.root.join(&ref_id);
        tokio::fs::create_dir(&dir).await.map_err(storage)?;

        for (index, chunk) in chunks.iter().enumerate() {
            tokio::fs::write(dir.join(chunk_file(index)), chunk.as_bytes())
                .await
                .map_err(storage)?;
        }

        let entry = ContentEntry {
            ref_id,
            kind,
            mime_type,
            total_chunks: chunks.len(),
            estimated_tokens,
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&entry).map_err(storage)?;
        tokio::fs::write(dir.join(ENTRY_FILE), json)
            .await
            .map_err(storage)?;

        tracing::info!(
            ref_id = %entry.ref_id,
            kind = %kind,
            chunks = entry.total_chunks,
            estimated_tokens,
            "Content offloaded"
        );
        Ok(entry)
    }

    /// Metadata of a stored entry.
    pub async fn entry(&self, ref_id: &str) -> RuntimeResult<ContentEntry> {
        self.ensure_open()?;
        // Anything that is not a UUID never names a directory of ours.
        if Uuid::parse_str(ref_id).is_err() {
            return Err(RuntimeError::ReferenceNotFound(ref_id.to_string()));
        }

        let path = self.root.join(ref_id).join(ENTRY_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RuntimeError::ReferenceNotFound(ref_id.to_string()));
            }
            Err(e) => return Err(storage(e)),
        };
        serde_json::from_slice(&bytes).map_err(storage)
    }

    /// Retrieve one chunk, or the whole entry when `chunk_index` is `None`.
    ///
    /// For multi-chunk text the whole entry is the concatenation of all
    /// chunks, i.e. the original text.
    pub async fn get_content(
        &self,
        ref_id: &str,
        chunk_index: Option<usize>,
    ) -> RuntimeResult<RetrievedContent> {
        let entry = self.entry(ref_id).await?;
        let dir = self.root.join(&entry.ref_id);

        let payload = match chunk_index {
            Some(index) if index >= entry.total_chunks => {
                return Err(RuntimeError::ChunkIndexOutOfRange {
                    ref_id: entry.ref_id,
                    index,
                    total: entry.total_chunks,
                });
            }
            Some(index) => read_chunk(&dir, index).await?,
            None => {
                let mut full = String::new();
                for index in 0..entry.total_chunks {
                    full.push_str(&read_chunk(&dir, index).await?);
                }
                full
            }
        };

        let mime_type = entry.mime_type.clone().unwrap_or_default();
        let block = match entry.kind {
            ContentKind::Text => ContentBlock::text(payload),
            ContentKind::Image => ContentBlock::image(payload, mime_type),
            ContentKind::Audio => ContentBlock::audio(payload, mime_type),
        };

        Ok(RetrievedContent {
            ref_id: entry.ref_id,
            kind: entry.kind,
            chunk_index,
            total_chunks: entry.total_chunks,
            block,
        })
    }
}

async fn read_chunk(dir: &Path, index: usize) -> RuntimeResult<String> {
    tokio::fs::read_to_string(dir.join(chunk_file(index)))
        .await
        .map_err(storage)
}

/// Size in bytes of a base64 payload, estimated when it does not decode.
fn decoded_len(data: &str) -> usize {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_or_else(|_| data.len() * 3 / 4, |bytes| bytes.len())
}

fn text_marker(entry: &ContentEntry, budget: usize) -> String {
    let last = entry.total_chunks.saturating_sub(1);
    format!(
        "[Content truncated: ~{} tokens exceeds budget of {budget} tokens, split into {} chunks]\n\
         [Reference: {}]\n\
         Use get_content with ref_id=\"{}\" to read it; pass chunk_index 0..={last} for a single chunk.",
        entry.estimated_tokens, entry.total_chunks, entry.ref_id, entry.ref_id,
    )
}

fn media_marker(
    entry: &ContentEntry,
    mime_type: &str,
    bytes: usize,
    description: Option<&str>,
) -> String {
    let label = match entry.kind {
        ContentKind::Audio => "Audio",
        _ => "Image",
    };
    let mut marker = format!(
        "[{label}: {mime_type}, {bytes} bytes (base64)]\n[Reference: {}]",
        entry.ref_id
    );
    if let Some(description) = description {
        marker.push_str(&format!("\n[Description: {description}]"));
    }
    marker
}
