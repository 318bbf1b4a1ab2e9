//! Text embedding providers.
//!
//! Memory stores only see vectors; this module turns message text into
//! them. [`FastEmbedder`] runs a local ONNX sentence encoder through
//! `fastembed`.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;
use tracing::info;

/// Dimension of the vectors produced by [`FastEmbedder`].
pub const FASTEMBED_DIMENSION: usize = 768;

/// Something that can turn text into a fixed-dimension vector.
///
/// Failures are propagated to the caller as-is; there is no retry.
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Number of components in every vector returned by [`embed`](Self::embed).
    fn dimension(&self) -> usize;
}

/// Local sentence encoder (BGE base, 768 dimensions).
///
/// The model is loaded on first use and shared by every agent holding the
/// same `Arc<FastEmbedder>`.
pub struct FastEmbedder {
    model: Arc<Mutex<Option<TextEmbedding>>>,
    show_download_progress: bool,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("model", &"BGEBaseENV15")
            .field("dimension", &FASTEMBED_DIMENSION)
            .finish()
    }
}

impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl FastEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Arc::new(Mutex::new(None)),
            show_download_progress: true,
        }
    }

    /// Load the model now instead of on the first [`Embedder::embed`] call.
    pub async fn initialize(&self) -> Result<()> {
        let mut guard = self.model.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(())
    }

    async fn load(&self) -> Result<TextEmbedding> {
        info!("Initializing fastembed model (BGE-Base-En-V1.5)...");
        let mut options = InitOptions::new(EmbeddingModel::BGEBaseENV15);
        options.show_download_progress = self.show_download_progress;

        tokio::task::spawn_blocking(move || TextEmbedding::try_new(options))
            .await
            .context("embedding model loader panicked")?
            .context("failed to load embedding model")
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut guard = self.model.lock().await;
        let mut model = match guard.take() {
            Some(model) => model,
            None => self.load().await?,
        };

        // Inference is CPU-bound; move the model onto the blocking pool and
        // put it back afterwards.
        let input = vec![text.to_string()];
        let (result, model) = tokio::task::spawn_blocking(move || {
            let result = model.embed(input, None);
            (result, model)
        })
        .await
        .context("embedding task panicked")?;
        *guard = Some(model);

        result
            .map_err(|e| anyhow::anyhow!(e))?
            .into_iter()
            .next()
            .context("No embedding generated")
    }

    fn dimension(&self) -> usize {
        FASTEMBED_DIMENSION
    }
}
