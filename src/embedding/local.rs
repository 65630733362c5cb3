//! Local ONNX embedder via fastembed (AllMiniLM-L6-v2, 384 dimensions).
//!
//! The model is downloaded once into the user cache directory and loaded
//! when the provider is constructed. `TextEmbedding::embed` needs `&mut
//! self`, so the model sits behind a mutex.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::embedding::{check_dimension, EmbeddingProvider};
use crate::error::ProviderError;

pub const LOCAL_DIMENSION: usize = 384;

pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("dimension", &LOCAL_DIMENSION)
            .finish_non_exhaustive()
    }
}

fn cache_dir() -> Result<PathBuf, ProviderError> {
    let dirs = directories::ProjectDirs::from("", "", "ticketrank")
        .ok_or_else(|| ProviderError::Unavailable("cannot determine cache directory".into()))?;
    let dir = dirs.cache_dir().join("models");
    std::fs::create_dir_all(&dir).map_err(|e| {
        ProviderError::Unavailable(format!("cannot create {}: {e}", dir.display()))
    })?;
    Ok(dir)
}

impl FastEmbedder {
    pub fn load() -> Result<Self, ProviderError> {
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(cache_dir()?)
            .with_show_download_progress(true);
        let model = TextEmbedding::try_new(options).map_err(|e| {
            ProviderError::Unavailable(format!("failed to load local embedding model: {e}"))
        })?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl EmbeddingProvider for FastEmbedder {
    fn name(&self) -> &str {
        "local"
    }

    fn dimension(&self) -> usize {
        LOCAL_DIMENSION
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut model = self.model.lock().unwrap_or_else(|e| e.into_inner());
        let vector = model
            .embed(vec![text], None)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("model returned no embedding".into()))?;
        check_dimension(&vector, LOCAL_DIMENSION)?;
        Ok(vector)
    }
}
