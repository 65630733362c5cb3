//! Embedding providers: text in, fixed-dimension vector out.
//!
//! The retrieval core only sees the [`EmbeddingProvider`] trait. Concrete
//! providers are chosen from config by [`build_provider`].

pub mod hashed;
#[cfg(feature = "embedding")]
pub mod local;
pub mod openai;

use std::sync::Arc;

use crate::config::schema::{EmbedderKind, EmbeddingConfig};
use crate::error::ProviderError;

pub use hashed::HashEmbedder;
#[cfg(feature = "embedding")]
pub use local::FastEmbedder;
pub use openai::OpenAiEmbedder;

/// External collaborator that maps text to a vector of fixed dimension.
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier used in logs and `stats` output.
    fn name(&self) -> &str;

    /// Dimension D of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embed one text. Implementations must return exactly
    /// [`dimension`](Self::dimension) values or an error.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Check a provider's output length against its declared dimension.
pub(crate) fn check_dimension(vector: &[f32], expected: usize) -> Result<(), ProviderError> {
    if vector.len() != expected {
        return Err(ProviderError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Construct the provider named by `config.provider`.
///
/// `lookup` resolves environment variables (API keys).
pub fn build_provider<F>(
    config: &EmbeddingConfig,
    lookup: F,
) -> Result<Arc<dyn EmbeddingProvider>, ProviderError>
where
    F: Fn(&str) -> Option<String>,
{
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbedderKind::OpenAi => {
            let api_key = lookup(&config.api_key_env)
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    ProviderError::Unavailable(format!(
                        "{} is not set; the openai embedder needs an API key",
                        config.api_key_env
                    ))
                })?;
            Arc::new(OpenAiEmbedder::new(config, api_key)?)
        }
        EmbedderKind::Hash => Arc::new(HashEmbedder::new(config.dimension)),
        EmbedderKind::Local => local_provider(config)?,
    };
    tracing::info!(
        provider = provider.name(),
        dimension = provider.dimension(),
        "embedding provider ready"
    );
    Ok(provider)
}

#[cfg(feature = "embedding")]
fn local_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    let provider = FastEmbedder::load()?;
    if provider.dimension() != config.dimension {
        return Err(ProviderError::DimensionMismatch {
            expected: config.dimension,
            actual: provider.dimension(),
        });
    }
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "embedding"))]
fn local_provider(_config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    Err(ProviderError::Unavailable(
        "local embedder requires building with `--features embedding`".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_provider_needs_no_credentials() {
        let config = EmbeddingConfig {
            provider: EmbedderKind::Hash,
            dimension: 32,
            ..EmbeddingConfig::default()
        };
        let provider = build_provider(&config, |_| None).unwrap();
        assert_eq!(provider.name(), "hash");
        assert_eq!(provider.embed("vpn drops").unwrap().len(), 32);
    }

    #[test]
    fn openai_provider_requires_api_key() {
        let config = EmbeddingConfig::default();
        let err = build_provider(&config, |_| None).err().unwrap();
        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let err = build_provider(&config, |_| Some("   ".into())).err().unwrap();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[test]
    fn openai_provider_builds_with_key() {
        let config = EmbeddingConfig::default();
        let provider = build_provider(&config, |_| Some("test-key".into())).unwrap();
        assert_eq!(provider.dimension(), 1536);
    }

    #[cfg(not(feature = "embedding"))]
    #[test]
    fn local_provider_unavailable_without_feature() {
        let config = EmbeddingConfig {
            provider: EmbedderKind::Local,
            ..EmbeddingConfig::default()
        };
        let err = build_provider(&config, |_| None).err().unwrap();
        assert!(err.to_string().contains("--features embedding"));
    }

    #[test]
    fn check_dimension_reports_lengths() {
        assert!(check_dimension(&[0.0; 3], 3).is_ok());
        let err = check_dimension(&[0.0; 2], 3).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }
}
