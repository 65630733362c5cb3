//! Configuration data structures for ticketrank.
//!
//! Defines the YAML config format: database location, embedding provider,
//! fusion weights, the boundary degrade policy, reply generation and the
//! helpdesk connection. Every section has defaults so an empty file (or
//! no file at all) yields a working configuration.
//!
//! Secrets never live in the config. Each provider section names the
//! environment variable that holds its API key instead.

use serde::{Deserialize, Serialize};

use crate::search::fusion::FusionParams;
use crate::search::lexical::DEFAULT_RANK_SCALE;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for ticketrank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketRankConfig {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub boundary: BoundaryConfig,
    pub generation: GenerationConfig,
    pub helpdesk: HelpdeskConfig,
}

impl TicketRankConfig {
    /// Reject values that would make ranking or storage misbehave.
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be greater than zero".into());
        }
        if self.embedding.timeout_ms == 0 {
            return Err("embedding.timeout_ms must be greater than zero".into());
        }
        if self.database.path.trim().is_empty() {
            return Err("database.path must not be empty".into());
        }
        let scale = self.search.lexical_rank_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(format!(
                "search.lexical_rank_scale must be finite and > 0, got {scale}"
            ));
        }
        self.search
            .fusion_params()
            .validate()
            .map_err(|e| format!("search.{e}"))
    }
}

// ---------------------------------------------------------------------------
// DatabaseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file. Relative paths resolve against the working directory.
    pub path: String,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "tickets.db".into(),
            busy_timeout_ms: 5_000,
        }
    }
}

// ---------------------------------------------------------------------------
// EmbeddingConfig
// ---------------------------------------------------------------------------

/// Which embedding provider backs the semantic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
    /// Deterministic offline feature hashing.
    Hash,
    /// Local ONNX model (requires the `embedding` cargo feature).
    Local,
}

impl EmbedderKind {
    /// Parse from a loose string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open-ai" | "open_ai" => Some(Self::OpenAi),
            "hash" | "hashed" | "deterministic" => Some(Self::Hash),
            "local" | "fastembed" => Some(Self::Local),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Hash => "hash",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbedderKind,
    pub model: String,
    /// Vector dimension D. Pinned in the database on first use.
    pub dimension: usize,
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderKind::OpenAi,
            model: "text-embedding-3-small".into(),
            dimension: 1536,
            api_base: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// SearchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    pub semantic_limit: usize,
    pub lexical_limit: usize,
    pub result_limit: usize,
    /// Upper bound of the scaled BM25 rank.
    pub lexical_rank_scale: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let fusion = FusionParams::default();
        Self {
            semantic_weight: fusion.semantic_weight,
            keyword_weight: fusion.keyword_weight,
            semantic_limit: fusion.semantic_limit,
            lexical_limit: fusion.lexical_limit,
            result_limit: fusion.result_limit,
            lexical_rank_scale: DEFAULT_RANK_SCALE,
        }
    }
}

impl SearchConfig {
    pub fn fusion_params(&self) -> FusionParams {
        FusionParams {
            semantic_weight: self.semantic_weight,
            keyword_weight: self.keyword_weight,
            semantic_limit: self.semantic_limit,
            lexical_limit: self.lexical_limit,
            result_limit: self.result_limit,
        }
    }
}

// ---------------------------------------------------------------------------
// BoundaryConfig
// ---------------------------------------------------------------------------

/// What the service boundary does when one retrieval side fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradePolicy {
    /// Propagate the retrieval error.
    #[default]
    Fail,
    /// Fuse the surviving side alone and log a warning.
    BestEffort,
}

impl DegradePolicy {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail" | "strict" => Some(Self::Fail),
            "best_effort" | "besteffort" | "degrade" => Some(Self::BestEffort),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::BestEffort => "best_effort",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub degrade: DegradePolicy,
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Draft replies and summaries at all.
    pub enabled: bool,
    /// Summarize descriptions during ingestion.
    pub summarize_on_ingest: bool,
    pub openai_model: String,
    pub openai_api_base: String,
    pub openai_api_key_env: String,
    pub anthropic_model: String,
    pub anthropic_api_base: String,
    pub anthropic_api_key_env: String,
    /// Inputs longer than this many characters go to the long-form model.
    pub long_form_threshold: usize,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            summarize_on_ingest: true,
            openai_model: "gpt-4o-mini".into(),
            openai_api_base: "https://api.openai.com/v1".into(),
            openai_api_key_env: "OPENAI_API_KEY".into(),
            anthropic_model: "claude-3-5-sonnet-20241022".into(),
            anthropic_api_base: "https://api.anthropic.com/v1".into(),
            anthropic_api_key_env: "ANTHROPIC_API_KEY".into(),
            long_form_threshold: 500,
            max_tokens: 400,
            timeout_ms: 60_000,
        }
    }
}

// ---------------------------------------------------------------------------
// HelpdeskConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelpdeskConfig {
    /// Base URL such as `https://acme.freshdesk.com`. Unset disables the client.
    pub domain: Option<String>,
    pub api_key_env: String,
    /// Post drafted replies back as public notes.
    pub post_replies: bool,
    pub timeout_ms: u64,
}

impl Default for HelpdeskConfig {
    fn default() -> Self {
        Self {
            domain: None,
            api_key_env: "FRESHDESK_API_KEY".into(),
            post_replies: true,
            timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn default_config_is_valid() {
        let config = TicketRankConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.search.fusion_params(), FusionParams::default());
        assert_eq!(config.boundary.degrade, DegradePolicy::Fail);
        assert!(!config.generation.enabled);
        assert_eq!(config.helpdesk.domain, None);
    }

    #[test]
    fn empty_yaml_gives_defaults() {
        let config: TicketRankConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, TicketRankConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r#"
database:
  path: /var/lib/ticketrank/tickets.db
embedding:
  provider: hash
  dimension: 256
search:
  keyword_weight: 12.5
boundary:
  degrade: best_effort
"#;
        let config: TicketRankConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.path, "/var/lib/ticketrank/tickets.db");
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.embedding.provider, EmbedderKind::Hash);
        assert_eq!(config.embedding.dimension, 256);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.search.keyword_weight, 12.5);
        assert_eq!(config.search.semantic_weight, 0.7);
        assert_eq!(config.boundary.degrade, DegradePolicy::BestEffort);
    }

    #[test]
    fn yaml_roundtrip() {
        let mut config = TicketRankConfig::default();
        config.helpdesk.domain = Some("https://acme.freshdesk.com".into());
        config.generation.enabled = true;
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: TicketRankConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn invalid_yaml_returns_error() {
        let result: Result<TicketRankConfig, _> = serde_yaml::from_str("{{invalid yaml}}");
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = TicketRankConfig::default();
        config.embedding.dimension = 0;
        assert!(config.validate().unwrap_err().contains("dimension"));

        let mut config = TicketRankConfig::default();
        config.search.keyword_weight = f64::INFINITY;
        assert!(config.validate().unwrap_err().contains("keyword_weight"));

        let mut config = TicketRankConfig::default();
        config.search.result_limit = 0;
        assert!(config.validate().unwrap_err().contains("result_limit"));

        let mut config = TicketRankConfig::default();
        config.search.lexical_rank_scale = 0.0;
        assert!(config.validate().unwrap_err().contains("lexical_rank_scale"));
    }

    #[test_case("openai", Some(EmbedderKind::OpenAi) ; "openai")]
    #[test_case("OpenAI", Some(EmbedderKind::OpenAi) ; "openai mixed case")]
    #[test_case(" hash ", Some(EmbedderKind::Hash) ; "hash padded")]
    #[test_case("deterministic", Some(EmbedderKind::Hash) ; "deterministic alias")]
    #[test_case("fastembed", Some(EmbedderKind::Local) ; "fastembed alias")]
    #[test_case("bert", None ; "unknown")]
    fn embedder_kind_loose_parsing(input: &str, expected: Option<EmbedderKind>) {
        assert_eq!(EmbedderKind::from_str_loose(input), expected);
    }

    #[test_case("fail", Some(DegradePolicy::Fail) ; "fail")]
    #[test_case("best-effort", Some(DegradePolicy::BestEffort) ; "hyphenated")]
    #[test_case("BEST_EFFORT", Some(DegradePolicy::BestEffort) ; "upper snake")]
    #[test_case("sometimes", None ; "unknown")]
    fn degrade_policy_loose_parsing(input: &str, expected: Option<DegradePolicy>) {
        assert_eq!(DegradePolicy::from_str_loose(input), expected);
    }

    #[test]
    fn embedder_kind_display_matches_serde() {
        for kind in [EmbedderKind::OpenAi, EmbedderKind::Hash, EmbedderKind::Local] {
            let yaml = serde_yaml::to_string(&kind).unwrap();
            assert_eq!(yaml.trim(), kind.to_string());
        }
    }
}
