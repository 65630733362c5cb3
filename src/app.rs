//! Wiring: config -> store, providers, engine, service.
//!
//! Everything that talks to a blocking HTTP client is built here, before
//! any async runtime starts.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::schema::TicketRankConfig;
use crate::db::schema::SchemaOptions;
use crate::db::store::{StoreStats, TicketStore};
use crate::embedding::{build_provider, EmbeddingProvider};
use crate::error::{Result, TicketRankError};
use crate::helpdesk::FreshdeskClient;
use crate::ingest::{IngestPipeline, IngestReport, Summarizer};
use crate::reply::ReplyDrafter;
use crate::search::{Fts5Index, HybridSearch, SqliteVecIndex};
use crate::service::TicketSearchService;
use crate::types::RawTicket;
use crate::workflow::Workflow;

const MEMORY_DB: &str = ":memory:";

/// Read-only connections for the two index adapters.
struct IndexReaders {
    semantic: TicketStore,
    lexical: TicketStore,
}

#[derive(Clone)]
pub struct App {
    config: TicketRankConfig,
    store: Arc<Mutex<TicketStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
    service: TicketSearchService,
    drafter: Option<Arc<ReplyDrafter>>,
    helpdesk: Option<Arc<FreshdeskClient>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("db", &self.config.database.path)
            .field("embedder", &self.embedder.name())
            .field("drafter", &self.drafter.is_some())
            .field("helpdesk", &self.helpdesk.is_some())
            .finish()
    }
}

impl App {
    /// Build from config, reading API keys from the process environment.
    pub fn from_env(config: TicketRankConfig) -> Result<Self> {
        Self::build(config, |name| std::env::var(name).ok())
    }

    pub fn build<F>(config: TicketRankConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.validate().map_err(TicketRankError::Config)?;

        let embedder = build_provider(&config.embedding, &lookup)?;
        let options = SchemaOptions {
            dimension: embedder.dimension(),
            busy_timeout: Duration::from_millis(config.database.busy_timeout_ms),
        };
        ensure_parent_dir(Path::new(&config.database.path))?;
        let store = TicketStore::open(&config.database.path, &options)?;
        // In-memory databases are per connection, so readers share the writer.
        let readers = if config.database.path == MEMORY_DB {
            None
        } else {
            Some(IndexReaders {
                semantic: TicketStore::open(&config.database.path, &options)?,
                lexical: TicketStore::open(&config.database.path, &options)?,
            })
        };

        let drafter = ReplyDrafter::from_config(&config.generation, &lookup)?.map(Arc::new);
        let helpdesk = FreshdeskClient::from_config(&config.helpdesk, &lookup)?.map(Arc::new);

        tracing::info!(
            db = %config.database.path,
            embedder = embedder.name(),
            degrade = config.boundary.degrade.as_str(),
            drafting = drafter.is_some(),
            helpdesk = helpdesk.is_some(),
            "ticketrank ready"
        );
        Ok(Self::assemble(config, store, readers, embedder, drafter, helpdesk))
    }

    /// Build around an existing store, with no generation or helpdesk.
    /// Both index adapters share `store`'s connection.
    pub fn with_store(
        config: TicketRankConfig,
        store: TicketStore,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self::assemble(config, store, None, embedder, None, None)
    }

    fn assemble(
        config: TicketRankConfig,
        store: TicketStore,
        readers: Option<IndexReaders>,
        embedder: Arc<dyn EmbeddingProvider>,
        drafter: Option<Arc<ReplyDrafter>>,
        helpdesk: Option<Arc<FreshdeskClient>>,
    ) -> Self {
        let store = Arc::new(Mutex::new(store));
        let (semantic_store, lexical_store) = match readers {
            Some(r) => (Arc::new(Mutex::new(r.semantic)), Arc::new(Mutex::new(r.lexical))),
            None => (Arc::clone(&store), Arc::clone(&store)),
        };
        let semantic = Arc::new(SqliteVecIndex::new(semantic_store));
        let lexical = Arc::new(
            Fts5Index::new(lexical_store).with_rank_scale(config.search.lexical_rank_scale),
        );
        let engine = HybridSearch::new(
            Arc::clone(&embedder),
            semantic,
            lexical,
            config.search.fusion_params(),
        );
        let service = TicketSearchService::new(engine, config.boundary.degrade);
        Self {
            config,
            store,
            embedder,
            service,
            drafter,
            helpdesk,
        }
    }

    pub fn config(&self) -> &TicketRankConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Mutex<TicketStore>> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn service(&self) -> &TicketSearchService {
        &self.service
    }

    pub fn helpdesk(&self) -> Option<&FreshdeskClient> {
        self.helpdesk.as_deref()
    }

    pub fn drafter(&self) -> Option<&ReplyDrafter> {
        self.drafter.as_deref()
    }

    pub fn workflow(&self) -> Workflow {
        Workflow::new(self.service.clone())
            .with_drafter(self.drafter.clone())
            .with_helpdesk(self.helpdesk.clone(), self.config.helpdesk.post_replies)
    }

    /// Ingest tickets, summarizing with the drafter when configured.
    pub fn ingest<F>(&self, tickets: &[RawTicket], on_progress: F) -> Result<IngestReport>
    where
        F: FnMut(&RawTicket),
    {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let mut pipeline = IngestPipeline::new(&store, self.embedder.as_ref());
        if self.config.generation.summarize_on_ingest {
            if let Some(drafter) = self.drafter.as_deref() {
                pipeline = pipeline.with_summarizer(drafter as &dyn Summarizer);
            }
        }
        pipeline.ingest_with_progress(tickets, on_progress)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_stats()
    }
}

fn ensure_parent_dir(db_path: &Path) -> Result<()> {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EmbedderKind, EmbeddingConfig};

    fn hash_config(path: &Path) -> TicketRankConfig {
        let mut config = TicketRankConfig::default();
        config.database.path = path.to_string_lossy().into_owned();
        config.embedding = EmbeddingConfig {
            provider: EmbedderKind::Hash,
            dimension: 32,
            ..EmbeddingConfig::default()
        };
        config
    }

    #[test]
    fn builds_offline_with_hash_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::build(hash_config(&dir.path().join("nested/t.db")), |_| None).unwrap();
        assert!(app.drafter().is_none());
        assert!(app.helpdesk().is_none());
        assert_eq!(app.stats().unwrap().dimension, 32);
    }

    #[test]
    fn reopening_with_other_dimension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        App::build(hash_config(&path), |_| None).unwrap();

        let mut config = hash_config(&path);
        config.embedding.dimension = 16;
        let err = App::build(config, |_| None).unwrap_err();
        assert!(err.to_string().contains("32-dimensional"), "{err}");
    }

    #[test]
    fn invalid_config_is_rejected_before_opening() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = hash_config(&dir.path().join("t.db"));
        config.search.result_limit = 0;
        assert!(matches!(
            App::build(config, |_| None),
            Err(TicketRankError::Config(_))
        ));
        assert!(!dir.path().join("t.db").exists());
    }
}
