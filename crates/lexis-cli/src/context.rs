// crates/lexis-cli/src/context.rs
//
// Wires configuration into a database, tool clients and a LookupPipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lexis_clients::{FileToolClient, FixtureToolClient, HttpToolClient, SubprocessToolClient};
use lexis_core::{LexisError, ToolClient};
use lexis_engine::{Backend, ClientRegistry, EffectIndices, HandlerRegistry, LookupPipeline, Planner};
use lexis_store::Database;

use crate::config::LexisConfig;

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: LexisConfig,
    /// Serve every fetch from this file instead of the real backends.
    pub fixture: Option<PathBuf>,
}

impl AppContext {
    pub fn open_database(&self) -> Result<Database, LexisError> {
        Database::open(&self.config.database_path())
    }

    pub fn indices(&self) -> Result<EffectIndices, LexisError> {
        Ok(EffectIndices::from_database(&self.open_database()?))
    }

    pub fn planner(&self, max_candidates: usize) -> Planner {
        Planner::new(
            self.config
                .planner_config(max_candidates, self.fixture.is_some()),
        )
    }

    pub fn clients(&self) -> Result<ClientRegistry, LexisError> {
        match &self.fixture {
            Some(path) => fixture_clients(path),
            None => backend_clients(&self.config),
        }
    }

    pub fn pipeline(&self, max_candidates: usize, no_cache: bool) -> Result<LookupPipeline, LexisError> {
        let pipeline = LookupPipeline::new(
            self.planner(max_candidates),
            self.clients()?,
            HandlerRegistry::standard(),
            self.indices()?,
        )
        .with_options(self.config.execution_options(no_cache));
        Ok(pipeline)
    }
}

fn fixture_clients(path: &Path) -> Result<ClientRegistry, LexisError> {
    let client: Arc<dyn ToolClient> = Arc::new(FixtureToolClient::from_file(path)?);
    tracing::info!("Serving all fetches from fixture {}", path.display());
    Ok(Backend::ALL
        .iter()
        .fold(ClientRegistry::new(), |registry, backend| {
            registry.with(backend.fetch_tool(), client.clone())
        }))
}

fn backend_clients(config: &LexisConfig) -> Result<ClientRegistry, LexisError> {
    let http: Arc<dyn ToolClient> = Arc::new(HttpToolClient::get(config.http_timeout())?);
    let mut words = SubprocessToolClient::new(config.subprocess_timeout());
    if let Some(dir) = config.whitakers_dir() {
        words = words.with_working_dir(dir);
    }
    let registry = ClientRegistry::new()
        .with(Backend::Diogenes.fetch_tool(), http.clone())
        .with(Backend::Heritage.fetch_tool(), http)
        .with(Backend::Whitakers.fetch_tool(), Arc::new(words))
        .with(Backend::Cdsl.fetch_tool(), Arc::new(FileToolClient::new()));
    tracing::debug!("Tool clients: {:?}", registry);
    Ok(registry)
}
