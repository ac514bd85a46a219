//! Picks which graph backend answers queries for a repository.
//!
//! Tiers are tried in order: a live indexing engine over graph RPC, a saved
//! snapshot, then a fresh index of the working tree. Only availability
//! failures of the live tier cause a fall-through; a broken snapshot is
//! reported to the caller.

use crate::config::Config;
use crate::error::{GraphError, Result};
use crate::indexer::scan::ScanOptions;
use crate::local::LocalIndex;
use crate::model::{Endpoint, GraphStats, SearchHit, SymbolLocation};
use crate::query::GraphQuery;
use crate::rpc::{Connector, RpcClient, TcpConnector};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// The tier a resolved backend came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    LiveRpc { endpoint: Endpoint },
    Snapshot { repo: PathBuf, path: PathBuf },
    FreshIndex { repo: PathBuf },
}

impl BackendChoice {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LiveRpc { .. } => "live_rpc",
            Self::Snapshot { .. } => "snapshot",
            Self::FreshIndex { .. } => "fresh_index",
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LiveRpc { endpoint } => write!(f, "live_rpc({endpoint})"),
            Self::Snapshot { path, .. } => write!(f, "snapshot({})", path.display()),
            Self::FreshIndex { repo } => write!(f, "fresh_index({})", repo.display()),
        }
    }
}

/// Inputs for one resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub repo: PathBuf,
    /// `host:port` of a live engine; only used together with `token`.
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub snapshot: Option<PathBuf>,
    pub no_ignore: bool,
}

impl ResolveRequest {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            ..Self::default()
        }
    }

    pub fn endpoint(mut self, addr: impl Into<String>, token: impl Into<String>) -> Self {
        self.endpoint = Some(addr.into());
        self.token = Some(token.into());
        self
    }

    pub fn snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(path.into());
        self
    }
}

/// Builds the in-process backends.
pub trait LocalLoader: Send + Sync {
    fn load_snapshot(&self, repo: &Path, snapshot: &Path) -> Result<Box<dyn GraphQuery>>;

    fn build_fresh(&self, repo: &Path, options: ScanOptions) -> Result<Box<dyn GraphQuery>>;
}

/// `LocalIndex`-backed loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexLoader;

impl LocalLoader for IndexLoader {
    fn load_snapshot(&self, repo: &Path, snapshot: &Path) -> Result<Box<dyn GraphQuery>> {
        Ok(Box::new(LocalIndex::from_snapshot(repo, snapshot)?))
    }

    fn build_fresh(&self, repo: &Path, options: ScanOptions) -> Result<Box<dyn GraphQuery>> {
        Ok(Box::new(LocalIndex::build(repo, options)?))
    }
}

pub struct Resolver {
    connector: Arc<dyn Connector>,
    loader: Arc<dyn LocalLoader>,
    timeout: Duration,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            connector: Arc::new(TcpConnector),
            loader: Arc::new(IndexLoader),
            timeout: Config::get().rpc_timeout(),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn LocalLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves exactly one backend for `request`.
    pub fn resolve(&self, request: &ResolveRequest) -> Result<Backend> {
        let mut fallback_reason = None;

        if let (Some(addr), Some(token)) = (&request.endpoint, &request.token) {
            match self.try_live(addr, token) {
                Ok(backend) => {
                    tracing::info!(backend = %backend.choice(), "resolved graph backend");
                    return Ok(backend);
                }
                Err(err) if falls_through(&err) => {
                    tracing::warn!(
                        endpoint = %addr,
                        error = %err,
                        "live graph RPC unavailable, falling back"
                    );
                    fallback_reason = Some(err.to_string());
                }
                Err(err) => return Err(err),
            }
        }

        let backend = match &request.snapshot {
            Some(path) => Backend {
                query: self.loader.load_snapshot(&request.repo, path)?,
                choice: BackendChoice::Snapshot {
                    repo: request.repo.clone(),
                    path: path.clone(),
                },
                fallback_reason,
            },
            None => Backend {
                query: self
                    .loader
                    .build_fresh(&request.repo, ScanOptions::new(request.no_ignore))?,
                choice: BackendChoice::FreshIndex {
                    repo: request.repo.clone(),
                },
                fallback_reason,
            },
        };
        tracing::info!(backend = %backend.choice(), "resolved graph backend");
        Ok(backend)
    }

    /// Connects and verifies with `stats`; the client is dropped (and its
    /// connection closed) on failure.
    fn try_live(&self, addr: &str, token: &str) -> Result<Backend> {
        let endpoint = Endpoint::parse(addr, token)?;
        let client =
            RpcClient::with_connector(endpoint.clone(), self.timeout, self.connector.clone());
        let stats = client.stats()?;
        tracing::debug!(endpoint = %endpoint, nodes = stats.nodes, "live graph RPC verified");
        Ok(Backend {
            choice: BackendChoice::LiveRpc { endpoint },
            query: Box::new(client),
            fallback_reason: None,
        })
    }
}

/// Failures that mean "the live tier is unusable" rather than a data error.
fn falls_through(err: &GraphError) -> bool {
    match err {
        GraphError::Connection(_)
        | GraphError::ConnectionClosed
        | GraphError::Remote(_)
        | GraphError::Protocol(_)
        | GraphError::InvalidEndpoint(_) => true,
        GraphError::Snapshot { .. } | GraphError::Index(_) => false,
    }
}

/// Resolves with the default TCP connector and `LocalIndex` loader.
pub fn resolve(request: &ResolveRequest) -> Result<Backend> {
    Resolver::new().resolve(request)
}

/// A resolved backend. The choice is fixed for its lifetime; dropping it
/// closes any live connection.
pub struct Backend {
    choice: BackendChoice,
    query: Box<dyn GraphQuery>,
    fallback_reason: Option<String>,
}

impl Backend {
    pub fn choice(&self) -> &BackendChoice {
        &self.choice
    }

    /// Why the live tier was skipped, when it was requested and failed.
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn query(&self) -> &dyn GraphQuery {
        self.query.as_ref()
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("choice", &self.choice)
            .field("fallback_reason", &self.fallback_reason)
            .finish_non_exhaustive()
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.query.close();
    }
}

impl GraphQuery for Backend {
    fn find_callers(&self, symbol: &str) -> Result<Vec<String>> {
        self.query.find_callers(symbol)
    }

    fn find_callees(&self, symbol: &str) -> Result<Vec<String>> {
        self.query.find_callees(symbol)
    }

    fn get_dependencies(&self, file_path: &str) -> Result<Vec<String>> {
        self.query.get_dependencies(file_path)
    }

    fn get_dependents(&self, file_path: &str) -> Result<Vec<String>> {
        self.query.get_dependents(file_path)
    }

    fn get_subclasses(&self, class_name: &str) -> Result<Vec<String>> {
        self.query.get_subclasses(class_name)
    }

    fn get_superclasses(&self, class_name: &str) -> Result<Vec<String>> {
        self.query.get_superclasses(class_name)
    }

    fn find_path(&self, source: &str, target: &str) -> Result<Option<Vec<String>>> {
        self.query.find_path(source, target)
    }

    fn get_related(&self, element: &str, max_hops: usize) -> Result<Vec<String>> {
        self.query.get_related(element, max_hops)
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.query.search(query, k)
    }

    fn get_source(&self, element_id: &str) -> Result<Option<String>> {
        self.query.get_source(element_id)
    }

    fn file_tree(&self) -> Result<Vec<String>> {
        self.query.file_tree()
    }

    fn stats(&self) -> Result<GraphStats> {
        self.query.stats()
    }

    fn resolve_symbol(&self, symbol: &str) -> Result<Vec<SymbolLocation>> {
        self.query.resolve_symbol(symbol)
    }

    fn resolve_module(&self, module_name: &str) -> Result<Option<String>> {
        self.query.resolve_module(module_name)
    }

    fn close(&self) {
        self.query.close();
    }
}
