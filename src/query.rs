use crate::error::Result;
use crate::model::{GraphStats, SearchHit, SymbolLocation};

/// The code-graph query surface shared by every backend.
///
/// Identifiers are element ids. All operations are read-only from the
/// caller's point of view; a backend that talks to a remote engine may fail
/// with transport errors, local backends never do.
pub trait GraphQuery: Send + Sync {
    /// Elements whose body calls `symbol`.
    fn find_callers(&self, symbol: &str) -> Result<Vec<String>>;

    /// Elements called from the body of `symbol`.
    fn find_callees(&self, symbol: &str) -> Result<Vec<String>>;

    /// Files and symbols imported by `file_path`.
    fn get_dependencies(&self, file_path: &str) -> Result<Vec<String>>;

    /// Files importing `file_path`.
    fn get_dependents(&self, file_path: &str) -> Result<Vec<String>>;

    fn get_subclasses(&self, class_name: &str) -> Result<Vec<String>>;

    fn get_superclasses(&self, class_name: &str) -> Result<Vec<String>>;

    /// Shortest path from `source` to `target`; `None` when unreachable.
    fn find_path(&self, source: &str, target: &str) -> Result<Option<Vec<String>>>;

    /// Elements within `max_hops` of `element`, in either direction.
    fn get_related(&self, element: &str, max_hops: usize) -> Result<Vec<String>>;

    /// Keyword search; at most `k` hits, best first.
    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;

    fn get_source(&self, element_id: &str) -> Result<Option<String>>;

    /// Every indexed file path, sorted.
    fn file_tree(&self) -> Result<Vec<String>>;

    fn stats(&self) -> Result<GraphStats>;

    fn resolve_symbol(&self, symbol: &str) -> Result<Vec<SymbolLocation>>;

    fn resolve_module(&self, module_name: &str) -> Result<Option<String>>;

    /// Release any held resources. Idempotent and infallible.
    fn close(&self) {}
}
