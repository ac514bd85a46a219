use crate::error::{GraphError, Result};
use crate::graph::CodeGraph;
use crate::indexer::{self, scan::ScanOptions};
use crate::model::{CodeElement, GraphStats, SearchHit, SymbolLocation};
use crate::query::GraphQuery;
use crate::search::Bm25Index;
use crate::snapshot::{self, Snapshot};
use crate::vector::VectorIndex;
use std::path::{Path, PathBuf};

/// In-process index of one repository: code graph, keyword index and
/// optional embeddings. Backs both the snapshot and the fresh-index tiers.
#[derive(Debug)]
pub struct LocalIndex {
    repo_root: PathBuf,
    repo_name: String,
    graph: CodeGraph,
    bm25: Bm25Index,
    vectors: VectorIndex,
}

impl LocalIndex {
    /// Walks and parses `repo_root` from scratch.
    pub fn build(repo_root: &Path, options: ScanOptions) -> Result<Self> {
        let (elements, stats) = indexer::index_repo(repo_root, options)?;
        let root = std::fs::canonicalize(repo_root).unwrap_or_else(|_| repo_root.to_path_buf());
        tracing::debug!(files = stats.files, errors = stats.errors, "fresh index ready");
        Ok(Self::from_elements(&root, repo_name_for(&root), elements))
    }

    /// Rebuilds an index from a snapshot file without reading the tree.
    pub fn from_snapshot(repo_root: &Path, path: &Path) -> Result<Self> {
        let Snapshot {
            repo_name,
            elements,
            embeddings,
        } = snapshot::load(path)?;
        let root = std::fs::canonicalize(repo_root).unwrap_or_else(|_| repo_root.to_path_buf());
        let mut index = Self::from_elements(&root, repo_name, elements);
        if !embeddings.is_empty() {
            let (ids, vectors): (Vec<String>, Vec<Vec<f32>>) = embeddings.into_iter().unzip();
            index
                .vectors
                .add(&ids, &vectors)
                .map_err(|err| GraphError::snapshot(path, format!("{err:#}")))?;
        }
        tracing::debug!(path = %path.display(), "loaded snapshot");
        Ok(index)
    }

    pub fn from_elements(
        repo_root: &Path,
        repo_name: impl Into<String>,
        elements: Vec<CodeElement>,
    ) -> Self {
        let bm25 = Bm25Index::from_elements(&elements);
        let graph = CodeGraph::from_elements(elements);
        Self {
            repo_root: repo_root.to_path_buf(),
            repo_name: repo_name.into(),
            graph,
            bm25,
            vectors: VectorIndex::new(),
        }
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            repo_name: self.repo_name.clone(),
            elements: self.graph.elements().cloned().collect(),
            embeddings: self
                .graph
                .elements()
                .filter_map(|element| {
                    self.vectors
                        .vector(&element.id)
                        .map(|vector| (element.id.clone(), vector.to_vec()))
                })
                .collect(),
        };
        snapshot::save(path, &snapshot)?;
        Ok(())
    }

    /// Attaches one embedding per element id. Ids must name indexed elements.
    pub fn add_embeddings(&mut self, ids: &[String], vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(unknown) = ids.iter().find(|id| self.graph.element(id).is_none()) {
            return Err(anyhow::anyhow!("unknown element id: {unknown}").into());
        }
        self.vectors.add(ids, vectors)?;
        Ok(())
    }

    pub fn search_by_vector(&self, vector: &[f32], k: usize) -> Vec<SearchHit> {
        self.vectors.search(vector, k)
    }

    pub fn has_vectors(&self) -> bool {
        !self.vectors.is_empty()
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn graph(&self) -> &CodeGraph {
        &self.graph
    }

    pub fn elements(&self) -> impl Iterator<Item = &CodeElement> {
        self.graph.elements()
    }
}

fn repo_name_for(root: &Path) -> String {
    root.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("repo")
        .to_string()
}

impl GraphQuery for LocalIndex {
    fn find_callers(&self, symbol: &str) -> Result<Vec<String>> {
        Ok(self.graph.find_callers(symbol))
    }

    fn find_callees(&self, symbol: &str) -> Result<Vec<String>> {
        Ok(self.graph.find_callees(symbol))
    }

    fn get_dependencies(&self, file_path: &str) -> Result<Vec<String>> {
        Ok(self.graph.get_dependencies(&self.repo_root, file_path))
    }

    fn get_dependents(&self, file_path: &str) -> Result<Vec<String>> {
        Ok(self.graph.get_dependents(&self.repo_root, file_path))
    }

    fn get_subclasses(&self, class_name: &str) -> Result<Vec<String>> {
        Ok(self.graph.get_subclasses(class_name))
    }

    fn get_superclasses(&self, class_name: &str) -> Result<Vec<String>> {
        Ok(self.graph.get_superclasses(class_name))
    }

    fn find_path(&self, source: &str, target: &str) -> Result<Option<Vec<String>>> {
        Ok(self.graph.find_path(source, target))
    }

    fn get_related(&self, element: &str, max_hops: usize) -> Result<Vec<String>> {
        Ok(self.graph.get_related(element, max_hops))
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.bm25.search(query, k))
    }

    fn get_source(&self, element_id: &str) -> Result<Option<String>> {
        Ok(self.graph.get_source(element_id))
    }

    fn file_tree(&self) -> Result<Vec<String>> {
        Ok(self.graph.file_tree())
    }

    fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            files: self.graph.file_count(),
            elements: self.graph.node_count(),
            bm25_docs: self.bm25.len(),
            has_vectors: self.has_vectors(),
        })
    }

    fn resolve_symbol(&self, symbol: &str) -> Result<Vec<SymbolLocation>> {
        Ok(self.graph.resolve_symbol(symbol))
    }

    fn resolve_module(&self, module_name: &str) -> Result<Option<String>> {
        Ok(self.graph.resolve_module(module_name))
    }
}
