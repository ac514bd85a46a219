use crate::model::{CodeElement, ElementKind, ImportRef, SymbolLocation};
use crate::util;
use petgraph::Direction;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// file -> element, container -> member
    Defines,
    /// file -> file, file -> imported symbol
    Imports,
    /// function/method -> callee
    Calls,
    /// type -> base type
    Inherits,
}

/// Code elements and the relations between them.
///
/// Built once from a flat element list; queries address elements by id, by
/// name, or (for files) by repo-relative path or module path.
#[derive(Debug, Default)]
pub struct CodeGraph {
    graph: DiGraph<CodeElement, EdgeKind>,
    id_to_node: HashMap<String, NodeIndex>,
    name_to_nodes: HashMap<String, Vec<NodeIndex>>,
    file_to_node: BTreeMap<String, NodeIndex>,
    module_to_file: BTreeMap<String, String>,
    edge_set: HashSet<(NodeIndex, NodeIndex, EdgeKind)>,
}

impl CodeGraph {
    pub fn from_elements(elements: Vec<CodeElement>) -> Self {
        let mut graph = Self::default();
        for element in elements {
            graph.add_element(element);
        }
        graph.link_definitions();
        let imported = graph.link_imports();
        graph.link_calls(&imported);
        graph.link_inheritance(&imported);
        tracing::debug!(
            nodes = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            "built code graph"
        );
        graph
    }

    fn add_element(&mut self, element: CodeElement) {
        if self.id_to_node.contains_key(&element.id) {
            return;
        }
        let id = element.id.clone();
        let name = element.name.clone();
        let kind = element.kind;
        let rel_path = element.rel_path.clone();
        let node = self.graph.add_node(element);
        self.id_to_node.insert(id, node);
        if kind == ElementKind::File {
            self.module_to_file
                .entry(util::module_path_for(&rel_path))
                .or_insert_with(|| rel_path.clone());
            self.file_to_node.entry(rel_path).or_insert(node);
        } else {
            self.name_to_nodes.entry(name).or_default().push(node);
        }
    }

    fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, kind: EdgeKind) {
        if self.edge_set.insert((source, target, kind)) {
            self.graph.add_edge(source, target, kind);
        }
    }

    fn link_definitions(&mut self) {
        let mut edges = Vec::new();
        for node in self.graph.node_indices() {
            let element = &self.graph[node];
            if element.kind == ElementKind::File {
                continue;
            }
            let owner = element
                .parent
                .as_ref()
                .and_then(|parent| self.id_to_node.get(parent))
                .or_else(|| self.file_to_node.get(&element.rel_path));
            if let Some(&owner) = owner {
                edges.push((owner, node));
            }
        }
        for (owner, node) in edges {
            self.add_edge(owner, node, EdgeKind::Defines);
        }
    }

    /// Adds import edges and returns, per file, the set of files it imports.
    fn link_imports(&mut self) -> HashMap<String, HashSet<String>> {
        let mut imported: HashMap<String, HashSet<String>> = HashMap::new();
        let mut edges = Vec::new();
        for (rel_path, &file_node) in &self.file_to_node {
            for import in &self.graph[file_node].imports {
                for (target_file, symbol) in self.resolve_import(rel_path, import) {
                    let Some(&target_node) = self.file_to_node.get(&target_file) else {
                        continue;
                    };
                    if target_node == file_node {
                        continue;
                    }
                    edges.push((file_node, target_node));
                    if let Some(symbol) = symbol.and_then(|s| self.top_level(&target_file, &s)) {
                        edges.push((file_node, symbol));
                    }
                    imported
                        .entry(rel_path.clone())
                        .or_default()
                        .insert(target_file);
                }
            }
        }
        for (source, target) in edges {
            self.add_edge(source, target, EdgeKind::Imports);
        }
        imported
    }

    fn link_calls(&mut self, imported: &HashMap<String, HashSet<String>>) {
        let mut edges = Vec::new();
        for node in self.graph.node_indices() {
            let element = &self.graph[node];
            if !element.kind.is_callable() {
                continue;
            }
            for call in &element.calls {
                let target = self.pick_candidate(call, &element.rel_path, imported, |kind| {
                    kind.is_callable() || kind.is_type()
                });
                if let Some(target) = target {
                    edges.push((node, target));
                }
            }
        }
        for (source, target) in edges {
            self.add_edge(source, target, EdgeKind::Calls);
        }
    }

    fn link_inheritance(&mut self, imported: &HashMap<String, HashSet<String>>) {
        let mut edges = Vec::new();
        for node in self.graph.node_indices() {
            let element = &self.graph[node];
            if !element.kind.is_type() {
                continue;
            }
            for base in &element.bases {
                let target =
                    self.pick_candidate(base, &element.rel_path, imported, |kind| kind.is_type());
                if let Some(target) = target.filter(|target| *target != node) {
                    edges.push((node, target));
                }
            }
        }
        for (source, target) in edges {
            self.add_edge(source, target, EdgeKind::Inherits);
        }
    }

    /// Same file first, then files imported by `rel_path`, then the first
    /// element with that name anywhere.
    fn pick_candidate(
        &self,
        name: &str,
        rel_path: &str,
        imported: &HashMap<String, HashSet<String>>,
        accept: impl Fn(ElementKind) -> bool,
    ) -> Option<NodeIndex> {
        let candidates: Vec<NodeIndex> = self
            .name_to_nodes
            .get(name)?
            .iter()
            .copied()
            .filter(|node| accept(self.graph[*node].kind))
            .collect();
        if let Some(node) = candidates
            .iter()
            .find(|node| self.graph[**node].rel_path == rel_path)
        {
            return Some(*node);
        }
        if let Some(files) = imported.get(rel_path) {
            if let Some(node) = candidates
                .iter()
                .find(|node| files.contains(&self.graph[**node].rel_path))
            {
                return Some(*node);
            }
        }
        candidates.first().copied()
    }

    fn top_level(&self, rel_path: &str, name: &str) -> Option<NodeIndex> {
        self.name_to_nodes.get(name)?.iter().copied().find(|node| {
            let element = &self.graph[*node];
            element.rel_path == rel_path && element.parent.is_none()
        })
    }

    /// Files an import refers to, each with the imported symbol name to link
    /// (when the name is not itself a module).
    fn resolve_import(&self, from: &str, import: &ImportRef) -> Vec<(String, Option<String>)> {
        let Some(base) = absolute_module(from, import) else {
            return Vec::new();
        };
        let mut targets = Vec::new();
        let mut module_resolved = false;
        for name in &import.names {
            if name == "*" || name == "default" {
                continue;
            }
            if let Some(file) = self.exact_or_suffix(&join_module(&base, name)) {
                targets.push((file, None));
                continue;
            }
            for file in self.resolve_module_path(&base) {
                targets.push((file, Some(name.clone())));
                module_resolved = true;
            }
        }
        if !module_resolved {
            for file in self.resolve_module_path(&base) {
                if !targets.iter().any(|(existing, _)| *existing == file) {
                    targets.push((file, None));
                }
            }
        }
        targets
    }

    /// Exact module path, then a module path ending in `.module`, then the
    /// parent module; finally every file of the package directory sharing the
    /// longest trailing run of segments with `module` (Go import paths).
    pub fn resolve_module_path(&self, module: &str) -> Vec<String> {
        let module = module.trim().trim_matches('.');
        if module.is_empty() {
            return Vec::new();
        }
        if let Some(file) = self.exact_or_suffix(module) {
            return vec![file];
        }
        if let Some((parent, _)) = module.rsplit_once('.') {
            if let Some(file) = self.exact_or_suffix(parent) {
                return vec![file];
            }
        }
        package_dir_files(&self.module_to_file, module)
    }

    fn exact_or_suffix(&self, module: &str) -> Option<String> {
        if let Some(file) = self.module_to_file.get(module) {
            return Some(file.clone());
        }
        let suffix = format!(".{module}");
        self.module_to_file
            .iter()
            .filter(|(path, _)| path.ends_with(&suffix))
            .min_by_key(|(path, _)| path.len())
            .map(|(_, file)| file.clone())
    }

    /// Nodes addressed by `key`: an element id, an element name, or a file
    /// path / module path.
    fn lookup(&self, key: &str) -> Vec<NodeIndex> {
        if let Some(node) = self.id_to_node.get(key) {
            return vec![*node];
        }
        if let Some(nodes) = self.name_to_nodes.get(key) {
            return nodes.clone();
        }
        self.file_node(key)
            .or_else(|| {
                self.module_to_file
                    .get(key)
                    .and_then(|file| self.file_to_node.get(file).copied())
            })
            .into_iter()
            .collect()
    }

    fn file_node(&self, raw: &str) -> Option<NodeIndex> {
        self.file_to_node
            .get(&util::normalize_path(Path::new(raw.trim())))
            .copied()
    }

    /// File node for a path that may be absolute under `repo_root`.
    fn file_node_under(&self, repo_root: &Path, raw: &str) -> Option<NodeIndex> {
        self.file_to_node
            .get(&util::repo_key(repo_root, raw))
            .copied()
            .or_else(|| self.file_node(raw))
    }

    fn neighbors_by(
        &self,
        nodes: &[NodeIndex],
        direction: Direction,
        kind: EdgeKind,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for &node in nodes {
            for edge in self.graph.edges_directed(node, direction) {
                if *edge.weight() != kind {
                    continue;
                }
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                if seen.insert(other) {
                    found.push(other);
                }
            }
        }
        self.ids_in_source_order(found)
    }

    fn ids_in_source_order(&self, mut nodes: Vec<NodeIndex>) -> Vec<String> {
        nodes.sort_by(|a, b| {
            let (a, b) = (&self.graph[*a], &self.graph[*b]);
            (&a.rel_path, a.start_line, &a.id).cmp(&(&b.rel_path, b.start_line, &b.id))
        });
        nodes.into_iter().map(|node| self.graph[node].id.clone()).collect()
    }

    pub fn find_callers(&self, symbol: &str) -> Vec<String> {
        self.neighbors_by(&self.lookup(symbol), Direction::Incoming, EdgeKind::Calls)
    }

    pub fn find_callees(&self, symbol: &str) -> Vec<String> {
        self.neighbors_by(&self.lookup(symbol), Direction::Outgoing, EdgeKind::Calls)
    }

    pub fn get_dependencies(&self, repo_root: &Path, file_path: &str) -> Vec<String> {
        let nodes: Vec<NodeIndex> = self
            .file_node_under(repo_root, file_path)
            .into_iter()
            .collect();
        self.neighbors_by(&nodes, Direction::Outgoing, EdgeKind::Imports)
    }

    /// Files importing `file_path` or any symbol defined in it.
    pub fn get_dependents(&self, repo_root: &Path, file_path: &str) -> Vec<String> {
        let Some(file) = self.file_node_under(repo_root, file_path) else {
            return Vec::new();
        };
        let rel_path = self.graph[file].rel_path.clone();
        let mut targets = vec![file];
        targets.extend(
            self.graph
                .node_indices()
                .filter(|node| *node != file && self.graph[*node].rel_path == rel_path),
        );
        self.neighbors_by(&targets, Direction::Incoming, EdgeKind::Imports)
    }

    pub fn get_subclasses(&self, class_name: &str) -> Vec<String> {
        let nodes = self.type_nodes(class_name);
        self.neighbors_by(&nodes, Direction::Incoming, EdgeKind::Inherits)
    }

    pub fn get_superclasses(&self, class_name: &str) -> Vec<String> {
        let nodes = self.type_nodes(class_name);
        self.neighbors_by(&nodes, Direction::Outgoing, EdgeKind::Inherits)
    }

    fn type_nodes(&self, key: &str) -> Vec<NodeIndex> {
        self.lookup(key)
            .into_iter()
            .filter(|node| self.graph[*node].kind.is_type())
            .collect()
    }

    /// Shortest path along outgoing edges of any kind. `None` when either end
    /// is unknown or no path exists.
    pub fn find_path(&self, source: &str, target: &str) -> Option<Vec<String>> {
        let sources = self.lookup(source);
        let targets: HashSet<NodeIndex> = self.lookup(target).into_iter().collect();
        if sources.is_empty() || targets.is_empty() {
            return None;
        }
        let mut best: Option<(usize, Vec<NodeIndex>)> = None;
        for start in sources {
            let found = astar(
                &self.graph,
                start,
                |node| targets.contains(&node),
                |_| 1usize,
                |_| 0,
            );
            if let Some((cost, path)) = found {
                if best.as_ref().is_none_or(|(best_cost, _)| cost < *best_cost) {
                    best = Some((cost, path));
                }
            }
        }
        best.map(|(_, path)| {
            path.into_iter()
                .map(|node| self.graph[node].id.clone())
                .collect()
        })
    }

    /// Everything within `max_hops` edges in either direction, in discovery
    /// order, excluding the starting elements.
    pub fn get_related(&self, element: &str, max_hops: usize) -> Vec<String> {
        let origins = self.lookup(element);
        let mut visited: HashSet<NodeIndex> = origins.iter().copied().collect();
        let mut queue: VecDeque<(NodeIndex, usize)> =
            origins.iter().map(|node| (*node, 0)).collect();
        let mut related = Vec::new();
        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_hops {
                continue;
            }
            let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_undirected(node).collect();
            neighbors.sort();
            for neighbor in neighbors {
                if visited.insert(neighbor) {
                    related.push(self.graph[neighbor].id.clone());
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        related
    }

    pub fn get_source(&self, element_id: &str) -> Option<String> {
        self.id_to_node
            .get(element_id)
            .map(|node| self.graph[*node].code.clone())
    }

    pub fn file_tree(&self) -> Vec<String> {
        self.file_to_node.keys().cloned().collect()
    }

    /// Files defining an element called `symbol`, with their module paths.
    pub fn resolve_symbol(&self, symbol: &str) -> Vec<SymbolLocation> {
        let mut locations: Vec<SymbolLocation> = self
            .name_to_nodes
            .get(symbol)
            .into_iter()
            .flatten()
            .map(|node| {
                let rel_path = &self.graph[*node].rel_path;
                (rel_path.clone(), util::module_path_for(rel_path))
            })
            .collect();
        locations.sort();
        locations.dedup();
        locations
    }

    pub fn resolve_module(&self, module_name: &str) -> Option<String> {
        self.resolve_module_path(module_name).into_iter().next()
    }

    pub fn element(&self, id: &str) -> Option<&CodeElement> {
        self.id_to_node.get(id).map(|node| &self.graph[*node])
    }

    pub fn elements(&self) -> impl Iterator<Item = &CodeElement> {
        self.graph.node_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn file_count(&self) -> usize {
        self.file_to_node.len()
    }
}

/// Dotted module an import points at, with relative levels applied against
/// the importing file's directory (level 1 is that directory).
fn absolute_module(from: &str, import: &ImportRef) -> Option<String> {
    let module = import.module.trim_matches('.');
    if import.level == 0 {
        return Some(module.to_string());
    }
    let mut dir: Vec<&str> = from.split('/').collect();
    dir.pop();
    let climb = import.level as usize - 1;
    if climb > dir.len() {
        return None;
    }
    dir.truncate(dir.len() - climb);
    let mut parts: Vec<&str> = dir;
    parts.extend(module.split('.').filter(|part| !part.is_empty()));
    Some(parts.join("."))
}

fn package_dir_files(modules: &BTreeMap<String, String>, module: &str) -> Vec<String> {
    let wanted: Vec<&str> = module.split('.').collect();
    let mut best = 0;
    let mut files = Vec::new();
    for (path, file) in modules {
        let Some((dir, _)) = path.rsplit_once('.') else {
            continue;
        };
        let shared = dir
            .split('.')
            .rev()
            .zip(wanted.iter().rev())
            .take_while(|(have, want)| have == *want)
            .count();
        if shared == 0 || shared < best {
            continue;
        }
        if shared > best {
            best = shared;
            files.clear();
        }
        files.push(file.clone());
    }
    files
}

fn join_module(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}.{name}")
    }
}
