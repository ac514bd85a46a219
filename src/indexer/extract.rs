use crate::model::{CodeElement, ElementKind, ImportRef};
use crate::util;
use anyhow::Result;
use tree_sitter::Node;

pub trait LanguageExtractor {
    fn extract(&mut self, source: &str, rel_path: &str) -> Result<ExtractedFile>;
}

/// Everything a language extractor reports for one file, except the file
/// element itself (the indexer builds that).
#[derive(Debug, Default)]
pub struct ExtractedFile {
    pub elements: Vec<CodeElement>,
    pub imports: Vec<ImportRef>,
    pub docstring: Option<String>,
}

/// An enclosing class, struct or interface while walking a file.
#[derive(Debug, Clone)]
pub struct Container {
    pub name: String,
    pub id: String,
}

/// Per-file naming context shared by the extractors.
pub struct FileScope<'a> {
    pub rel_path: &'a str,
    pub module: String,
    pub language: &'static str,
    pub source: &'a str,
}

impl<'a> FileScope<'a> {
    pub fn new(rel_path: &'a str, language: &'static str, source: &'a str) -> Self {
        Self {
            rel_path,
            module: util::module_path_for(rel_path),
            language,
            source,
        }
    }

    /// `module.Outer.Inner.name`
    pub fn qualname(&self, prefix: &[String], name: &str) -> String {
        let mut parts = Vec::with_capacity(prefix.len() + 2);
        if !self.module.is_empty() {
            parts.push(self.module.as_str());
        }
        parts.extend(prefix.iter().map(String::as_str));
        parts.push(name);
        parts.join(".")
    }

    pub fn element(
        &self,
        kind: ElementKind,
        name: &str,
        qualname: String,
        node: Node<'_>,
        parent: Option<&Container>,
    ) -> CodeElement {
        let (start_line, end_line) = line_span(node);
        CodeElement {
            id: util::element_id(kind.as_str(), self.rel_path, &qualname),
            kind,
            name: name.to_string(),
            qualname,
            rel_path: self.rel_path.to_string(),
            language: self.language.to_string(),
            start_line,
            end_line,
            code: raw_text(node, self.source).to_string(),
            signature: None,
            docstring: None,
            parent: parent.map(|container| container.id.clone()),
            calls: Vec::new(),
            bases: Vec::new(),
            imports: Vec::new(),
        }
    }
}

pub fn raw_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

pub fn node_text(node: Node<'_>, source: &str) -> String {
    raw_text(node, source).trim().to_string()
}

/// 1-based inclusive line range.
pub fn line_span(node: Node<'_>) -> (i64, i64) {
    (
        node.start_position().row as i64 + 1,
        node.end_position().row as i64 + 1,
    )
}

pub fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Callee names under `node`, in source order, without duplicates.
///
/// `callee` maps a call node to the bare name being called; returning `None`
/// skips the call. Subtrees whose kind is in `stop_at` are not entered.
pub fn collect_calls(
    node: Node<'_>,
    source: &str,
    call_kind: &str,
    stop_at: &[&str],
    callee: &dyn Fn(Node<'_>, &str) -> Option<String>,
) -> Vec<String> {
    let mut calls = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == call_kind {
            if let Some(name) = callee(current, source) {
                push_unique(&mut calls, name);
            }
        }
        let mut cursor = current.walk();
        let children: Vec<Node<'_>> = current.named_children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            if !stop_at.contains(&child.kind()) {
                stack.push(child);
            }
        }
    }
    calls
}

/// Last segment of a dotted / scoped name with generics stripped:
/// `pkg.Base` -> `Base`, `Vec<T>` -> `Vec`, `crate::a::Trait` -> `Trait`.
pub fn last_segment(raw: &str) -> String {
    let mut depth = 0usize;
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '<' | '[' | '(' => depth += 1,
            '>' | ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => cleaned.push(ch),
            _ => {}
        }
    }
    let cleaned = cleaned.trim().trim_start_matches(['*', '&']);
    cleaned
        .rsplit(['.', ':'])
        .find(|part| !part.is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Split a relative path specifier (`./a/b`, `../c`, `pkg/d`) into an import
/// level and a dotted module. Extensions on the last segment are dropped.
pub fn path_import(spec: &str) -> ImportRef {
    let mut level = 0u32;
    let mut segments = Vec::new();
    for (idx, part) in spec.split('/').enumerate() {
        match part {
            "." if idx == 0 => level = 1,
            ".." => level = if level == 0 { 2 } else { level + 1 },
            "" | "." => {}
            other => segments.push(other.to_string()),
        }
    }
    if let Some(last) = segments.last_mut() {
        for ext in [".js", ".jsx", ".mjs", ".cjs", ".ts", ".tsx", ".mts", ".cts"] {
            if let Some(stem) = last.strip_suffix(ext) {
                *last = stem.to_string();
                break;
            }
        }
        if last == "index" && segments.len() > 1 {
            segments.pop();
        }
    }
    ImportRef {
        module: segments.join("."),
        names: Vec::new(),
        level,
    }
}
