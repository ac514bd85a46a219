use crate::indexer::extract::ExtractedFile;
use crate::model::{CodeElement, ElementKind};
use crate::util;
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub mod extract;
pub mod go;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod scan;

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub files: usize,
    pub elements: usize,
    pub errors: usize,
    pub duration_ms: u128,
}

/// Walks a repository and turns every supported source file into code elements.
pub struct Indexer {
    repo_root: PathBuf,
    scan_options: scan::ScanOptions,
    extractors: HashMap<&'static str, Box<dyn extract::LanguageExtractor>>,
}

impl Indexer {
    pub fn new(repo_root: PathBuf) -> Result<Self> {
        Self::new_with_options(repo_root, scan::ScanOptions::default())
    }

    pub fn new_with_options(repo_root: PathBuf, scan_options: scan::ScanOptions) -> Result<Self> {
        let repo_root = std::fs::canonicalize(&repo_root).unwrap_or(repo_root);

        let mut extractors: HashMap<&'static str, Box<dyn extract::LanguageExtractor>> =
            HashMap::new();
        extractors.insert("python", Box::new(python::PythonExtractor::new()?));
        extractors.insert("rust", Box::new(rust::RustExtractor::new()?));
        extractors.insert(
            "javascript",
            Box::new(javascript::JavaScriptExtractor::new(javascript::Dialect::JavaScript)?),
        );
        extractors.insert(
            "typescript",
            Box::new(javascript::JavaScriptExtractor::new(javascript::Dialect::TypeScript)?),
        );
        extractors.insert(
            "tsx",
            Box::new(javascript::JavaScriptExtractor::new(javascript::Dialect::Tsx)?),
        );
        extractors.insert("go", Box::new(go::GoExtractor::new()?));

        Ok(Self {
            repo_root,
            scan_options,
            extractors,
        })
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Full index of the repository: one file element per file followed by
    /// the elements defined in it. Unreadable or unparsable files are logged
    /// and skipped.
    pub fn index(&mut self) -> Result<(Vec<CodeElement>, IndexStats)> {
        let start = Instant::now();
        let files = scan::scan_repo(&self.repo_root, self.scan_options)?;
        let mut stats = IndexStats::default();
        let mut elements = Vec::new();

        for file in files {
            let source = match util::read_to_string(&file.abs_path) {
                Ok(source) => source,
                Err(err) => {
                    tracing::warn!(path = %file.rel_path, "skipping file: {err:#}");
                    stats.errors += 1;
                    continue;
                }
            };
            let Some(extractor) = self.extractors.get_mut(file.language) else {
                continue;
            };
            let extracted = match extractor.extract(&source, &file.rel_path) {
                Ok(extracted) => extracted,
                Err(err) => {
                    tracing::warn!(path = %file.rel_path, "extraction failed: {err:#}");
                    stats.errors += 1;
                    ExtractedFile::default()
                }
            };
            stats.files += 1;
            elements.push(file_element(&file.rel_path, file.language, &source, &extracted));
            elements.extend(extracted.elements);
        }

        stats.elements = elements.len();
        stats.duration_ms = start.elapsed().as_millis();
        tracing::info!(
            repo = %self.repo_root.display(),
            files = stats.files,
            elements = stats.elements,
            errors = stats.errors,
            duration_ms = stats.duration_ms as u64,
            "indexed repository"
        );
        Ok((elements, stats))
    }
}

/// Convenience wrapper for a one-shot index of `repo_root`.
pub fn index_repo(
    repo_root: &Path,
    options: scan::ScanOptions,
) -> Result<(Vec<CodeElement>, IndexStats)> {
    Indexer::new_with_options(repo_root.to_path_buf(), options)?.index()
}

fn file_element(
    rel_path: &str,
    language: &str,
    source: &str,
    extracted: &ExtractedFile,
) -> CodeElement {
    let module = util::module_path_for(rel_path);
    let name = Path::new(rel_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(rel_path)
        .to_string();
    let line_count = source.lines().count().max(1) as i64;
    CodeElement {
        id: util::element_id(ElementKind::File.as_str(), rel_path, &module),
        kind: ElementKind::File,
        name,
        qualname: module,
        rel_path: rel_path.to_string(),
        language: language.to_string(),
        start_line: 1,
        end_line: line_count,
        code: source.to_string(),
        signature: None,
        docstring: extracted.docstring.clone(),
        parent: None,
        calls: Vec::new(),
        bases: Vec::new(),
        imports: extracted.imports.clone(),
    }
}
