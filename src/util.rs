use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path};

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn normalize_rel_path(repo_root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(repo_root).with_context(|| {
        format!(
            "strip prefix {} from {}",
            repo_root.display(),
            path.display()
        )
    })?;
    Ok(normalize_path(rel))
}

pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            _ => {}
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Map a caller-supplied file path onto the repo-relative form used as graph key.
/// Absolute paths under `repo_root` are stripped; anything else is normalised as-is.
pub fn repo_key(repo_root: &Path, raw: &str) -> String {
    let path = Path::new(raw.trim());
    if path.is_absolute() {
        if let Ok(rel) = normalize_rel_path(repo_root, path) {
            return rel;
        }
    }
    normalize_path(path)
}

/// Dotted module path for a repo-relative file path:
/// `pkg/core.py` -> `pkg.core`, `pkg/__init__.py` -> `pkg`, `src/net/mod.rs` -> `src.net`.
pub fn module_path_for(rel_path: &str) -> String {
    let path = Path::new(rel_path);
    let mut parts: Vec<String> = path
        .components()
        .filter_map(|comp| match comp {
            Component::Normal(os) => Some(os.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    let Some(file) = parts.pop() else {
        return String::new();
    };
    let stem = Path::new(&file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&file)
        .to_string();
    if !matches!(stem.as_str(), "__init__" | "mod" | "index") || parts.is_empty() {
        parts.push(stem);
    }
    parts.join(".")
}

/// Deterministic element id: `<kind>_<16 hex chars of blake3>`.
pub fn element_id(kind: &str, rel_path: &str, qualname: &str) -> String {
    let key = format!("{kind}/{rel_path}/{qualname}");
    let hash = blake3::hash(key.as_bytes());
    let hex = hash.to_hex();
    format!("{kind}_{}", &hex[..16])
}

/// Lowercase alphanumeric runs; `_` and punctuation split tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

pub fn truncate_str_bytes(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes.min(value.len());
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }
    Ok(())
}
