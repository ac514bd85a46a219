use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub language: &'static str,
}

#[derive(Debug, Clone)]
pub struct LanguageSpec {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub no_ignore: bool,
    pub max_file_bytes: u64,
}

impl ScanOptions {
    pub fn new(no_ignore: bool) -> Self {
        Self {
            no_ignore,
            ..Self::default()
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            no_ignore: false,
            max_file_bytes: crate::config::Config::get().max_file_bytes,
        }
    }
}

static LANGUAGE_SPECS: &[LanguageSpec] = &[
    LanguageSpec {
        name: "python",
        extensions: &["py", "pyi"],
    },
    LanguageSpec {
        name: "rust",
        extensions: &["rs"],
    },
    LanguageSpec {
        name: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs"],
    },
    LanguageSpec {
        name: "typescript",
        extensions: &["ts", "mts", "cts"],
    },
    LanguageSpec {
        name: "tsx",
        extensions: &["tsx"],
    },
    LanguageSpec {
        name: "go",
        extensions: &["go"],
    },
];

/// Walk `repo_root` and return every file in a supported language, sorted by
/// relative path.
pub fn scan_repo(repo_root: &Path, options: ScanOptions) -> Result<Vec<ScannedFile>> {
    let mut files = Vec::new();
    let mut builder = WalkBuilder::new(repo_root);
    if options.no_ignore {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    } else {
        builder
            .ignore(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .require_git(false);
    }
    let walker = builder
        .hidden(false)
        .filter_entry(|entry| !is_ignored_entry(entry))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let Some(language) = language_for_path(path) else {
            continue;
        };
        let size = fs::metadata(path)
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        if size > options.max_file_bytes {
            tracing::debug!(path = %path.display(), size, "skipping oversized file");
            continue;
        }
        let rel_path = crate::util::normalize_rel_path(repo_root, path)?;
        files.push(ScannedFile {
            rel_path,
            abs_path: path.to_path_buf(),
            language,
        });
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn is_ignored_entry(entry: &ignore::DirEntry) -> bool {
    match entry.file_name() {
        name if name == OsStr::new(".repograph") => true,
        name if name == OsStr::new(".git") => true,
        _ => false,
    }
}

pub fn language_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|ext| ext.to_str())?;
    LANGUAGE_SPECS
        .iter()
        .find(|spec| spec.extensions.contains(&ext))
        .map(|spec| spec.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_supported_extensions() {
        assert_eq!(language_for_path(Path::new("a/b.py")), Some("python"));
        assert_eq!(language_for_path(Path::new("lib.rs")), Some("rust"));
        assert_eq!(language_for_path(Path::new("x.mjs")), Some("javascript"));
        assert_eq!(language_for_path(Path::new("x.cts")), Some("typescript"));
        assert_eq!(language_for_path(Path::new("App.tsx")), Some("tsx"));
        assert_eq!(language_for_path(Path::new("main.go")), Some("go"));
        assert_eq!(language_for_path(Path::new("README.md")), None);
        assert_eq!(language_for_path(Path::new("Makefile")), None);
    }

    #[test]
    fn skips_tool_dirs_and_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::create_dir_all(root.join(".repograph")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("pkg/a.py"), "x = 1\n").unwrap();
        fs::write(root.join("big.py"), "#".repeat(64)).unwrap();
        fs::write(root.join(".repograph/cached.py"), "x = 1\n").unwrap();
        fs::write(root.join(".git/hook.py"), "x = 1\n").unwrap();
        fs::write(root.join("notes.txt"), "hello").unwrap();

        let options = ScanOptions {
            no_ignore: false,
            max_file_bytes: 32,
        };
        let files = scan_repo(root, options).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["pkg/a.py"]);
        assert_eq!(files[0].language, "python");
    }

    #[test]
    fn honours_gitignore_unless_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(".gitignore"), "gen/\n").unwrap();
        fs::create_dir_all(root.join("gen")).unwrap();
        fs::write(root.join("gen/out.py"), "x = 1\n").unwrap();
        fs::write(root.join("main.py"), "x = 1\n").unwrap();

        let files = scan_repo(root, ScanOptions::new(false)).unwrap();
        assert_eq!(files.len(), 1);
        let files = scan_repo(root, ScanOptions::new(true)).unwrap();
        assert_eq!(files.len(), 2);
    }
}
