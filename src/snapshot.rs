//! SQLite snapshot of an indexed repository.
//!
//! A snapshot holds every code element (file elements include the whole
//! source) plus any stored embeddings, so a `LocalIndex` can be rebuilt
//! without touching the repository tree.

use crate::error::{GraphError, Result};
use crate::model::{CodeElement, ElementKind};
use crate::util;
use anyhow::Context;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: i64 = 1;

const SNAPSHOT_DIR: &str = ".repograph";
const SNAPSHOT_FILE: &str = "snapshot.sqlite";

const SCHEMA: &str = "
    CREATE TABLE meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE elements (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        qualname TEXT NOT NULL,
        rel_path TEXT NOT NULL,
        language TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        code TEXT NOT NULL,
        signature TEXT,
        docstring TEXT,
        parent TEXT,
        calls TEXT NOT NULL,
        bases TEXT NOT NULL,
        imports TEXT NOT NULL,
        seq INTEGER NOT NULL
    );

    CREATE TABLE embeddings (
        id TEXT PRIMARY KEY,
        vector TEXT NOT NULL
    );
";

/// Contents of a snapshot file.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub repo_name: String,
    pub elements: Vec<CodeElement>,
    pub embeddings: Vec<(String, Vec<f32>)>,
}

/// `<repo>/.repograph/snapshot.sqlite`
pub fn default_snapshot_path(repo_root: &Path) -> PathBuf {
    repo_root.join(SNAPSHOT_DIR).join(SNAPSHOT_FILE)
}

/// Writes `snapshot` to `path`, replacing any previous file only once the new
/// one is complete.
pub fn save(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    util::ensure_parent_dir(path)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if tmp.exists() {
        fs::remove_file(&tmp).with_context(|| format!("remove stale {}", tmp.display()))?;
    }

    {
        let mut conn = Connection::open(&tmp)
            .with_context(|| format!("create snapshot at {}", tmp.display()))?;
        conn.execute_batch(SCHEMA)?;
        let tx = conn.transaction()?;
        {
            let mut meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?, ?)")?;
            meta.execute(params!["format_version", FORMAT_VERSION.to_string()])?;
            meta.execute(params!["repo_name", &snapshot.repo_name])?;

            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO elements
                 (id, kind, name, qualname, rel_path, language, start_line, end_line, code,
                  signature, docstring, parent, calls, bases, imports, seq)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (seq, element) in snapshot.elements.iter().enumerate() {
                insert.execute(params![
                    &element.id,
                    element.kind.as_str(),
                    &element.name,
                    &element.qualname,
                    &element.rel_path,
                    &element.language,
                    element.start_line,
                    element.end_line,
                    &element.code,
                    element.signature.as_deref(),
                    element.docstring.as_deref(),
                    element.parent.as_deref(),
                    serde_json::to_string(&element.calls)?,
                    serde_json::to_string(&element.bases)?,
                    serde_json::to_string(&element.imports)?,
                    seq as i64,
                ])?;
            }

            let mut embed =
                tx.prepare("INSERT OR REPLACE INTO embeddings (id, vector) VALUES (?, ?)")?;
            for (id, vector) in &snapshot.embeddings {
                embed.execute(params![id, serde_json::to_string(vector)?])?;
            }
        }
        tx.commit()?;
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("move {} to {}", tmp.display(), path.display()))?;
    tracing::info!(
        path = %path.display(),
        elements = snapshot.elements.len(),
        embeddings = snapshot.embeddings.len(),
        "wrote snapshot"
    );
    Ok(())
}

/// Reads a snapshot. Every failure, including a missing file, is a
/// `GraphError::Snapshot`.
pub fn load(path: &Path) -> Result<Snapshot> {
    if !path.is_file() {
        return Err(GraphError::snapshot(path, "file not found"));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|err| GraphError::snapshot(path, err.to_string()))?;
    read_snapshot(&conn).map_err(|err| GraphError::snapshot(path, format!("{err:#}")))
}

fn read_snapshot(conn: &Connection) -> anyhow::Result<Snapshot> {
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'format_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("read snapshot metadata")?;
    let version = version.context("missing format_version")?;
    if version.parse::<i64>().ok() != Some(FORMAT_VERSION) {
        anyhow::bail!("unsupported format_version {version}, expected {FORMAT_VERSION}");
    }
    let repo_name: String = conn
        .query_row("SELECT value FROM meta WHERE key = 'repo_name'", [], |row| {
            row.get(0)
        })
        .optional()?
        .unwrap_or_default();

    let mut stmt = conn
        .prepare(
            "SELECT id, kind, name, qualname, rel_path, language, start_line, end_line, code,
                    signature, docstring, parent, calls, bases, imports
             FROM elements ORDER BY seq",
        )
        .context("read elements")?;
    let rows = stmt.query_map([], |row| {
        Ok(RawElement {
            id: row.get(0)?,
            kind: row.get(1)?,
            name: row.get(2)?,
            qualname: row.get(3)?,
            rel_path: row.get(4)?,
            language: row.get(5)?,
            start_line: row.get(6)?,
            end_line: row.get(7)?,
            code: row.get(8)?,
            signature: row.get(9)?,
            docstring: row.get(10)?,
            parent: row.get(11)?,
            calls: row.get(12)?,
            bases: row.get(13)?,
            imports: row.get(14)?,
        })
    })?;
    let mut elements = Vec::new();
    for row in rows {
        elements.push(row?.into_element()?);
    }

    let mut stmt = conn
        .prepare("SELECT id, vector FROM embeddings ORDER BY id")
        .context("read embeddings")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut embeddings = Vec::new();
    for row in rows {
        let (id, vector) = row?;
        let vector: Vec<f32> =
            serde_json::from_str(&vector).with_context(|| format!("embedding for {id}"))?;
        embeddings.push((id, vector));
    }

    Ok(Snapshot {
        repo_name,
        elements,
        embeddings,
    })
}

struct RawElement {
    id: String,
    kind: String,
    name: String,
    qualname: String,
    rel_path: String,
    language: String,
    start_line: i64,
    end_line: i64,
    code: String,
    signature: Option<String>,
    docstring: Option<String>,
    parent: Option<String>,
    calls: String,
    bases: String,
    imports: String,
}

impl RawElement {
    fn into_element(self) -> anyhow::Result<CodeElement> {
        let kind: ElementKind = self
            .kind
            .parse()
            .map_err(|err: String| anyhow::anyhow!("element {}: {err}", self.id))?;
        let context = || format!("element {}", self.id);
        let calls = serde_json::from_str(&self.calls).with_context(context)?;
        let bases = serde_json::from_str(&self.bases).with_context(context)?;
        let imports = serde_json::from_str(&self.imports).with_context(context)?;
        Ok(CodeElement {
            kind,
            calls,
            bases,
            imports,
            id: self.id,
            name: self.name,
            qualname: self.qualname,
            rel_path: self.rel_path,
            language: self.language,
            start_line: self.start_line,
            end_line: self.end_line,
            code: self.code,
            signature: self.signature,
            docstring: self.docstring,
            parent: self.parent,
        })
    }
}
