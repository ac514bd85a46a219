use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element id plus BM25 (or cosine) score.
pub type SearchHit = (String, f64);

/// `(file_path, module_path)` pair returned by `resolve_symbol`.
pub type SymbolLocation = (String, String);

/// Address of a live indexing engine plus the bearer token it expects.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    token: String,
}

impl Endpoint {
    /// Parse `host:port` (the last colon splits, so bracketed IPv6 works).
    pub fn parse(addr: &str, token: impl Into<String>) -> Result<Self, GraphError> {
        let addr = addr.trim();
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| GraphError::InvalidEndpoint(addr.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(GraphError::InvalidEndpoint(addr.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| GraphError::InvalidEndpoint(addr.to_string()))?;
        Ok(Self {
            host: host.to_string(),
            port,
            token: token.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Result of the `stats` operation. Extra keys sent by a remote engine are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub files: usize,
    pub elements: usize,
    pub bm25_docs: usize,
    pub has_vectors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    File,
    Class,
    Function,
    Method,
    Struct,
    Enum,
    Interface,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Interface => "interface",
        }
    }

    /// Kinds that can take part in inheritance edges.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            Self::Class | Self::Struct | Self::Enum | Self::Interface
        )
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "file" => Ok(Self::File),
            "class" => Ok(Self::Class),
            "function" => Ok(Self::Function),
            "method" => Ok(Self::Method),
            "struct" => Ok(Self::Struct),
            "enum" => Ok(Self::Enum),
            "interface" => Ok(Self::Interface),
            other => Err(format!("unknown element kind: {other}")),
        }
    }
}

/// One import statement of a file, normalised across languages.
///
/// `module` is dotted (`pkg.core`), `level` counts leading parent steps for
/// relative imports (`from ..x import y` has level 2, `./x` has level 1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRef {
    pub module: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub level: u32,
}

/// A code element extracted from a source file. File elements carry the whole
/// file as `code`, so an index can be rebuilt from elements alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeElement {
    pub id: String,
    pub kind: ElementKind,
    pub name: String,
    pub qualname: String,
    pub rel_path: String,
    pub language: String,
    pub start_line: i64,
    pub end_line: i64,
    pub code: String,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    /// Id of the enclosing class/struct/interface, if any.
    pub parent: Option<String>,
    /// Bare names this element calls.
    #[serde(default)]
    pub calls: Vec<String>,
    /// Base classes, implemented traits or extended interfaces.
    #[serde(default)]
    pub bases: Vec<String>,
    /// Only populated on file elements.
    #[serde(default)]
    pub imports: Vec<ImportRef>,
}
