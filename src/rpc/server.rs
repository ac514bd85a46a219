use crate::config::Config;
use crate::query::GraphQuery;
use crate::rpc::protocol::{RequestEnvelope, ResponseEnvelope};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub const METHODS: &[&str] = &[
    "find_callers",
    "find_callees",
    "get_dependencies",
    "get_dependents",
    "get_subclasses",
    "get_superclasses",
    "find_path",
    "get_related",
    "search",
    "get_source",
    "file_tree",
    "stats",
    "resolve_symbol",
    "resolve_module",
];

/// Accept connections forever, one thread per connection.
pub fn serve(listener: TcpListener, query: Arc<dyn GraphQuery>, token: String) -> Result<()> {
    let token: Arc<str> = Arc::from(token);
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!("graph RPC accept failed: {err}");
                continue;
            }
        };
        let query = query.clone();
        let token = token.clone();
        let spawned = thread::Builder::new()
            .name("graph-rpc-conn".to_string())
            .spawn(move || {
                let peer = stream.peer_addr().ok();
                if let Err(err) = handle_connection(stream, query.as_ref(), &token) {
                    tracing::debug!(?peer, "graph RPC session ended: {err:#}");
                }
            });
        if let Err(err) = spawned {
            tracing::warn!("graph RPC connection thread failed to start: {err}");
            continue;
        }
    }
    Ok(())
}

/// Bind `addr` and run [`serve`] on a background thread.
pub fn spawn(
    addr: &str,
    query: Arc<dyn GraphQuery>,
    token: impl Into<String>,
) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
    let listener = TcpListener::bind(addr).with_context(|| format!("bind {addr}"))?;
    let local = listener.local_addr().context("read bound address")?;
    let token = token.into();
    let handle = thread::Builder::new()
        .name("graph-rpc-accept".to_string())
        .spawn(move || serve(listener, query, token))
        .context("spawn graph RPC accept thread")?;
    Ok((local, handle))
}

fn handle_connection(stream: TcpStream, query: &dyn GraphQuery, token: &str) -> Result<()> {
    let reader = BufReader::new(stream.try_clone().context("clone connection")?);
    let mut writer = BufWriter::new(stream);
    for line in reader.lines() {
        let line = line.context("read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(query, token, &line);
        writeln!(writer, "{}", serde_json::to_string(&response)?)?;
        writer.flush()?;
    }
    Ok(())
}

/// Answer one request line.
pub fn handle_line(query: &dyn GraphQuery, token: &str, line: &str) -> ResponseEnvelope {
    let request = match serde_json::from_str::<RequestEnvelope>(line) {
        Ok(request) => request,
        Err(err) => return ResponseEnvelope::failure(format!("invalid graph RPC request: {err}")),
    };
    if request.token != token {
        return ResponseEnvelope::failure("unauthorized graph RPC token");
    }
    match dispatch_method(query, &request.method, &request.params) {
        Ok(result) => ResponseEnvelope::success(result),
        Err(message) => ResponseEnvelope::failure(message),
    }
}

/// Run one named graph operation against `query`.
pub fn dispatch_method(
    query: &dyn GraphQuery,
    method: &str,
    params: &Value,
) -> std::result::Result<Value, String> {
    let config = Config::get();
    let value = match method {
        "find_callers" => json!(query.find_callers(required_str(params, "symbol")?).map_err(fail)?),
        "find_callees" => json!(query.find_callees(required_str(params, "symbol")?).map_err(fail)?),
        "get_dependencies" => json!(
            query
                .get_dependencies(required_str(params, "file_path")?)
                .map_err(fail)?
        ),
        "get_dependents" => json!(
            query
                .get_dependents(required_str(params, "file_path")?)
                .map_err(fail)?
        ),
        "get_subclasses" => json!(
            query
                .get_subclasses(required_str(params, "class_name")?)
                .map_err(fail)?
        ),
        "get_superclasses" => json!(
            query
                .get_superclasses(required_str(params, "class_name")?)
                .map_err(fail)?
        ),
        "find_path" => {
            let source = required_str(params, "source")?;
            let target = required_str(params, "target")?;
            json!(query.find_path(source, target).map_err(fail)?)
        }
        "get_related" => {
            let element = required_str(params, "element")?;
            let max_hops = optional_usize(params, "max_hops")?.unwrap_or(config.max_hops);
            json!(query.get_related(element, max_hops).map_err(fail)?)
        }
        "search" => {
            let text = required_str(params, "query")?;
            let k = optional_usize(params, "k")?.unwrap_or(config.search_limit);
            json!(query.search(text, k).map_err(fail)?)
        }
        "get_source" => json!(
            query
                .get_source(required_str(params, "element_id")?)
                .map_err(fail)?
        ),
        "file_tree" => json!(query.file_tree().map_err(fail)?),
        "stats" => json!(query.stats().map_err(fail)?),
        "resolve_symbol" => json!(
            query
                .resolve_symbol(required_str(params, "symbol")?)
                .map_err(fail)?
        ),
        "resolve_module" => json!(
            query
                .resolve_module(required_str(params, "module_name")?)
                .map_err(fail)?
        ),
        other => return Err(format!("unknown graph RPC method: {other}")),
    };
    Ok(value)
}

fn fail(err: crate::error::GraphError) -> String {
    err.to_string()
}

fn required_str<'a>(params: &'a Value, key: &str) -> std::result::Result<&'a str, String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_param(key))
}

fn optional_usize(params: &Value, key: &str) -> std::result::Result<Option<usize>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid_param(key)),
    }
}

fn invalid_param(key: &str) -> String {
    format!("missing or invalid '{key}' parameter")
}
