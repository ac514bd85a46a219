use anyhow::{Context, Result, anyhow};
use clap::Parser;
use repograph::backend::{ResolveRequest, Resolver};
use repograph::indexer::scan::ScanOptions;
use repograph::local::LocalIndex;
use repograph::query::GraphQuery;
use repograph::{cli, rpc, snapshot};
use serde_json::{Value, json};
use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` directives when set and valid, otherwise `repograph=info`;
/// `--verbose` then raises `repograph` to debug on top of either.
fn log_filter(verbose: bool, env: Option<&str>) -> Result<EnvFilter> {
    let filter = env
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new("repograph=info"));
    if !verbose {
        return Ok(filter);
    }
    Ok(filter.add_directive("repograph=debug".parse()?))
}

fn init_tracing(verbose: bool) -> Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(verbose, env.as_deref())?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.verbose)?;

    match args.command {
        cli::Command::Query {
            repo,
            endpoint,
            token,
            snapshot,
            no_ignore,
            method,
            params,
            params_file,
        } => {
            let params_raw = if let Some(path) = params_file {
                std::fs::read_to_string(&path)
                    .with_context(|| format!("read params file {}", path.display()))?
            } else {
                params
            };
            let params: Value =
                serde_json::from_str(&params_raw).context("parse --params as JSON")?;
            let request = ResolveRequest {
                repo,
                endpoint,
                token,
                snapshot,
                no_ignore,
            };
            let backend = Resolver::new().resolve(&request)?;
            let result = rpc::server::dispatch_method(&backend, &method, &params);
            backend.close();
            let result = result.map_err(|message| anyhow!(message))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        cli::Command::Snapshot {
            repo,
            out,
            no_ignore,
        } => {
            let index = LocalIndex::build(&repo, ScanOptions::new(no_ignore))?;
            let out = out.unwrap_or_else(|| snapshot::default_snapshot_path(index.repo_root()));
            index.save_snapshot(&out)?;
            let stats = index.stats()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "snapshot": out.display().to_string(),
                    "stats": stats,
                }))?
            );
            Ok(())
        }
        cli::Command::Serve {
            repo,
            snapshot,
            bind,
            token,
            no_ignore,
        } => {
            let (index, backend) = match &snapshot {
                Some(path) => (LocalIndex::from_snapshot(&repo, path)?, "snapshot"),
                None => (
                    LocalIndex::build(&repo, ScanOptions::new(no_ignore))?,
                    "fresh_index",
                ),
            };
            let listener =
                TcpListener::bind(&bind).with_context(|| format!("bind graph RPC on {bind}"))?;
            let local = listener.local_addr()?;
            tracing::info!(endpoint = %local, backend, "serving graph RPC");
            let mut stdout = std::io::stdout().lock();
            writeln!(
                stdout,
                "{}",
                json!({ "endpoint": local.to_string(), "backend": backend })
            )?;
            stdout.flush()?;
            drop(stdout);
            rpc::server::serve(listener, Arc::new(index), token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_info() {
        let filter = log_filter(false, None).unwrap().to_string();
        assert!(filter.contains("repograph=info"), "{filter}");
    }

    #[test]
    fn verbose_adds_debug_on_top_of_rust_log() {
        let filter = log_filter(true, Some("warn")).unwrap().to_string();
        assert!(filter.contains("warn"), "{filter}");
        assert!(filter.contains("repograph=debug"), "{filter}");

        let filter = log_filter(false, Some("warn")).unwrap().to_string();
        assert!(!filter.contains("repograph"), "{filter}");
    }

    #[test]
    fn invalid_rust_log_uses_the_default() {
        let filter = log_filter(true, Some("repograph=loud")).unwrap().to_string();
        assert!(filter.contains("repograph=debug"), "{filter}");
        assert!(!filter.contains("loud"), "{filter}");
    }
}
