use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "repograph",
    version,
    about = "Code graph queries over a live engine, a snapshot or a fresh index",
    after_help = r#"Examples:
  repograph snapshot --repo .
  repograph query --repo . --method stats
  repograph query --repo . --snapshot .repograph/snapshot.sqlite --method search --params '{"query":"parse config","k":5}'
  repograph query --repo . --endpoint 127.0.0.1:4100 --token secret --method find_callers --params '{"symbol":"run"}'
  repograph serve --repo . --bind 127.0.0.1:4100 --token secret
"#
)]
pub struct Args {
    /// Debug-level logging on stderr, applied on top of any RUST_LOG filter.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve a backend and run one graph operation.
    Query {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Live engine address (host:port); needs --token.
        #[arg(long, requires = "token")]
        endpoint: Option<String>,
        #[arg(long)]
        token: Option<String>,
        /// Snapshot to load when no live engine answers.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Include files ignored by .gitignore when building a fresh index.
        #[arg(long)]
        no_ignore: bool,
        #[arg(long)]
        method: String,
        #[arg(long, default_value = "{}")]
        params: String,
        #[arg(long, value_name = "PATH")]
        params_file: Option<PathBuf>,
    },
    /// Index the repository and write a snapshot.
    Snapshot {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Defaults to <repo>/.repograph/snapshot.sqlite.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
    /// Host a local index over the graph RPC protocol.
    Serve {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Serve this snapshot instead of indexing the repository.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        #[arg(long, default_value = "127.0.0.1:0")]
        bind: String,
        #[arg(long)]
        token: String,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
}
