pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod local;
pub mod model;
pub mod query;
pub mod rpc;
pub mod search;
pub mod snapshot;
pub mod util;
pub mod vector;

pub use backend::{Backend, BackendChoice, ResolveRequest, Resolver, resolve};
pub use error::{GraphError, Result};
pub use query::GraphQuery;
