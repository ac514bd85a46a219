//! Graph RPC bridge: JSON-lines request/response over one TCP connection.

pub mod client;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::RpcClient;
pub use transport::{ConnectionState, Connector, TcpConnector, Transport};
