use crate::config::Config;
use crate::error::{GraphError, Result};
use crate::model::{Endpoint, GraphStats, SearchHit, SymbolLocation};
use crate::query::GraphQuery;
use crate::rpc::protocol::{RequestEnvelope, ResponseEnvelope};
use crate::rpc::transport::{ConnectionState, Connector, TcpConnector, Transport};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Graph backend that forwards every operation to a live indexing engine.
///
/// One connection per client, opened on the first call and reused after
/// that. Concurrent callers are served one request/response pair at a time.
/// Dropping the client drops its transport, which closes the connection.
pub struct RpcClient {
    token: String,
    transport: Mutex<Transport>,
}

impl RpcClient {
    /// TCP client using the configured RPC timeout. Does not connect yet.
    pub fn connect(endpoint: Endpoint) -> Self {
        Self::with_connector(endpoint, Config::get().rpc_timeout(), Arc::new(TcpConnector))
    }

    pub fn with_connector(
        endpoint: Endpoint,
        timeout: Duration,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let token = endpoint.token().to_string();
        Self {
            token,
            transport: Mutex::new(Transport::new(endpoint, timeout, connector)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state()
    }

    /// Send one request and wait for its response.
    pub fn call(&self, method: &str, params: Value) -> Result<Value> {
        let line = RequestEnvelope::new(self.token.as_str(), method, params).encode()?;
        let reply = {
            let mut transport = self.lock();
            transport.ensure_connected()?;
            transport.send_line(&line)?;
            transport.read_line()?
        };
        let Some(reply) = reply else {
            return Err(GraphError::ConnectionClosed);
        };
        ResponseEnvelope::decode(&reply)?.into_result()
    }

    fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.call(method, params)?;
        serde_json::from_value(value)
            .map_err(|err| GraphError::Protocol(format!("{method} result: {err}")))
    }

    /// Like [`call_as`](Self::call_as) but reads a null result as an empty list.
    fn call_list<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Vec<T>> {
        let value = self.call(method, params)?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(value)
            .map_err(|err| GraphError::Protocol(format!("{method} result: {err}")))
    }

    pub fn close(&self) {
        self.lock().close();
    }

    fn lock(&self) -> MutexGuard<'_, Transport> {
        // A panic mid-exchange leaves the transport either intact or closed.
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GraphQuery for RpcClient {
    fn find_callers(&self, symbol: &str) -> Result<Vec<String>> {
        self.call_list("find_callers", json!({ "symbol": symbol }))
    }

    fn find_callees(&self, symbol: &str) -> Result<Vec<String>> {
        self.call_list("find_callees", json!({ "symbol": symbol }))
    }

    fn get_dependencies(&self, file_path: &str) -> Result<Vec<String>> {
        self.call_list("get_dependencies", json!({ "file_path": file_path }))
    }

    fn get_dependents(&self, file_path: &str) -> Result<Vec<String>> {
        self.call_list("get_dependents", json!({ "file_path": file_path }))
    }

    fn get_subclasses(&self, class_name: &str) -> Result<Vec<String>> {
        self.call_list("get_subclasses", json!({ "class_name": class_name }))
    }

    fn get_superclasses(&self, class_name: &str) -> Result<Vec<String>> {
        self.call_list("get_superclasses", json!({ "class_name": class_name }))
    }

    fn find_path(&self, source: &str, target: &str) -> Result<Option<Vec<String>>> {
        let path: Option<Vec<String>> =
            self.call_as("find_path", json!({ "source": source, "target": target }))?;
        // Some engines answer "no path" with an empty list.
        Ok(path.filter(|nodes| !nodes.is_empty()))
    }

    fn get_related(&self, element: &str, max_hops: usize) -> Result<Vec<String>> {
        self.call_list(
            "get_related",
            json!({ "element": element, "max_hops": max_hops }),
        )
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.call_list("search", json!({ "query": query, "k": k }))
    }

    fn get_source(&self, element_id: &str) -> Result<Option<String>> {
        self.call_as("get_source", json!({ "element_id": element_id }))
    }

    fn file_tree(&self) -> Result<Vec<String>> {
        self.call_list("file_tree", json!({}))
    }

    fn stats(&self) -> Result<GraphStats> {
        self.call_as("stats", json!({}))
    }

    fn resolve_symbol(&self, symbol: &str) -> Result<Vec<SymbolLocation>> {
        self.call_list("resolve_symbol", json!({ "symbol": symbol }))
    }

    fn resolve_module(&self, module_name: &str) -> Result<Option<String>> {
        self.call_as("resolve_module", json!({ "module_name": module_name }))
    }

    fn close(&self) {
        RpcClient::close(self);
    }
}
