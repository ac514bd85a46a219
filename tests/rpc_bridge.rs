use repograph::backend::{ResolveRequest, Resolver};
use repograph::indexer::scan::ScanOptions;
use repograph::local::LocalIndex;
use repograph::model::{Endpoint, SearchHit};
use repograph::rpc::{ConnectionState, RpcClient, TcpConnector, server};
use repograph::{GraphError, GraphQuery};
use serde_json::json;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

const TOKEN: &str = "secret";

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn temp_repo_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("repograph-rpc-{label}-{nanos}-{counter}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn copy_dir(src: &Path, dst: &Path) {
    std::fs::create_dir_all(dst).unwrap();
    for entry in std::fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&path, &target);
        } else {
            std::fs::copy(&path, &target).unwrap();
        }
    }
}

fn setup_repo() -> PathBuf {
    let repo_root = temp_repo_dir("py_graph");
    copy_dir(&fixture_path("py_graph"), &repo_root);
    repo_root
}

/// Hosts a fresh index of `repo_root` and returns its address.
fn host(repo_root: &Path) -> String {
    let index = LocalIndex::build(repo_root, ScanOptions::default()).unwrap();
    let (addr, _handle) = server::spawn("127.0.0.1:0", Arc::new(index), TOKEN).unwrap();
    addr.to_string()
}

/// An address nothing listens on.
fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

/// Accepts connections and never reads or answers them.
fn silent_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            held.push(stream);
        }
    });
    addr.to_string()
}

fn assert_same_hits(actual: &[SearchHit], expected: &[SearchHit]) {
    assert_eq!(actual.len(), expected.len());
    for ((id, score), (expected_id, expected_score)) in actual.iter().zip(expected) {
        assert_eq!(id, expected_id);
        assert!((score - expected_score).abs() < 1e-9);
    }
}

#[test]
fn live_backend_answers_like_the_local_index() {
    let repo_root = setup_repo();
    let addr = host(&repo_root);
    let local = LocalIndex::build(&repo_root, ScanOptions::default()).unwrap();

    let backend = Resolver::new()
        .resolve(&ResolveRequest::new(&repo_root).endpoint(&addr, TOKEN))
        .unwrap();
    assert_eq!(backend.choice().name(), "live_rpc");
    assert!(backend.fallback_reason().is_none());

    assert_eq!(backend.stats().unwrap(), local.stats().unwrap());
    assert_eq!(backend.file_tree().unwrap(), local.file_tree().unwrap());
    assert_eq!(
        backend.find_callers("sum_prices").unwrap(),
        local.find_callers("sum_prices").unwrap()
    );
    assert_eq!(
        backend.find_callees("checkout").unwrap(),
        local.find_callees("checkout").unwrap()
    );
    assert_eq!(
        backend.get_dependencies("shop/cart.py").unwrap(),
        local.get_dependencies("shop/cart.py").unwrap()
    );
    assert_eq!(
        backend.get_dependents("shop/models.py").unwrap(),
        local.get_dependents("shop/models.py").unwrap()
    );
    assert_eq!(
        backend.get_subclasses("Item").unwrap(),
        local.get_subclasses("Item").unwrap()
    );
    assert_eq!(
        backend.get_superclasses("DiscountedItem").unwrap(),
        local.get_superclasses("DiscountedItem").unwrap()
    );
    assert_eq!(
        backend.find_path("main", "sum_prices").unwrap(),
        local.find_path("main", "sum_prices").unwrap()
    );
    assert_eq!(
        backend.get_related("checkout", 2).unwrap(),
        local.get_related("checkout", 2).unwrap()
    );
    assert_same_hits(
        &backend.search("cart total", 4).unwrap(),
        &local.search("cart total", 4).unwrap(),
    );
    let cart_id = local.search("Cart", 1).unwrap()[0].0.clone();
    assert_eq!(
        backend.get_source(&cart_id).unwrap(),
        local.get_source(&cart_id).unwrap()
    );
    assert_eq!(
        backend.resolve_symbol("Cart").unwrap(),
        local.resolve_symbol("Cart").unwrap()
    );
    assert_eq!(
        backend.resolve_module("shop.pricing").unwrap().as_deref(),
        Some("shop/pricing.py")
    );
    assert_eq!(backend.resolve_module("nowhere").unwrap(), None);

    backend.close();
    backend.close();
    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn missing_paths_and_unknown_queries_are_empty_on_every_backend() {
    let repo_root = setup_repo();
    let addr = host(&repo_root);
    let snapshot = repo_root.join(".repograph").join("snapshot.sqlite");
    LocalIndex::build(&repo_root, ScanOptions::default())
        .unwrap()
        .save_snapshot(&snapshot)
        .unwrap();

    let requests = [
        ResolveRequest::new(&repo_root).endpoint(&addr, TOKEN),
        ResolveRequest::new(&repo_root).snapshot(&snapshot),
        ResolveRequest::new(&repo_root),
    ];
    let mut names = Vec::new();
    for request in &requests {
        let backend = Resolver::new().resolve(request).unwrap();
        names.push(backend.choice().name());
        assert_eq!(backend.find_path("a", "b").unwrap(), None);
        assert_eq!(backend.find_path("format_receipt", "main").unwrap(), None);
        assert!(backend.search("xyznonexistent", 5).unwrap().is_empty());
        assert!(backend.find_callers("xyznonexistent").unwrap().is_empty());
        assert_eq!(backend.get_source("xyznonexistent").unwrap(), None);
    }
    assert_eq!(names, vec!["live_rpc", "snapshot", "fresh_index"]);
    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn wrong_token_falls_back_with_reason() {
    let repo_root = setup_repo();
    let addr = host(&repo_root);

    let backend = Resolver::new()
        .resolve(&ResolveRequest::new(&repo_root).endpoint(&addr, "wrong"))
        .unwrap();
    assert_eq!(backend.choice().name(), "fresh_index");
    assert_eq!(
        backend.fallback_reason(),
        Some("unauthorized graph RPC token")
    );
    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn unreachable_engine_falls_back_to_snapshot_or_fresh() {
    let repo_root = setup_repo();
    let snapshot = repo_root.join("snap.sqlite");
    LocalIndex::build(&repo_root, ScanOptions::default())
        .unwrap()
        .save_snapshot(&snapshot)
        .unwrap();
    let addr = dead_address();

    let with_snapshot = Resolver::new()
        .resolve(
            &ResolveRequest::new(&repo_root)
                .endpoint(&addr, TOKEN)
                .snapshot(&snapshot),
        )
        .unwrap();
    assert_eq!(with_snapshot.choice().name(), "snapshot");
    assert!(with_snapshot.fallback_reason().is_some());

    let without = Resolver::new()
        .resolve(&ResolveRequest::new(&repo_root).endpoint(&addr, TOKEN))
        .unwrap();
    assert_eq!(without.choice().name(), "fresh_index");
    assert_eq!(
        with_snapshot.file_tree().unwrap(),
        without.file_tree().unwrap()
    );
    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn corrupt_snapshot_is_not_masked() {
    let repo_root = setup_repo();
    let snapshot = repo_root.join("broken.sqlite");
    std::fs::write(&snapshot, "this is not a snapshot, only a few words of text").unwrap();

    let err = Resolver::new()
        .resolve(
            &ResolveRequest::new(&repo_root)
                .endpoint(dead_address(), TOKEN)
                .snapshot(&snapshot),
        )
        .unwrap_err();
    assert!(matches!(err, GraphError::Snapshot { .. }), "{err}");
    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn concurrent_callers_share_one_connection() {
    let repo_root = setup_repo();
    let addr = host(&repo_root);
    let client = Arc::new(RpcClient::connect(Endpoint::parse(&addr, TOKEN).unwrap()));
    let expected = client.search("price", 3).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            thread::spawn(move || {
                let mut last = Vec::new();
                for _ in 0..10 {
                    assert_eq!(client.stats().unwrap().files, 5);
                    last = client.search("price", 3).unwrap();
                }
                last
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap(), expected);
    }
    assert_eq!(client.state(), ConnectionState::Connected);

    let err = client.call("drop_tables", json!({})).unwrap_err();
    assert_eq!(err.to_string(), "unknown graph RPC method: drop_tables");
    assert_eq!(client.state(), ConnectionState::Connected);

    client.close();
    assert!(matches!(
        client.stats().unwrap_err(),
        GraphError::ConnectionClosed
    ));
    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn silent_engine_times_out_and_closes() {
    let addr = silent_address();
    let client = RpcClient::with_connector(
        Endpoint::parse(&addr, TOKEN).unwrap(),
        Duration::from_millis(200),
        Arc::new(TcpConnector),
    );

    let err = client.call("stats", json!({})).unwrap_err();
    let GraphError::Connection(source) = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(source.kind(), std::io::ErrorKind::TimedOut);
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(matches!(
        client.call("stats", json!({})).unwrap_err(),
        GraphError::ConnectionClosed
    ));
}

#[test]
fn silent_engine_falls_back_to_fresh_index() {
    let repo_root = setup_repo();
    let addr = silent_address();

    let backend = Resolver::new()
        .with_timeout(Duration::from_millis(200))
        .resolve(&ResolveRequest::new(&repo_root).endpoint(&addr, TOKEN))
        .unwrap();
    assert_eq!(backend.choice().name(), "fresh_index");
    let reason = backend.fallback_reason().unwrap();
    assert!(reason.contains("timed out"), "{reason}");
    assert_eq!(backend.stats().unwrap().files, 5);
    let _ = std::fs::remove_dir_all(&repo_root);
}
