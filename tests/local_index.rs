use repograph::GraphQuery;
use repograph::indexer::scan::ScanOptions;
use repograph::local::LocalIndex;
use repograph::model::{CodeElement, ElementKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

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
    dir.push(format!("repograph-{label}-{nanos}-{counter}"));
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

fn setup_repo(fixture: &str) -> PathBuf {
    let repo_root = temp_repo_dir(fixture);
    copy_dir(&fixture_path(fixture), &repo_root);
    repo_root
}

fn find<'a>(index: &'a LocalIndex, kind: ElementKind, name: &str) -> &'a CodeElement {
    index
        .elements()
        .find(|element| element.kind == kind && element.name == name)
        .unwrap_or_else(|| panic!("no {} named {name}", kind.as_str()))
}

#[test]
fn fresh_index_links_calls_imports_and_inheritance() {
    let repo_root = setup_repo("py_graph");
    let index = LocalIndex::build(&repo_root, ScanOptions::default()).unwrap();

    assert_eq!(
        index.file_tree().unwrap(),
        vec![
            "main.py",
            "shop/__init__.py",
            "shop/cart.py",
            "shop/models.py",
            "shop/pricing.py"
        ]
    );

    let total = find(&index, ElementKind::Method, "total");
    let checkout = find(&index, ElementKind::Function, "checkout");
    let format_receipt = find(&index, ElementKind::Function, "format_receipt");
    assert_eq!(
        index.find_callers("sum_prices").unwrap(),
        vec![total.id.clone()]
    );
    let callees = index.find_callees("checkout").unwrap();
    assert!(callees.contains(&total.id));
    assert!(callees.contains(&format_receipt.id));
    assert_eq!(index.find_callers(&total.id).unwrap(), vec![checkout.id.clone()]);

    let item = find(&index, ElementKind::Class, "Item");
    let discounted = find(&index, ElementKind::Class, "DiscountedItem");
    assert_eq!(
        index.get_subclasses("Item").unwrap(),
        vec![discounted.id.clone()]
    );
    assert_eq!(
        index.get_superclasses("DiscountedItem").unwrap(),
        vec![item.id.clone()]
    );

    let cart_file = find(&index, ElementKind::File, "cart.py");
    let models_file = find(&index, ElementKind::File, "models.py");
    let pricing_file = find(&index, ElementKind::File, "pricing.py");
    let deps = index.get_dependencies("shop/cart.py").unwrap();
    assert!(deps.contains(&models_file.id));
    assert!(deps.contains(&pricing_file.id));
    assert!(deps.contains(&item.id));
    assert_eq!(
        index
            .get_dependents(&repo_root.join("shop/models.py").to_string_lossy())
            .unwrap(),
        vec![cart_file.id.clone()]
    );

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn paths_search_and_resolution() {
    let repo_root = setup_repo("py_graph");
    let index = LocalIndex::build(&repo_root, ScanOptions::default()).unwrap();

    let main = find(&index, ElementKind::Function, "main");
    let sum_prices = find(&index, ElementKind::Function, "sum_prices");
    let path = index.find_path("main", "sum_prices").unwrap().unwrap();
    assert_eq!(path.len(), 4);
    assert_eq!(path.first(), Some(&main.id));
    assert_eq!(path.last(), Some(&sum_prices.id));
    assert_eq!(index.find_path("format_receipt", "main").unwrap(), None);
    assert_eq!(index.find_path("nope", "main").unwrap(), None);

    let related = index.get_related("checkout", 1).unwrap();
    assert!(related.contains(&find(&index, ElementKind::File, "pricing.py").id));
    assert!(related.contains(&main.id));

    let hits = index.search("receipt", 3).unwrap();
    let top = index.graph().element(&hits[0].0).unwrap();
    assert_eq!(top.name, "format_receipt");
    assert!(index.search("xyznonexistent", 5).unwrap().is_empty());

    let cart = find(&index, ElementKind::Class, "Cart");
    let source = index.get_source(&cart.id).unwrap().unwrap();
    assert!(source.starts_with("class Cart"));
    assert_eq!(index.get_source("class_0000000000000000").unwrap(), None);

    assert_eq!(
        index.resolve_symbol("Cart").unwrap(),
        vec![("shop/cart.py".to_string(), "shop.cart".to_string())]
    );
    assert_eq!(
        index.resolve_module("shop.pricing").unwrap().as_deref(),
        Some("shop/pricing.py")
    );
    assert_eq!(index.resolve_module("shop").unwrap().as_deref(), Some("shop/__init__.py"));
    assert_eq!(index.resolve_module("does.not.exist").unwrap(), None);

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn snapshot_round_trip_matches_fresh_index() {
    let repo_root = setup_repo("py_graph");
    let fresh = LocalIndex::build(&repo_root, ScanOptions::default()).unwrap();
    let snapshot = repo_root.join(".repograph").join("snapshot.sqlite");
    fresh.save_snapshot(&snapshot).unwrap();

    // The snapshot must not depend on the working tree.
    std::fs::remove_file(repo_root.join("shop/cart.py")).unwrap();
    let loaded = LocalIndex::from_snapshot(&repo_root, &snapshot).unwrap();

    assert_eq!(loaded.stats().unwrap(), fresh.stats().unwrap());
    assert_eq!(loaded.file_tree().unwrap(), fresh.file_tree().unwrap());
    for symbol in ["sum_prices", "total", "Cart", "checkout"] {
        assert_eq!(
            loaded.find_callers(symbol).unwrap(),
            fresh.find_callers(symbol).unwrap(),
            "{symbol}"
        );
    }
    assert_eq!(
        loaded.find_path("main", "sum_prices").unwrap(),
        fresh.find_path("main", "sum_prices").unwrap()
    );
    assert_eq!(
        loaded.search("cart total", 5).unwrap(),
        fresh.search("cart total", 5).unwrap()
    );

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn snapshot_dir_is_not_indexed() {
    let repo_root = setup_repo("py_graph");
    let first = LocalIndex::build(&repo_root, ScanOptions::default()).unwrap();
    first
        .save_snapshot(&repo_root.join(".repograph").join("snapshot.sqlite"))
        .unwrap();
    let second = LocalIndex::build(&repo_root, ScanOptions::default()).unwrap();
    assert_eq!(second.file_tree().unwrap(), first.file_tree().unwrap());
    let _ = std::fs::remove_dir_all(&repo_root);
}
