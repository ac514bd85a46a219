use repograph::indexer::extract::LanguageExtractor;
use repograph::indexer::python::PythonExtractor;
use repograph::model::{ElementKind, ImportRef};
use repograph::util::module_path_for;

#[test]
fn module_path_from_rel_path() {
    assert_eq!(module_path_for("foo.py"), "foo");
    assert_eq!(module_path_for("pkg/__init__.py"), "pkg");
    assert_eq!(module_path_for("pkg/sub/mod.py"), "pkg.sub");
    assert_eq!(module_path_for("pkg/sub/store.py"), "pkg.sub.store");
    assert_eq!(module_path_for("__init__.py"), "__init__");
}

#[test]
fn extract_elements_and_imports() {
    let source = r#"
"""module doc"""
import os, sys as system
from pkg import mod, util as u

class Base:
    pass

class Foo(Base):
    """Foo doc"""
    def method(self, x):
        "method doc"
        return func(x, 1)

def func(a, b):
    return a + b

func(1, 2)
"#;
    let mut extractor = PythonExtractor::new().unwrap();
    let extracted = extractor.extract(source, "pkg/app.py").unwrap();
    assert_eq!(extracted.docstring.as_deref(), Some("module doc"));

    let names: Vec<_> = extracted
        .elements
        .iter()
        .map(|e| (e.kind, e.qualname.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![
            (ElementKind::Class, "pkg.app.Base"),
            (ElementKind::Class, "pkg.app.Foo"),
            (ElementKind::Method, "pkg.app.Foo.method"),
            (ElementKind::Function, "pkg.app.func"),
        ]
    );

    let foo = &extracted.elements[1];
    assert_eq!(foo.bases, vec!["Base".to_string()]);
    assert_eq!(foo.docstring.as_deref(), Some("Foo doc"));

    let method = &extracted.elements[2];
    assert_eq!(method.parent.as_deref(), Some(foo.id.as_str()));
    assert_eq!(method.docstring.as_deref(), Some("method doc"));
    assert_eq!(method.calls, vec!["func".to_string()]);
    assert_eq!(method.rel_path, "pkg/app.py");
    assert_eq!(method.language, "python");

    assert!(extracted.elements[3].calls.is_empty());

    assert_eq!(
        extracted.imports,
        vec![
            ImportRef {
                module: "os".into(),
                names: vec![],
                level: 0
            },
            ImportRef {
                module: "sys".into(),
                names: vec![],
                level: 0
            },
            ImportRef {
                module: "pkg".into(),
                names: vec!["mod".into(), "util".into()],
                level: 0
            },
        ]
    );
}

#[test]
fn nested_scopes() {
    let source = r#"
class Outer:
    class Inner:
        def ping(self):
            return self.pong()

def runner():
    def step():
        helper()
    step()

async def fetch(url):
    return await client.get(url)
"#;
    let mut extractor = PythonExtractor::new().unwrap();
    let extracted = extractor.extract(source, "net.py").unwrap();

    let inner = extracted
        .elements
        .iter()
        .find(|e| e.name == "Inner")
        .unwrap();
    assert_eq!(inner.qualname, "net.Outer.Inner");
    let ping = extracted.elements.iter().find(|e| e.name == "ping").unwrap();
    assert_eq!(ping.qualname, "net.Outer.Inner.ping");
    assert_eq!(ping.parent.as_deref(), Some(inner.id.as_str()));
    assert_eq!(ping.calls, vec!["pong".to_string()]);

    // `step` folds into `runner`.
    assert!(extracted.elements.iter().all(|e| e.name != "step"));
    let runner = extracted
        .elements
        .iter()
        .find(|e| e.name == "runner")
        .unwrap();
    assert_eq!(runner.calls, vec!["helper".to_string(), "step".to_string()]);

    let fetch = extracted.elements.iter().find(|e| e.name == "fetch").unwrap();
    assert_eq!(fetch.signature.as_deref(), Some("async def fetch(url)"));
    assert_eq!(fetch.calls, vec!["get".to_string()]);
}

#[test]
fn element_ids_are_stable() {
    let source = "def run():\n    pass\n";
    let mut extractor = PythonExtractor::new().unwrap();
    let first = extractor.extract(source, "jobs.py").unwrap();
    let second = extractor.extract(source, "jobs.py").unwrap();
    let moved = extractor.extract(source, "other/jobs.py").unwrap();
    assert_eq!(first.elements[0].id, second.elements[0].id);
    assert_ne!(first.elements[0].id, moved.elements[0].id);
    assert!(first.elements[0].id.starts_with("function_"));
}
