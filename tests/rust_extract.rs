use repograph::indexer::extract::LanguageExtractor;
use repograph::indexer::rust::RustExtractor;
use repograph::model::{ElementKind, ImportRef};
use repograph::util::module_path_for;

#[test]
fn module_path_from_rel_path() {
    assert_eq!(module_path_for("src/lib.rs"), "src.lib");
    assert_eq!(module_path_for("src/foo/mod.rs"), "src.foo");
    assert_eq!(module_path_for("src/foo/bar.rs"), "src.foo.bar");
    assert_eq!(module_path_for("tests/foo.rs"), "tests.foo");
}

#[test]
fn extract_elements_and_imports() {
    let source = r#"
use crate::foo::{Bar, Baz as Qux};

struct Foo;

enum Kind { A, B }

trait Greeter {
    fn hello(&self) {
        greet_all();
    }
}

impl Greeter for Foo {
    fn hello(&self) {}
}

impl Foo {
    fn method(&self) {}
}

fn helper() {}
fn util() { helper(); }
const MAX: usize = 10;
"#;
    let mut extractor = RustExtractor::new().unwrap();
    let extracted = extractor.extract(source, "src/pkg/mod.rs").unwrap();

    let names: Vec<_> = extracted
        .elements
        .iter()
        .map(|e| (e.kind, e.qualname.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![
            (ElementKind::Struct, "src.pkg.Foo"),
            (ElementKind::Enum, "src.pkg.Kind"),
            (ElementKind::Interface, "src.pkg.Greeter"),
            (ElementKind::Method, "src.pkg.Greeter.hello"),
            (ElementKind::Method, "src.pkg.Foo.hello"),
            (ElementKind::Method, "src.pkg.Foo.method"),
            (ElementKind::Function, "src.pkg.helper"),
            (ElementKind::Function, "src.pkg.util"),
        ]
    );

    let foo = &extracted.elements[0];
    let greeter = &extracted.elements[2];
    assert_eq!(foo.bases, vec!["Greeter".to_string()]);
    assert_eq!(
        extracted.elements[3].parent.as_deref(),
        Some(greeter.id.as_str())
    );
    assert_eq!(extracted.elements[3].calls, vec!["greet_all".to_string()]);
    assert_eq!(extracted.elements[4].parent.as_deref(), Some(foo.id.as_str()));
    assert_eq!(extracted.elements[5].parent.as_deref(), Some(foo.id.as_str()));
    assert_eq!(extracted.elements[7].calls, vec!["helper".to_string()]);

    assert_eq!(
        extracted.imports,
        vec![
            ImportRef {
                module: "foo".into(),
                names: vec!["Bar".into()],
                level: 0
            },
            ImportRef {
                module: "foo".into(),
                names: vec!["Baz".into()],
                level: 0
            },
        ]
    );
}

#[test]
fn inline_modules_and_relative_uses() {
    let source = r#"
use super::shared::Config;
use self::inline::*;

mod external;

mod inline {
    pub struct Bar;

    impl Bar {
        pub fn run(&self) {
            Config::load();
        }
    }
}
"#;
    let mut extractor = RustExtractor::new().unwrap();
    let extracted = extractor.extract(source, "src/pkg/mod.rs").unwrap();

    let names: Vec<_> = extracted
        .elements
        .iter()
        .map(|e| e.qualname.as_str())
        .collect();
    assert_eq!(names, vec!["src.pkg.inline.Bar", "src.pkg.inline.Bar.run"]);
    let bar = &extracted.elements[0];
    let run = &extracted.elements[1];
    assert_eq!(run.parent.as_deref(), Some(bar.id.as_str()));
    assert_eq!(run.calls, vec!["load".to_string()]);

    // `super` from a mod.rs climbs past the directory it lives in.
    assert_eq!(
        extracted.imports,
        vec![
            ImportRef {
                module: "shared".into(),
                names: vec!["Config".into()],
                level: 2
            },
            ImportRef {
                module: "inline".into(),
                names: vec!["*".into()],
                level: 1
            },
        ]
    );
}
