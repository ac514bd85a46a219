use repograph::indexer::extract::LanguageExtractor;
use repograph::indexer::javascript::{Dialect, JavaScriptExtractor};
use repograph::model::ElementKind;
use repograph::util::module_path_for;

#[test]
fn module_path_from_rel_path() {
    assert_eq!(module_path_for("src/app.js"), "src.app");
    assert_eq!(module_path_for("src/index.js"), "src");
    assert_eq!(module_path_for("index.js"), "index");
}

#[test]
fn extract_elements_and_imports() {
    let source = r#"
import React from "react";
import { foo } from "./lib/foo";

class Base {}

class Foo extends Base {
    constructor() { super(); }
    method(x) { return util(x, foo(x)); }
}

function util(a, b) { return a + b; }

const MAX = 10;

const handler = function (req) {
    return util(req, MAX);
};

util(1, 2);
"#;
    let mut extractor = JavaScriptExtractor::new(Dialect::JavaScript).unwrap();
    let extracted = extractor.extract(source, "src/app.js").unwrap();

    let names: Vec<_> = extracted
        .elements
        .iter()
        .map(|e| (e.kind, e.qualname.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![
            (ElementKind::Class, "src.app.Base"),
            (ElementKind::Class, "src.app.Foo"),
            (ElementKind::Method, "src.app.Foo.constructor"),
            (ElementKind::Method, "src.app.Foo.method"),
            (ElementKind::Function, "src.app.util"),
            (ElementKind::Function, "src.app.handler"),
        ]
    );

    let foo = &extracted.elements[1];
    assert_eq!(foo.bases, vec!["Base".to_string()]);
    let method = &extracted.elements[3];
    assert_eq!(method.parent.as_deref(), Some(foo.id.as_str()));
    assert_eq!(method.calls, vec!["util".to_string(), "foo".to_string()]);
    assert_eq!(extracted.elements[5].calls, vec!["util".to_string()]);
    assert!(extracted.elements.iter().all(|e| e.language == "javascript"));

    assert_eq!(extracted.imports.len(), 2);
    let react = &extracted.imports[0];
    assert_eq!(react.module, "react");
    assert_eq!(react.level, 0);
    assert_eq!(react.names, vec!["default".to_string()]);
    let local = &extracted.imports[1];
    assert_eq!(local.module, "lib.foo");
    assert_eq!(local.level, 1);
    assert_eq!(local.names, vec!["foo".to_string()]);
}

#[test]
fn parent_directory_imports_and_doc_comments() {
    let source = r#"/**
 * Request routing.
 */
import { match } from "../../core/router/index.js";

/**
 * Dispatches one request.
 */
export const dispatch = async (req) => match(req.path);
"#;
    let mut extractor = JavaScriptExtractor::new(Dialect::JavaScript).unwrap();
    let extracted = extractor.extract(source, "web/api/routes.js").unwrap();
    assert_eq!(extracted.docstring.as_deref(), Some("Request routing."));

    let import = &extracted.imports[0];
    assert_eq!(import.module, "core.router");
    assert_eq!(import.level, 3);
    assert_eq!(import.names, vec!["match".to_string()]);

    assert_eq!(extracted.elements.len(), 1);
    let dispatch = &extracted.elements[0];
    assert_eq!(dispatch.kind, ElementKind::Function);
    assert_eq!(dispatch.qualname, "web.api.routes.dispatch");
    assert_eq!(dispatch.calls, vec!["match".to_string()]);
}
