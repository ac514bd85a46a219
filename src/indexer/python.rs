use crate::indexer::extract::{
    Container, ExtractedFile, FileScope, LanguageExtractor, collect_calls, last_segment,
    node_text, push_unique,
};
use crate::model::{ElementKind, ImportRef};
use anyhow::Result;
use tree_sitter::{Node, Parser};

/// Builtins are never graph targets; calls to them are dropped.
const PYTHON_BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "bytes", "callable", "dict", "dir", "enumerate", "filter",
    "float", "format", "getattr", "hasattr", "hash", "id", "int", "isinstance", "issubclass",
    "iter", "len", "list", "map", "max", "min", "next", "object", "open", "print", "range",
    "repr", "reversed", "round", "set", "setattr", "sorted", "str", "sum", "super", "tuple",
    "type", "vars", "zip",
];

pub struct PythonExtractor {
    parser: Parser,
}

impl PythonExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl LanguageExtractor for PythonExtractor {
    fn extract(&mut self, source: &str, rel_path: &str) -> Result<ExtractedFile> {
        let mut output = ExtractedFile::default();
        let Some(tree) = self.parser.parse(source, None) else {
            return Ok(output);
        };
        let root = tree.root_node();
        let scope = FileScope::new(rel_path, "python", source);
        output.docstring = extract_docstring(root, source);
        let mut containers = Vec::new();
        walk_block(root, &scope, &mut containers, &mut output);
        Ok(output)
    }
}

fn walk_block(
    node: Node<'_>,
    scope: &FileScope<'_>,
    containers: &mut Vec<Container>,
    output: &mut ExtractedFile,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, scope, containers, output);
    }
}

fn walk_node(
    node: Node<'_>,
    scope: &FileScope<'_>,
    containers: &mut Vec<Container>,
    output: &mut ExtractedFile,
) {
    match node.kind() {
        "class_definition" => handle_class(node, scope, containers, output),
        "function_definition" => handle_function(node, scope, containers, output),
        "decorated_definition" => {
            if let Some(definition) = node.child_by_field_name("definition") {
                walk_node(definition, scope, containers, output);
            }
        }
        "import_statement" => output.imports.extend(plain_imports(node, scope.source)),
        "import_from_statement" => {
            if let Some(import) = from_import(node, scope.source) {
                output.imports.push(import);
            }
        }
        _ => walk_block(node, scope, containers, output),
    }
}

fn handle_class(
    node: Node<'_>,
    scope: &FileScope<'_>,
    containers: &mut Vec<Container>,
    output: &mut ExtractedFile,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, scope.source);
    let prefix: Vec<String> = containers.iter().map(|c| c.name.clone()).collect();
    let qualname = scope.qualname(&prefix, &name);
    let mut element = scope.element(ElementKind::Class, &name, qualname, node, containers.last());
    element.docstring = node
        .child_by_field_name("body")
        .and_then(|body| extract_docstring(body, scope.source));
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for base in superclasses.named_children(&mut cursor) {
            if base.kind() == "keyword_argument" {
                continue;
            }
            let base = last_segment(&node_text(base, scope.source));
            if base != "object" {
                push_unique(&mut element.bases, base);
            }
        }
    }
    element.signature = Some(format!("class {name}"));
    let container = Container {
        name,
        id: element.id.clone(),
    };
    output.elements.push(element);

    if let Some(body) = node.child_by_field_name("body") {
        containers.push(container);
        walk_block(body, scope, containers, output);
        containers.pop();
    }
}

fn handle_function(
    node: Node<'_>,
    scope: &FileScope<'_>,
    containers: &mut Vec<Container>,
    output: &mut ExtractedFile,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, scope.source);
    let prefix: Vec<String> = containers.iter().map(|c| c.name.clone()).collect();
    let qualname = scope.qualname(&prefix, &name);
    let kind = if containers.is_empty() {
        ElementKind::Function
    } else {
        ElementKind::Method
    };
    let mut element = scope.element(kind, &name, qualname, node, containers.last());
    element.signature = Some(extract_signature(node, &name, scope.source));
    element.docstring = node
        .child_by_field_name("body")
        .and_then(|body| extract_docstring(body, scope.source));
    element.calls = collect_calls(node, scope.source, "call", &["class_definition"], &callee_name);
    // Nested functions fold into their enclosing element.
    output.elements.push(element);
}

fn callee_name(call: Node<'_>, source: &str) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    let name = match function.kind() {
        "identifier" => node_text(function, source),
        "attribute" => node_text(function.child_by_field_name("attribute")?, source),
        _ => return None,
    };
    if PYTHON_BUILTINS.contains(&name.as_str()) {
        return None;
    }
    Some(name)
}

fn extract_signature(node: Node<'_>, name: &str, source: &str) -> String {
    let params = node
        .child_by_field_name("parameters")
        .map(|n| node_text(n, source))
        .unwrap_or_else(|| "()".to_string());
    let prefix = if node_text(node, source).starts_with("async") {
        "async def"
    } else {
        "def"
    };
    match node.child_by_field_name("return_type") {
        Some(ret) => format!("{prefix} {name}{params} -> {}", node_text(ret, source)),
        None => format!("{prefix} {name}{params}"),
    }
}

fn extract_docstring(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let first = node.named_children(&mut cursor).next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string_node = first.named_child(0)?;
    if string_node.kind() != "string" {
        return None;
    }
    let raw = node_text(string_node, source);
    Some(unquote_string_literal(&raw).unwrap_or(raw))
}

fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let prefix_len = trimmed
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_alphabetic())
        .map(|(idx, _)| idx)?;
    let rest = &trimmed[prefix_len..];
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if rest.len() >= quote.len() * 2 && rest.starts_with(quote) && rest.ends_with(quote) {
            let inner = &rest[quote.len()..rest.len() - quote.len()];
            return Some(inner.trim().to_string());
        }
    }
    None
}

/// `import a.b, c as d` -> one reference per module.
fn plain_imports(node: Node<'_>, source: &str) -> Vec<ImportRef> {
    let mut imports = Vec::new();
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let Some(module) = imported_name(name, source) else {
            continue;
        };
        imports.push(ImportRef {
            module,
            names: Vec::new(),
            level: 0,
        });
    }
    imports
}

/// `from ..pkg.mod import a, b as c` -> level 2, module `pkg.mod`, names `a`, `b`.
fn from_import(node: Node<'_>, source: &str) -> Option<ImportRef> {
    let module_node = node.child_by_field_name("module_name")?;
    let raw = node_text(module_node, source);
    let level = raw.chars().take_while(|ch| *ch == '.').count() as u32;
    let module = raw.trim_start_matches('.').to_string();

    let mut names = Vec::new();
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        if let Some(name) = imported_name(name, source) {
            push_unique(&mut names, name);
        }
    }
    let mut cursor = node.walk();
    if node
        .named_children(&mut cursor)
        .any(|child| child.kind() == "wildcard_import")
    {
        push_unique(&mut names, "*".to_string());
    }
    Some(ImportRef {
        module,
        names,
        level,
    })
}

fn imported_name(node: Node<'_>, source: &str) -> Option<String> {
    let target = if node.kind() == "aliased_import" {
        node.child_by_field_name("name")?
    } else {
        node
    };
    let text = node_text(target, source);
    (!text.is_empty()).then_some(text)
}
