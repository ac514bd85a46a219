use crate::indexer::extract::{
    Container, ExtractedFile, FileScope, LanguageExtractor, collect_calls, last_segment,
    node_text, path_import, push_unique,
};
use crate::model::{CodeElement, ElementKind, ImportRef};
use anyhow::Result;
use tree_sitter::{Node, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Dialect {
    fn language_name(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
        }
    }
}

/// JavaScript, TypeScript and TSX share one extractor; only the grammar differs.
pub struct JavaScriptExtractor {
    parser: Parser,
    dialect: Dialect,
}

impl JavaScriptExtractor {
    pub fn new(dialect: Dialect) -> Result<Self> {
        let mut parser = Parser::new();
        match dialect {
            Dialect::JavaScript => parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?,
            Dialect::TypeScript => {
                parser.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?
            }
            Dialect::Tsx => parser.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())?,
        }
        Ok(Self { parser, dialect })
    }
}

impl LanguageExtractor for JavaScriptExtractor {
    fn extract(&mut self, source: &str, rel_path: &str) -> Result<ExtractedFile> {
        let mut output = ExtractedFile::default();
        let Some(tree) = self.parser.parse(source, None) else {
            return Ok(output);
        };
        let root = tree.root_node();
        let scope = FileScope::new(rel_path, self.dialect.language_name(), source);
        output.docstring = file_doc(root, source);
        walk(root, &scope, &mut output);
        Ok(output)
    }
}

const FUNCTION_DECLARATIONS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
];
const CLASS_DECLARATIONS: &[&str] = &["class_declaration", "abstract_class_declaration"];
const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

fn walk(node: Node<'_>, scope: &FileScope<'_>, output: &mut ExtractedFile) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let kind = child.kind();
        if kind == "import_statement" {
            if let Some(import) = import_statement(child, scope.source) {
                output.imports.push(import);
            }
        } else if CLASS_DECLARATIONS.contains(&kind) {
            handle_class(child, scope, output);
        } else if FUNCTION_DECLARATIONS.contains(&kind) {
            if let Some(name) = child.child_by_field_name("name") {
                let name = node_text(name, scope.source);
                let element = callable(child, child, &name, scope, None);
                output.elements.push(element);
            }
        } else if kind == "lexical_declaration" || kind == "variable_declaration" {
            handle_variables(child, scope, output);
        } else if kind == "interface_declaration" {
            handle_type(child, scope, ElementKind::Interface, output);
        } else if kind == "enum_declaration" {
            handle_type(child, scope, ElementKind::Enum, output);
        } else if kind == "export_statement" || kind == "statement_block" {
            walk(child, scope, output);
        }
    }
}

fn handle_class(node: Node<'_>, scope: &FileScope<'_>, output: &mut ExtractedFile) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, scope.source);
    let qualname = scope.qualname(&[], &name);
    let mut element = scope.element(ElementKind::Class, &name, qualname, node, None);
    element.docstring = doc_comment(node, scope.source);
    element.signature = Some(format!("class {name}"));
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "class_heritage" {
            element.bases = heritage_names(&node_text(child, scope.source));
        }
    }
    let container = Container {
        name: name.clone(),
        id: element.id.clone(),
    };
    output.elements.push(element);

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if member.kind() != "method_definition" {
            continue;
        }
        let Some(method_name) = member.child_by_field_name("name") else {
            continue;
        };
        let method_name = node_text(method_name, scope.source);
        let method = callable(member, member, &method_name, scope, Some(&container));
        output.elements.push(method);
    }
}

/// `const handler = (req) => ...` and friends become functions.
fn handle_variables(node: Node<'_>, scope: &FileScope<'_>, output: &mut ExtractedFile) {
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let (Some(name), Some(value)) = (
            declarator.child_by_field_name("name"),
            declarator.child_by_field_name("value"),
        ) else {
            continue;
        };
        if name.kind() != "identifier" || !FUNCTION_VALUES.contains(&value.kind()) {
            continue;
        }
        let name = node_text(name, scope.source);
        let mut element = callable(node, value, &name, scope, None);
        element.signature = Some(format!(
            "{name} = {}",
            header_text(value, scope.source).trim_end_matches("=>").trim()
        ));
        output.elements.push(element);
    }
}

fn handle_type(
    node: Node<'_>,
    scope: &FileScope<'_>,
    kind: ElementKind,
    output: &mut ExtractedFile,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, scope.source);
    let qualname = scope.qualname(&[], &name);
    let mut element = scope.element(kind, &name, qualname, node, None);
    element.docstring = doc_comment(node, scope.source);
    element.signature = Some(format!("{} {name}", kind.as_str()));
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "extends_type_clause" {
            element.bases = heritage_names(&node_text(child, scope.source));
        }
    }
    output.elements.push(element);
}

/// Function or method element. `span` is the node whose text is recorded,
/// `function` the node holding parameters and body.
fn callable(
    span: Node<'_>,
    function: Node<'_>,
    name: &str,
    scope: &FileScope<'_>,
    parent: Option<&Container>,
) -> CodeElement {
    let (kind, prefix) = match parent {
        Some(container) => (ElementKind::Method, vec![container.name.clone()]),
        None => (ElementKind::Function, Vec::new()),
    };
    let qualname = scope.qualname(&prefix, name);
    let mut element = scope.element(kind, name, qualname, span, parent);
    element.signature = Some(header_text(function, scope.source));
    element.docstring = doc_comment(span, scope.source);
    element.calls = collect_calls(function, scope.source, "call_expression", &[], &callee_name);
    element
}

fn callee_name(call: Node<'_>, source: &str) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => Some(node_text(function, source)),
        "member_expression" => Some(node_text(function.child_by_field_name("property")?, source)),
        _ => None,
    }
}

fn import_statement(node: Node<'_>, source: &str) -> Option<ImportRef> {
    let spec = node_text(node.child_by_field_name("source")?, source);
    let spec = spec.trim_matches(|ch| ch == '"' || ch == '\'' || ch == '`');
    let mut import = path_import(spec);
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "import_specifier" => {
                if let Some(name) = current.child_by_field_name("name") {
                    push_unique(&mut import.names, node_text(name, source));
                }
                continue;
            }
            "namespace_import" => {
                push_unique(&mut import.names, "*".to_string());
                continue;
            }
            "import_clause" => {
                let mut cursor = current.walk();
                for child in current.named_children(&mut cursor) {
                    if child.kind() == "identifier" {
                        push_unique(&mut import.names, "default".to_string());
                    }
                }
            }
            "string" => continue,
            _ => {}
        }
        let mut cursor = current.walk();
        let children: Vec<Node<'_>> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    Some(import)
}

/// `extends Base<T> implements A, ns.B` -> `Base`, `A`, `B`.
fn heritage_names(text: &str) -> Vec<String> {
    let mut flat = String::with_capacity(text.len());
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => flat.push(' '),
            _ if depth == 0 => flat.push(ch),
            _ => {}
        }
    }
    let mut names = Vec::new();
    for token in flat.split_whitespace() {
        if matches!(token, "extends" | "implements") {
            continue;
        }
        push_unique(&mut names, last_segment(token));
    }
    names
}

fn header_text(node: Node<'_>, source: &str) -> String {
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or_else(|| node.end_byte());
    let header = source.get(node.start_byte()..end).unwrap_or("");
    header.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `/** ... */` block directly above `node` (or above its `export`).
fn doc_comment(node: Node<'_>, source: &str) -> Option<String> {
    let anchor = match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => parent,
        _ => node,
    };
    let comment = anchor.prev_sibling()?;
    if comment.kind() != "comment" {
        return None;
    }
    clean_block_comment(&node_text(comment, source))
}

fn file_doc(root: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = root.walk();
    let first = root.named_children(&mut cursor).next()?;
    if first.kind() != "comment" {
        return None;
    }
    clean_block_comment(&node_text(first, source))
}

fn clean_block_comment(text: &str) -> Option<String> {
    let inner = text.strip_prefix("/**")?.strip_suffix("*/")?;
    let lines: Vec<&str> = inner
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
