use crate::indexer::extract::{
    ExtractedFile, FileScope, LanguageExtractor, collect_calls, last_segment, node_text,
    push_unique,
};
use crate::model::{CodeElement, ElementKind, ImportRef};
use anyhow::Result;
use std::collections::HashMap;
use tree_sitter::{Node, Parser};

pub struct GoExtractor {
    parser: Parser,
}

impl GoExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_go::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl LanguageExtractor for GoExtractor {
    fn extract(&mut self, source: &str, rel_path: &str) -> Result<ExtractedFile> {
        let mut output = ExtractedFile::default();
        let Some(tree) = self.parser.parse(source, None) else {
            return Ok(output);
        };
        let root = tree.root_node();
        let scope = FileScope::new(rel_path, "go", source);
        // (element index, receiver type) for methods; receivers may be declared later.
        let mut receivers = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_clause" => output.docstring = leading_comment(child, source),
                "import_declaration" => collect_imports(child, source, &mut output.imports),
                "function_declaration" => {
                    if let Some(element) = function_element(child, &scope, None) {
                        output.elements.push(element);
                    }
                }
                "method_declaration" => {
                    let receiver = receiver_type(child, source);
                    if let Some(element) = function_element(child, &scope, receiver.as_deref()) {
                        if let Some(receiver) = receiver {
                            receivers.push((output.elements.len(), receiver));
                        }
                        output.elements.push(element);
                    }
                }
                "type_declaration" => {
                    let mut specs = child.walk();
                    for spec in child.named_children(&mut specs) {
                        if spec.kind() == "type_spec" {
                            if let Some(element) = type_element(spec, child, &scope) {
                                output.elements.push(element);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let types: HashMap<String, String> = output
            .elements
            .iter()
            .filter(|element| element.kind.is_type())
            .map(|element| (element.name.clone(), element.id.clone()))
            .collect();
        for (index, receiver) in receivers {
            output.elements[index].parent = types.get(&receiver).cloned();
        }
        Ok(output)
    }
}

fn function_element(
    node: Node<'_>,
    scope: &FileScope<'_>,
    receiver: Option<&str>,
) -> Option<CodeElement> {
    let name = node_text(node.child_by_field_name("name")?, scope.source);
    let (kind, prefix) = match receiver {
        Some(receiver) => (ElementKind::Method, vec![receiver.to_string()]),
        None => (ElementKind::Function, Vec::new()),
    };
    let qualname = scope.qualname(&prefix, &name);
    let mut element = scope.element(kind, &name, qualname, node, None);
    element.signature = Some(header_text(node, scope.source));
    element.docstring = leading_comment(node, scope.source);
    element.calls = collect_calls(node, scope.source, "call_expression", &[], &callee_name);
    Some(element)
}

/// `type_spec` inside `type_declaration`; plain aliases and named
/// non-struct, non-interface types are skipped.
fn type_element(
    spec: Node<'_>,
    declaration: Node<'_>,
    scope: &FileScope<'_>,
) -> Option<CodeElement> {
    let name = node_text(spec.child_by_field_name("name")?, scope.source);
    let type_node = spec.child_by_field_name("type")?;
    let kind = match type_node.kind() {
        "struct_type" => ElementKind::Struct,
        "interface_type" => ElementKind::Interface,
        _ => return None,
    };
    let qualname = scope.qualname(&[], &name);
    let mut element = scope.element(kind, &name, qualname, declaration, None);
    element.signature = Some(format!("type {name} {}", type_node.kind().trim_end_matches("_type")));
    element.docstring = leading_comment(declaration, scope.source);
    element.bases = match kind {
        ElementKind::Struct => embedded_fields(type_node, scope.source),
        _ => embedded_interfaces(type_node, scope.source),
    };
    Some(element)
}

fn embedded_fields(struct_type: Node<'_>, source: &str) -> Vec<String> {
    let mut bases = Vec::new();
    let mut cursor = struct_type.walk();
    for list in struct_type.named_children(&mut cursor) {
        if list.kind() != "field_declaration_list" {
            continue;
        }
        let mut fields = list.walk();
        for field in list.named_children(&mut fields) {
            if field.kind() != "field_declaration" || field.child_by_field_name("name").is_some() {
                continue;
            }
            if let Some(type_node) = field.child_by_field_name("type") {
                push_unique(&mut bases, last_segment(&node_text(type_node, source)));
            }
        }
    }
    bases
}

fn embedded_interfaces(interface_type: Node<'_>, source: &str) -> Vec<String> {
    let mut bases = Vec::new();
    let mut cursor = interface_type.walk();
    for child in interface_type.named_children(&mut cursor) {
        match child.kind() {
            "type_identifier" | "qualified_type" => {
                push_unique(&mut bases, last_segment(&node_text(child, source)));
            }
            "type_elem" => {
                let mut inner = child.walk();
                for ty in child.named_children(&mut inner) {
                    push_unique(&mut bases, last_segment(&node_text(ty, source)));
                }
            }
            _ => {}
        }
    }
    bases
}

fn receiver_type(node: Node<'_>, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    for child in receiver.named_children(&mut cursor) {
        if child.kind() != "parameter_declaration" {
            continue;
        }
        let type_node = child.child_by_field_name("type")?;
        let name = last_segment(&node_text(type_node, source));
        if !name.is_empty() {
            return Some(name);
        }
    }
    None
}

fn callee_name(call: Node<'_>, source: &str) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => Some(node_text(function, source)),
        "selector_expression" => Some(node_text(function.child_by_field_name("field")?, source)),
        _ => None,
    }
}

fn collect_imports(node: Node<'_>, source: &str, imports: &mut Vec<ImportRef>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "import_spec" {
            if let Some(path) = current.child_by_field_name("path") {
                let path = node_text(path, source);
                let path = path.trim_matches(|ch| ch == '"' || ch == '`');
                imports.push(ImportRef {
                    module: path.replace('/', "."),
                    names: Vec::new(),
                    level: 0,
                });
            }
            continue;
        }
        let mut cursor = current.walk();
        let children: Vec<Node<'_>> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

fn header_text(node: Node<'_>, source: &str) -> String {
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or_else(|| node.end_byte());
    let header = source.get(node.start_byte()..end).unwrap_or("");
    header.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Contiguous `//` comment lines directly above `node`.
fn leading_comment(node: Node<'_>, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        if sibling.kind() != "comment" || sibling.end_position().row + 1 != expected_row {
            break;
        }
        let text = node_text(sibling, source);
        let Some(line) = text.strip_prefix("//") else {
            break;
        };
        lines.push(line.trim().to_string());
        expected_row = sibling.start_position().row;
        current = sibling.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}
