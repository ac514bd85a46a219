use crate::indexer::extract::{
    Container, ExtractedFile, FileScope, LanguageExtractor, collect_calls, last_segment,
    node_text, push_unique,
};
use crate::model::{ElementKind, ImportRef};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Node, Parser};

pub struct RustExtractor {
    parser: Parser,
}

impl RustExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_rust::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

/// `impl` blocks can precede the type they extend, so methods and trait
/// impls are attached once the whole file has been walked.
#[derive(Default)]
struct Pending {
    /// (element index, qualname of the implementing type)
    methods: Vec<(usize, String)>,
    /// (qualname of the implementing type, trait name)
    impls: Vec<(String, String)>,
}

impl LanguageExtractor for RustExtractor {
    fn extract(&mut self, source: &str, rel_path: &str) -> Result<ExtractedFile> {
        let mut output = ExtractedFile::default();
        let Some(tree) = self.parser.parse(source, None) else {
            return Ok(output);
        };
        let root = tree.root_node();
        let scope = FileScope::new(rel_path, "rust", source);
        output.docstring = inner_doc(root, source);
        let mut pending = Pending::default();
        walk_items(root, &scope, &[], &mut pending, &mut output);
        attach_impls(&mut output, pending);
        Ok(output)
    }
}

fn walk_items(
    node: Node<'_>,
    scope: &FileScope<'_>,
    prefix: &[String],
    pending: &mut Pending,
    output: &mut ExtractedFile,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "function_item" => {
                let element = function_element(child, scope, prefix, None, ElementKind::Function);
                if let Some(element) = element {
                    output.elements.push(element);
                }
            }
            "struct_item" | "enum_item" | "union_item" => {
                let kind = if child.kind() == "enum_item" {
                    ElementKind::Enum
                } else {
                    ElementKind::Struct
                };
                if let Some(element) = type_element(child, scope, prefix, kind) {
                    output.elements.push(element);
                }
            }
            "trait_item" => handle_trait(child, scope, prefix, output),
            "impl_item" => handle_impl(child, scope, prefix, pending, output),
            "mod_item" => {
                let (Some(name), Some(body)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("body"),
                ) else {
                    continue;
                };
                let mut nested = prefix.to_vec();
                nested.push(node_text(name, scope.source));
                walk_items(body, scope, &nested, pending, output);
            }
            "use_declaration" => {
                let is_mod_root = is_module_root(scope.rel_path);
                for path in parse_use_declaration(&node_text(child, scope.source)) {
                    if let Some(import) = use_path_to_import(&path, is_mod_root) {
                        output.imports.push(import);
                    }
                }
            }
            _ => {}
        }
    }
}

fn type_element(
    node: Node<'_>,
    scope: &FileScope<'_>,
    prefix: &[String],
    kind: ElementKind,
) -> Option<crate::model::CodeElement> {
    let name = node_text(node.child_by_field_name("name")?, scope.source);
    let qualname = scope.qualname(prefix, &name);
    let mut element = scope.element(kind, &name, qualname, node, None);
    element.signature = Some(header_text(node, scope.source));
    element.docstring = outer_doc(node, scope.source);
    Some(element)
}

fn function_element(
    node: Node<'_>,
    scope: &FileScope<'_>,
    prefix: &[String],
    parent: Option<&Container>,
    kind: ElementKind,
) -> Option<crate::model::CodeElement> {
    let name = node_text(node.child_by_field_name("name")?, scope.source);
    let qualname = scope.qualname(prefix, &name);
    let mut element = scope.element(kind, &name, qualname, node, parent);
    element.signature = Some(header_text(node, scope.source));
    element.docstring = outer_doc(node, scope.source);
    element.calls = collect_calls(node, scope.source, "call_expression", &[], &callee_name);
    Some(element)
}

fn handle_trait(
    node: Node<'_>,
    scope: &FileScope<'_>,
    prefix: &[String],
    output: &mut ExtractedFile,
) {
    let Some(mut element) = type_element(node, scope, prefix, ElementKind::Interface) else {
        return;
    };
    if let Some(bounds) = node.child_by_field_name("bounds") {
        let mut cursor = bounds.walk();
        for bound in bounds.named_children(&mut cursor) {
            push_unique(&mut element.bases, last_segment(&node_text(bound, scope.source)));
        }
    }
    let container = Container {
        name: element.name.clone(),
        id: element.id.clone(),
    };
    output.elements.push(element);

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut nested = prefix.to_vec();
    nested.push(container.name.clone());
    let mut cursor = body.walk();
    for item in body.named_children(&mut cursor) {
        if item.kind() != "function_item" {
            continue;
        }
        if let Some(method) =
            function_element(item, scope, &nested, Some(&container), ElementKind::Method)
        {
            output.elements.push(method);
        }
    }
}

fn handle_impl(
    node: Node<'_>,
    scope: &FileScope<'_>,
    prefix: &[String],
    pending: &mut Pending,
    output: &mut ExtractedFile,
) {
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    let type_name = last_segment(&node_text(type_node, scope.source));
    if type_name.is_empty() {
        return;
    }
    let type_qualname = scope.qualname(prefix, &type_name);
    if let Some(trait_node) = node.child_by_field_name("trait") {
        let trait_name = last_segment(&node_text(trait_node, scope.source));
        if !trait_name.is_empty() {
            pending.impls.push((type_qualname.clone(), trait_name));
        }
    }

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut nested = prefix.to_vec();
    nested.push(type_name);
    let mut cursor = body.walk();
    for item in body.named_children(&mut cursor) {
        if item.kind() != "function_item" {
            continue;
        }
        if let Some(method) = function_element(item, scope, &nested, None, ElementKind::Method) {
            pending.methods.push((output.elements.len(), type_qualname.clone()));
            output.elements.push(method);
        }
    }
}

fn attach_impls(output: &mut ExtractedFile, pending: Pending) {
    let types: HashMap<String, String> = output
        .elements
        .iter()
        .filter(|element| element.kind.is_type())
        .map(|element| (element.qualname.clone(), element.id.clone()))
        .collect();
    for (index, type_qualname) in pending.methods {
        if let Some(id) = types.get(&type_qualname) {
            output.elements[index].parent = Some(id.clone());
        }
    }
    for (type_qualname, trait_name) in pending.impls {
        if let Some(element) = output
            .elements
            .iter_mut()
            .find(|element| element.kind.is_type() && element.qualname == type_qualname)
        {
            push_unique(&mut element.bases, trait_name);
        }
    }
}

fn callee_name(call: Node<'_>, source: &str) -> Option<String> {
    let mut function = call.child_by_field_name("function")?;
    if function.kind() == "generic_function" {
        function = function.child_by_field_name("function")?;
    }
    let name = match function.kind() {
        "identifier" => node_text(function, source),
        "field_expression" => node_text(function.child_by_field_name("field")?, source),
        "scoped_identifier" => node_text(function.child_by_field_name("name")?, source),
        _ => return None,
    };
    Some(name)
}

/// Declaration text up to the body: `pub fn run(&self) -> Result<()>`.
fn header_text(node: Node<'_>, source: &str) -> String {
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or_else(|| node.end_byte());
    let header = source.get(node.start_byte()..end).unwrap_or("");
    header.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `///` lines directly above an item (attributes may sit in between).
fn outer_doc(node: Node<'_>, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        match sibling.kind() {
            "attribute_item" => {}
            "line_comment" => {
                let text = node_text(sibling, source);
                let Some(doc) = text.strip_prefix("///") else {
                    break;
                };
                lines.push(doc.trim().to_string());
            }
            _ => break,
        }
        current = sibling.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

/// Leading `//!` lines of a file.
fn inner_doc(root: Node<'_>, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "line_comment" {
            break;
        }
        let text = node_text(child, source);
        let Some(doc) = text.strip_prefix("//!") else {
            break;
        };
        lines.push(doc.trim().to_string());
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn is_module_root(rel_path: &str) -> bool {
    matches!(
        Path::new(rel_path).file_name().and_then(|name| name.to_str()),
        Some("mod.rs" | "lib.rs" | "main.rs")
    )
}

/// `crate::graph::CodeGraph` -> module `graph`, name `CodeGraph`;
/// `super::util::*` -> level 1 (or 2 from a module root), module `util`, name `*`.
fn use_path_to_import(path: &str, is_mod_root: bool) -> Option<ImportRef> {
    let mut segments: Vec<&str> = path
        .split("::")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let mut level = 0u32;
    match segments.first() {
        Some(&"crate") => {
            segments.remove(0);
        }
        Some(&"self") => {
            segments.remove(0);
            level = 1;
        }
        Some(&"super") => {
            let supers = segments.iter().take_while(|s| **s == "super").count();
            segments.drain(..supers);
            level = supers as u32 + u32::from(is_mod_root);
        }
        _ => {}
    }
    let name = segments.pop()?;
    Some(ImportRef {
        module: segments.join("."),
        names: vec![name.to_string()],
        level,
    })
}

fn parse_use_declaration(text: &str) -> Vec<String> {
    let cleaned = text.replace('\n', " ");
    let cleaned = cleaned.trim().trim_end_matches(';');
    let rest = cleaned
        .split_once("use ")
        .map(|(_, rest)| rest)
        .unwrap_or(cleaned)
        .trim();
    if rest.is_empty() {
        return Vec::new();
    }
    expand_use_tree(rest)
}

fn expand_use_tree(input: &str) -> Vec<String> {
    let input = input.trim();
    if input.is_empty() {
        return Vec::new();
    }
    if let Some((before, inner)) = split_outer_braces(input) {
        let base = before.trim().trim_end_matches("::").trim();
        return split_top_level(inner, ',')
            .into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .flat_map(|item| {
                if base.is_empty() {
                    expand_use_tree(item)
                } else {
                    expand_use_tree(&format!("{base}::{item}"))
                }
            })
            .collect();
    }
    let main = input
        .split_once(" as ")
        .map(|(left, _)| left.trim())
        .unwrap_or(input);
    let main = main.trim_end_matches("::self");
    if main.is_empty() {
        Vec::new()
    } else {
        vec![main.to_string()]
    }
}

fn split_outer_braces(input: &str) -> Option<(&str, &str)> {
    let start = input.find('{')?;
    let mut depth = 0usize;
    for (idx, ch) in input[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&input[..start], &input[start + 1..start + idx]));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(input: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if ch == delimiter && depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}
