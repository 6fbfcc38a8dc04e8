//! Tree-sitter symbol extraction

use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Node, Parser};

use crate::scanner::language_for;
use crate::types::{Symbol, SymbolKind};

/// Structure signatures longer than this are truncated; the sequence ratio
/// comparison is quadratic in signature length.
const MAX_STRUCTURE_NODES: usize = 512;

/// Extracts functions, methods and classes from source text.
pub struct SymbolExtractor {
    rust_parser: Option<Parser>,
    python_parser: Option<Parser>,
    typescript_parser: Option<Parser>,
    javascript_parser: Option<Parser>,
}

impl SymbolExtractor {
    pub fn new() -> Self {
        Self {
            rust_parser: make_parser(tree_sitter_rust::language()),
            python_parser: make_parser(tree_sitter_python::language()),
            typescript_parser: make_parser(tree_sitter_typescript::language_typescript()),
            javascript_parser: make_parser(tree_sitter_typescript::language_tsx()),
        }
    }

    /// Extract symbols spanning at least `min_lines` lines from one file.
    ///
    /// Returns an empty list for unsupported or unparseable content.
    pub fn extract_file(&mut self, content: &str, file_path: &str, min_lines: u32) -> Vec<Symbol> {
        let Some(lang) = language_for(Path::new(file_path)) else {
            return vec![];
        };

        let parser = match lang {
            "rust" => self.rust_parser.as_mut(),
            "python" => self.python_parser.as_mut(),
            "typescript" => self.typescript_parser.as_mut(),
            "javascript" => self.javascript_parser.as_mut(),
            _ => None,
        };
        let Some(parser) = parser else {
            return vec![];
        };

        let tree = match parser.parse(content.as_bytes(), None) {
            Some(t) => t,
            None => {
                tracing::warn!("parse failed for {}", file_path);
                return vec![];
            }
        };

        let lines: Vec<&str> = content.lines().collect();
        let mut ctx = ExtractContext {
            content,
            lines: &lines,
            file_path,
            lang,
            min_lines,
            symbols: Vec::new(),
        };

        match lang {
            "rust" => {
                // first pass collects struct fields so methods carry their
                // owner's field list as comparison context
                let fields = collect_rust_struct_fields(tree.root_node(), content);
                visit_rust(tree.root_node(), &mut ctx, None, &fields);
            }
            "python" => visit_python(tree.root_node(), &mut ctx, None),
            _ => visit_typescript(tree.root_node(), &mut ctx, None),
        }

        ctx.symbols
    }
}

impl Default for SymbolExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn make_parser(language: tree_sitter::Language) -> Option<Parser> {
    let mut parser = Parser::new();
    parser.set_language(&language).ok()?;
    Some(parser)
}

struct ExtractContext<'a> {
    content: &'a str,
    lines: &'a [&'a str],
    file_path: &'a str,
    lang: &'a str,
    min_lines: u32,
    symbols: Vec<Symbol>,
}

impl ExtractContext<'_> {
    fn push(&mut self, node: Node, name: &str, kind: SymbolKind, owner: Option<&str>, context: Option<&str>) {
        let start = node.start_position().row;
        let end = node.end_position().row;
        let span = (end - start + 1) as u32;
        if span < self.min_lines {
            return;
        }

        let mut body = self.lines[start..=end].join("\n");
        if body.trim().is_empty() {
            return;
        }
        if let Some(ctx) = context {
            if !ctx.is_empty() {
                body = format!("{}\n\n{}", ctx, body);
            }
        }

        let qualified_name = match owner {
            Some(o) => format!("{}:{}::{}::{}", self.lang, self.file_path, o, name),
            None => format!("{}:{}::{}", self.lang, self.file_path, name),
        };

        self.symbols.push(Symbol {
            qualified_name,
            name: name.to_string(),
            kind,
            file_path: self.file_path.to_string(),
            language: self.lang.to_string(),
            range_start: start as u32 + 1,
            range_end: end as u32 + 1,
            body,
            structure: structure_signature(node),
        });
    }
}

/// Depth-first node-kind signature of a subtree, named nodes only.
fn structure_signature(node: Node) -> Vec<String> {
    let mut sig = Vec::new();
    collect_signature(node, &mut sig);
    sig
}

fn collect_signature(node: Node, sig: &mut Vec<String>) {
    if sig.len() >= MAX_STRUCTURE_NODES {
        return;
    }
    if node.is_named() {
        sig.push(node.kind().to_string());
    }
    for child in node.children(&mut node.walk()) {
        collect_signature(child, sig);
    }
}

fn field_name<'a>(node: Node, content: &'a str) -> Option<&'a str> {
    node.child_by_field_name("name")
        .map(|n| &content[n.byte_range()])
}

fn collect_rust_struct_fields(node: Node, content: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    collect_rust_structs(node, content, &mut fields);
    fields
}

fn collect_rust_structs(node: Node, content: &str, fields: &mut HashMap<String, String>) {
    if node.kind() == "struct_item" {
        if let Some(name) = field_name(node, content) {
            let mut decls = Vec::new();
            for child in node.children(&mut node.walk()) {
                if child.kind() == "field_declaration_list" {
                    for field in child.children(&mut child.walk()) {
                        if field.kind() == "field_declaration" {
                            decls.push(content[field.byte_range()].to_string());
                        }
                    }
                }
            }
            if !decls.is_empty() {
                fields.insert(
                    name.to_string(),
                    format!("// Struct fields:\n{}", decls.join("\n")),
                );
            }
        }
    }
    for child in node.children(&mut node.walk()) {
        collect_rust_structs(child, content, fields);
    }
}

fn visit_rust(
    node: Node,
    ctx: &mut ExtractContext,
    impl_name: Option<&str>,
    struct_fields: &HashMap<String, String>,
) {
    match node.kind() {
        "function_item" => {
            let name = field_name(node, ctx.content).unwrap_or("unknown").to_string();
            let kind = if impl_name.is_some() {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            };
            let context = impl_name.and_then(|n| struct_fields.get(n).map(String::as_str));
            ctx.push(node, &name, kind, impl_name, context);
        }
        "impl_item" => {
            let type_name = node
                .children(&mut node.walk())
                .find(|c| c.kind() == "type_identifier")
                .map(|c| ctx.content[c.byte_range()].to_string());
            for child in node.children(&mut node.walk()) {
                if child.kind() == "declaration_list" {
                    for member in child.children(&mut child.walk()) {
                        visit_rust(member, ctx, type_name.as_deref(), struct_fields);
                    }
                }
            }
        }
        _ => {
            for child in node.children(&mut node.walk()) {
                visit_rust(child, ctx, impl_name, struct_fields);
            }
        }
    }
}

fn visit_python(node: Node, ctx: &mut ExtractContext, class_name: Option<&str>) {
    match node.kind() {
        "function_definition" => {
            let name = field_name(node, ctx.content).unwrap_or("unknown").to_string();
            let kind = if class_name.is_some() {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            };
            ctx.push(node, &name, kind, class_name, None);
        }
        "class_definition" => {
            let name = field_name(node, ctx.content).unwrap_or("unknown").to_string();
            ctx.push(node, &name, SymbolKind::Class, None, None);
            if let Some(body) = node.child_by_field_name("body") {
                for member in body.children(&mut body.walk()) {
                    visit_python(member, ctx, Some(&name));
                }
            }
        }
        // decorators wrap the definition node
        "decorated_definition" => {
            for child in node.children(&mut node.walk()) {
                visit_python(child, ctx, class_name);
            }
        }
        _ => {
            for child in node.children(&mut node.walk()) {
                visit_python(child, ctx, class_name);
            }
        }
    }
}

fn visit_typescript(node: Node, ctx: &mut ExtractContext, class_name: Option<&str>) {
    match node.kind() {
        "function_declaration" => {
            let name = field_name(node, ctx.content).unwrap_or("unknown").to_string();
            ctx.push(node, &name, SymbolKind::Function, None, None);
        }
        "method_definition" => {
            let name = field_name(node, ctx.content).unwrap_or("unknown").to_string();
            ctx.push(node, &name, SymbolKind::Method, class_name, None);
        }
        "class_declaration" => {
            let name = field_name(node, ctx.content).unwrap_or("unknown").to_string();
            ctx.push(node, &name, SymbolKind::Class, None, None);
            if let Some(body) = node.child_by_field_name("body") {
                for member in body.children(&mut body.walk()) {
                    visit_typescript(member, ctx, Some(&name));
                }
            }
        }
        _ => {
            for child in node.children(&mut node.walk()) {
                visit_typescript(child, ctx, class_name);
            }
        }
    }
}
