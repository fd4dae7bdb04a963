// ABOUTME: Converts a tree-sitter tree into the recursive ParsedNode shape, collecting
// ABOUTME: syntax errors without ever failing the parse itself.
// ABOUTME: Grounded on codegraph-parser/src/visitor.rs's cursor-based DFS and node mapping.

use std::collections::HashMap;

use anamnesis_core::error::AnamnesisError;

use crate::language::{Language, LanguageRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    Module,
    Class,
    Function,
    Method,
    Variable,
    Constant,
    Interface,
    TypeAlias,
    Enum,
    Call,
    Import,
    Block,
    Expression,
    Literal,
    Parameter,
    Other(String),
}

impl NodeType {
    fn from_kind(kind: &str) -> Self {
        match kind {
            "module" | "program" | "source_file" | "translation_unit" => NodeType::Module,
            "class_definition" | "class_declaration" | "struct_item" | "struct_declaration" => NodeType::Class,
            "function_definition" | "function_declaration" | "function_item" | "method_declaration" => {
                if kind.contains("method") {
                    NodeType::Method
                } else {
                    NodeType::Function
                }
            }
            "variable_declaration" | "let_declaration" | "lexical_declaration" => NodeType::Variable,
            "const_item" | "const_declaration" => NodeType::Constant,
            "interface_declaration" | "trait_item" => NodeType::Interface,
            "type_alias" | "type_alias_declaration" | "type_item" => NodeType::TypeAlias,
            "enum_declaration" | "enum_item" => NodeType::Enum,
            "call_expression" | "call" | "method_invocation" => NodeType::Call,
            "import_statement" | "import_from_statement" | "use_declaration" => NodeType::Import,
            "block" | "compound_statement" | "block_statement" | "statement_block" => NodeType::Block,
            "parameters" | "parameter_list" | "formal_parameters" => NodeType::Parameter,
            k if k.ends_with("_expression") => NodeType::Expression,
            k if k.ends_with("_literal") => NodeType::Literal,
            other => NodeType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedNode {
    pub node_type: NodeType,
    pub native_kind: String,
    pub text: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_col: u32,
    pub end_col: u32,
    pub children: Vec<ParsedNode>,
    pub name: Option<String>,
    pub parent_name: Option<String>,
    pub docstring: Option<String>,
    pub decorators: Vec<String>,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_private: bool,
    pub visibility: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl Default for NodeType {
    fn default() -> Self {
        NodeType::Other(String::new())
    }
}

impl ParsedNode {
    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }
}

pub struct ParseContext {
    pub root: ParsedNode,
    pub errors: Vec<String>,
}

const NAME_FIELD_CANDIDATES: &[&str] = &["identifier", "type_identifier", "property_identifier", "name", "field_identifier"];

/// Parses `source` as `language`. Construction of the parser is the only fallible
/// step (`UnsupportedLanguage`); tree-sitter parsing itself is total.
pub fn parse(
    registry: &LanguageRegistry,
    source: &str,
    language: Language,
) -> Result<ParseContext, AnamnesisError> {
    let mut parser = registry.create_parser(language)?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| AnamnesisError::Parse {
            file: String::new(),
            message: "tree-sitter returned no tree".to_string(),
        })?;

    let mut errors = Vec::new();
    let root = convert_node(tree.root_node(), source.as_bytes(), None, &mut errors);
    Ok(ParseContext { root, errors })
}

fn convert_node(
    node: tree_sitter::Node,
    source: &[u8],
    parent_name: Option<&str>,
    errors: &mut Vec<String>,
) -> ParsedNode {
    if node.is_error() || node.kind() == "ERROR" {
        let pos = node.start_position();
        errors.push(format!("Syntax error at line {}, column {}", pos.row + 1, pos.column + 1));
    }

    let text = node.utf8_text(source).unwrap_or("").to_string();
    let name = extract_name(node, source);

    let mut is_async = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if !child.is_named() && child.utf8_text(source).unwrap_or("") == "async" {
            is_async = true;
        }
    }

    let mut metadata = HashMap::new();
    let byte_range = node.byte_range();
    metadata.insert("start_byte".to_string(), byte_range.start.to_string());
    metadata.insert("end_byte".to_string(), byte_range.end.to_string());
    if is_async {
        metadata.insert("is_async".to_string(), "true".to_string());
    }

    let mut children = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        children.push(convert_node(child, source, name.as_deref(), errors));
    }

    let start = node.start_position();
    let end = node.end_position();

    ParsedNode {
        node_type: NodeType::from_kind(node.kind()),
        native_kind: node.kind().to_string(),
        text,
        start_line: start.row as u32 + 1,
        end_line: end.row as u32 + 1,
        start_col: start.column as u32 + 1,
        end_col: end.column as u32 + 1,
        children,
        name,
        parent_name: parent_name.map(str::to_string),
        docstring: None,
        decorators: Vec::new(),
        parameters: Vec::new(),
        return_type: None,
        is_async,
        is_static: false,
        is_private: false,
        visibility: None,
        metadata,
    }
}

fn extract_name(node: tree_sitter::Node, source: &[u8]) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return name_node.utf8_text(source).ok().map(str::to_string);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if NAME_FIELD_CANDIDATES.contains(&child.kind()) {
            return child.utf8_text(source).ok().map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_valid_rust_produces_no_errors() {
        let registry = LanguageRegistry::new();
        let ctx = parse(&registry, "fn main() {}", Language::Rust).unwrap();
        assert!(ctx.errors.is_empty());
        assert_eq!(ctx.root.node_type, NodeType::Module);
    }

    #[test]
    fn malformed_source_still_yields_a_valid_root_with_error_entries() {
        let registry = LanguageRegistry::new();
        let ctx = parse(&registry, "fn main( {{{ ???", Language::Rust).unwrap();
        assert!(!ctx.errors.is_empty());
        assert_eq!(ctx.root.native_kind, "source_file");
    }

    #[test]
    fn function_name_is_extracted() {
        let registry = LanguageRegistry::new();
        let ctx = parse(&registry, "fn hello() {}", Language::Rust).unwrap();
        let function = ctx
            .root
            .children
            .iter()
            .find(|n| n.native_kind == "function_item")
            .unwrap();
        assert_eq!(function.name.as_deref(), Some("hello"));
    }

    #[test]
    fn line_count_is_inclusive() {
        let registry = LanguageRegistry::new();
        let ctx = parse(&registry, "fn a() {\n  let x = 1;\n}", Language::Rust).unwrap();
        let function = ctx.root.children.first().unwrap();
        assert_eq!(function.line_count(), function.end_line - function.start_line + 1);
    }

    #[test]
    fn async_keyword_is_reflected_on_enclosing_node() {
        let registry = LanguageRegistry::new();
        let ctx = parse(&registry, "async fn go() {}", Language::Rust).unwrap();
        let function = ctx.root.children.first().unwrap();
        assert!(function.is_async);
        assert_eq!(function.metadata.get("is_async"), Some(&"true".to_string()));
    }
}
