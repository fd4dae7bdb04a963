// ABOUTME: Extracts ExtractedSymbol records (classes, functions, methods, variables,
// ABOUTME: constants, interfaces, type aliases, enums, lambdas) from a parsed tree.
// ABOUTME: Grounded on codegraph-parser/src/languages/{python,javascript,go,rust}.rs shape.

use anamnesis_parser::{Language, NodeType, ParsedNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    Variable,
    Constant,
    Interface,
    TypeAlias,
    Enum,
    Lambda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

#[derive(Debug, Clone)]
pub struct ExtractedSymbol {
    pub kind: SymbolKind,
    pub name: String,
    pub qualified_name: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub is_async: bool,
    pub visibility: Visibility,
    pub decorators: Vec<String>,
    pub modifiers: Vec<String>,
    pub is_exported: bool,
    pub docstring: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SymbolExtractionOptions {
    pub include_private: bool,
    pub include_body: bool,
}

impl Default for SymbolExtractionOptions {
    fn default() -> Self {
        Self { include_private: true, include_body: false }
    }
}

struct Ctx<'a> {
    language: Language,
    file_path: &'a str,
    options: &'a SymbolExtractionOptions,
    scope: Vec<String>,
    inside_class: bool,
    inside_function: bool,
    out: Vec<ExtractedSymbol>,
}

/// Language-specific extractors exist only in the sense that visibility/export/docstring
/// heuristics branch on `language`; the traversal itself is shared (§4.2's "Python,
/// TypeScript/JavaScript (shared), Go, Rust" specialization, generic elsewhere).
pub fn extract_symbols(
    root: &ParsedNode,
    language: Language,
    file_path: &str,
    options: &SymbolExtractionOptions,
) -> Vec<ExtractedSymbol> {
    let mut ctx = Ctx {
        language,
        file_path,
        options,
        scope: Vec::new(),
        inside_class: false,
        inside_function: false,
        out: Vec::new(),
    };
    walk(root, &mut ctx, Vec::new(), false);
    if options.include_private {
        ctx.out
    } else {
        ctx.out.into_iter().filter(|s| s.visibility != Visibility::Private).collect()
    }
}

fn walk(node: &ParsedNode, ctx: &mut Ctx, decorators: Vec<String>, forced_export: bool) {
    match node.native_kind.as_str() {
        "decorated_definition" => {
            let new_decorators: Vec<String> = node
                .children
                .iter()
                .filter(|c| c.native_kind == "decorator")
                .map(|c| c.text.trim_start_matches('@').trim().to_string())
                .collect();
            for child in &node.children {
                if child.native_kind != "decorator" {
                    walk(child, ctx, new_decorators.clone(), forced_export);
                }
            }
            return;
        }
        "export_statement" => {
            for child in &node.children {
                walk(child, ctx, decorators.clone(), true);
            }
            return;
        }
        _ => {}
    }

    let kind = classify(node);

    if let Some(kind) = kind {
        let effective_kind = if kind == SymbolKind::Function && ctx.inside_class {
            SymbolKind::Method
        } else {
            kind
        };

        let skip_as_local = matches!(effective_kind, SymbolKind::Variable | SymbolKind::Constant) && ctx.inside_function;

        if !skip_as_local {
            let name = node.name.clone().unwrap_or_else(|| "<anonymous>".to_string());
            let qualified_name = if ctx.scope.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", ctx.scope.join("."), name)
            };

            let visibility = compute_visibility(ctx.language, node, &name);
            let is_exported = compute_is_exported(ctx.language, &name, forced_export, visibility);
            let docstring = extract_docstring(ctx.language, node);
            let modifiers = extract_modifiers(ctx.language, node);

            ctx.out.push(ExtractedSymbol {
                kind: effective_kind,
                name: name.clone(),
                qualified_name,
                file_path: ctx.file_path.to_string(),
                start_line: node.start_line,
                end_line: node.end_line,
                is_async: node.is_async,
                visibility,
                decorators,
                modifiers,
                is_exported,
                docstring,
                body: if ctx.options.include_body { Some(node.text.clone()) } else { None },
            });

            let pushed_scope = matches!(effective_kind, SymbolKind::Class | SymbolKind::Function | SymbolKind::Method | SymbolKind::Interface | SymbolKind::Enum);
            if pushed_scope {
                ctx.scope.push(name);
            }
            let was_class = ctx.inside_class;
            let was_function = ctx.inside_function;
            if effective_kind == SymbolKind::Class {
                ctx.inside_class = true;
            }
            if matches!(effective_kind, SymbolKind::Function | SymbolKind::Method | SymbolKind::Lambda) {
                ctx.inside_function = true;
            }

            for child in &node.children {
                walk(child, ctx, Vec::new(), false);
            }

            ctx.inside_class = was_class;
            ctx.inside_function = was_function;
            if pushed_scope {
                ctx.scope.pop();
            }
            return;
        }
    }

    for child in &node.children {
        walk(child, ctx, Vec::new(), false);
    }
}

fn classify(node: &ParsedNode) -> Option<SymbolKind> {
    if node.native_kind == "lambda" || node.native_kind == "arrow_function" {
        return Some(SymbolKind::Lambda);
    }
    match node.node_type {
        NodeType::Class => Some(SymbolKind::Class),
        NodeType::Function => Some(SymbolKind::Function),
        NodeType::Method => Some(SymbolKind::Method),
        NodeType::Variable => Some(SymbolKind::Variable),
        NodeType::Constant => Some(SymbolKind::Constant),
        NodeType::Interface => Some(SymbolKind::Interface),
        NodeType::TypeAlias => Some(SymbolKind::TypeAlias),
        NodeType::Enum => Some(SymbolKind::Enum),
        _ => None,
    }
}

fn compute_visibility(language: Language, node: &ParsedNode, name: &str) -> Visibility {
    match language {
        Language::Python => {
            if name.starts_with("__") && name.ends_with("__") {
                Visibility::Public
            } else if name.starts_with('_') {
                Visibility::Private
            } else {
                Visibility::Public
            }
        }
        Language::Go => {
            if name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
                Visibility::Public
            } else {
                Visibility::Private
            }
        }
        Language::Rust => {
            let trimmed = node.text.trim_start();
            if trimmed.starts_with("pub(crate)") || trimmed.starts_with("pub(super)") {
                Visibility::Protected
            } else if trimmed.starts_with("pub") {
                Visibility::Public
            } else {
                Visibility::Private
            }
        }
        Language::TypeScript | Language::Tsx | Language::JavaScript => {
            let first_line = node.text.lines().next().unwrap_or("");
            if first_line.contains("private") {
                Visibility::Private
            } else if first_line.contains("protected") {
                Visibility::Protected
            } else {
                Visibility::Public
            }
        }
        _ => Visibility::Public,
    }
}

fn compute_is_exported(language: Language, name: &str, forced_export: bool, visibility: Visibility) -> bool {
    match language {
        Language::Go => name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false),
        Language::TypeScript | Language::Tsx | Language::JavaScript => forced_export,
        Language::Rust => visibility == Visibility::Public,
        _ => forced_export,
    }
}

const MODIFIER_KEYWORDS: &[&str] = &["public", "private", "protected", "static", "final", "abstract", "readonly", "async", "override"];

fn extract_modifiers(language: Language, node: &ParsedNode) -> Vec<String> {
    if !matches!(language, Language::Java | Language::TypeScript | Language::Tsx) {
        return Vec::new();
    }
    let first_line = node.text.lines().next().unwrap_or("");
    MODIFIER_KEYWORDS
        .iter()
        .filter(|kw| first_line.split_whitespace().any(|tok| tok == **kw))
        .map(|kw| kw.to_string())
        .collect()
}

/// Only Python docstrings are detected (first string-literal statement in the body),
/// matching spec.md's worked example; other languages return `None` rather than guess
/// at a block-comment heuristic with no grounded test fixture.
fn extract_docstring(language: Language, node: &ParsedNode) -> Option<String> {
    if language != Language::Python {
        return None;
    }
    let block = node.children.iter().find(|c| c.native_kind == "block")?;
    let first_stmt = block.children.first()?;
    if first_stmt.native_kind != "expression_statement" {
        return None;
    }
    let string_node = first_stmt.children.first()?;
    if string_node.native_kind != "string" {
        return None;
    }
    Some(string_node.text.trim_matches(|c| c == '"' || c == '\'').to_string())
}
