// ABOUTME: Extracts ExtractedImport records from import/use statements in a parsed tree.
// ABOUTME: Grounded on extractor_utils.rs's node-text/child-by-kind idiom; per-statement
// ABOUTME: shape is regex-parsed from the statement's own source text rather than walked
// ABOUTME: field-by-field, since import grammar shapes vary widely per language.

use once_cell::sync::Lazy;
use regex::Regex;

use anamnesis_parser::{Language, ParsedNode};

use crate::stdlib::is_stdlib;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Import,
    FromImport,
    ImportAlias,
    StarImport,
    Relative,
    Dynamic,
    TypeOnly,
}

#[derive(Debug, Clone)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedName {
    pub fn local_name(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedImport {
    pub module: String,
    pub names: Vec<ImportedName>,
    pub kind: ImportKind,
    pub is_relative: bool,
    pub relative_level: u32,
    pub is_stdlib: bool,
    pub start_line: u32,
    pub end_line: u32,
}

pub fn extract_imports(root: &ParsedNode, language: Language) -> Vec<ExtractedImport> {
    anamnesis_parser::walk(root)
        .into_iter()
        .filter_map(|node| parse_import_node(node, language))
        .collect()
}

fn parse_import_node(node: &ParsedNode, language: Language) -> Option<ExtractedImport> {
    match language {
        Language::Python => parse_python(node),
        Language::Rust => parse_rust(node),
        Language::Go => parse_go(node),
        Language::TypeScript | Language::Tsx | Language::JavaScript => parse_js(node, language),
        _ => None,
    }
}

fn finish(module: &str, names: Vec<ImportedName>, kind: ImportKind, language: Language, node: &ParsedNode) -> ExtractedImport {
    let is_relative = module.starts_with('.');
    let relative_level = module.chars().take_while(|c| *c == '.').count() as u32;
    ExtractedImport {
        module: module.to_string(),
        is_stdlib: !is_relative && is_stdlib(language, module),
        names,
        kind,
        is_relative,
        relative_level,
        start_line: node.start_line,
        end_line: node.end_line,
    }
}

static PY_IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^import\s+(.+)$").unwrap());
static PY_FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^from\s+(\S+)\s+import\s+(.+)$").unwrap());
static NAME_AS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\S+)\s+as\s+(\S+)$").unwrap());

fn parse_python(node: &ParsedNode) -> Option<ExtractedImport> {
    let text = node.text.trim();
    if let Some(caps) = PY_FROM.captures(text) {
        let module = caps[1].to_string();
        let names_part = caps[2].trim();
        if names_part == "*" {
            return Some(finish(&module, Vec::new(), ImportKind::StarImport, Language::Python, node));
        }
        let names = split_names(names_part);
        let kind = if module.starts_with('.') { ImportKind::Relative } else { ImportKind::FromImport };
        return Some(finish(&module, names, kind, Language::Python, node));
    }
    if let Some(caps) = PY_IMPORT.captures(text) {
        let spec = caps[1].trim();
        let first = spec.split(',').next().unwrap_or(spec).trim();
        if let Some(name_caps) = NAME_AS.captures(first) {
            let module = name_caps[1].to_string();
            let name = ImportedName { name: name_caps[1].to_string(), alias: Some(name_caps[2].to_string()) };
            return Some(finish(&module, vec![name], ImportKind::ImportAlias, Language::Python, node));
        }
        return Some(finish(first, Vec::new(), ImportKind::Import, Language::Python, node));
    }
    None
}

fn split_names(part: &str) -> Vec<ImportedName> {
    part.trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            if let Some(caps) = NAME_AS.captures(entry) {
                ImportedName { name: caps[1].to_string(), alias: Some(caps[2].to_string()) }
            } else {
                ImportedName { name: entry.to_string(), alias: None }
            }
        })
        .collect()
}

fn parse_rust(node: &ParsedNode) -> Option<ExtractedImport> {
    if node.native_kind != "use_declaration" {
        return None;
    }
    let text = node.text.trim().trim_start_matches("pub").trim().trim_start_matches("use").trim();
    let text = text.trim_end_matches(';').trim();
    if text.ends_with("::*") {
        let module = text.trim_end_matches("::*").to_string();
        return Some(finish(&module, Vec::new(), ImportKind::StarImport, Language::Rust, node));
    }
    if let Some(brace_pos) = text.find("::{") {
        let module = text[..brace_pos].to_string();
        let names = split_names(&text[brace_pos + 3..text.rfind('}').unwrap_or(text.len())]);
        return Some(finish(&module, names, ImportKind::FromImport, Language::Rust, node));
    }
    if let Some(caps) = NAME_AS.captures(text) {
        let module = caps[1].to_string();
        let name = ImportedName { name: caps[1].to_string(), alias: Some(caps[2].to_string()) };
        return Some(finish(&module, vec![name], ImportKind::ImportAlias, Language::Rust, node));
    }
    Some(finish(text, Vec::new(), ImportKind::Import, Language::Rust, node))
}

fn parse_go(node: &ParsedNode) -> Option<ExtractedImport> {
    if node.native_kind != "import_spec" {
        return None;
    }
    let text = node.text.trim().trim_matches('"').to_string();
    Some(finish(&text, Vec::new(), ImportKind::Import, Language::Go, node))
}

static JS_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^import\s+(type\s+)?(.+?)\s+from\s+['"](.+?)['"];?$"#).unwrap()
});
static JS_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^import\s+['"](.+?)['"];?$"#).unwrap());

fn parse_js(node: &ParsedNode, language: Language) -> Option<ExtractedImport> {
    if node.native_kind == "call_expression" && node.text.trim_start().starts_with("import(") {
        let module = node
            .text
            .split(['(', ')'])
            .nth(1)
            .unwrap_or("")
            .trim_matches(|c| c == '\'' || c == '"')
            .to_string();
        return Some(finish(&module, Vec::new(), ImportKind::Dynamic, language, node));
    }
    if node.native_kind != "import_statement" {
        return None;
    }
    let text = node.text.trim();
    if let Some(caps) = JS_BARE.captures(text) {
        return Some(finish(&caps[1].clone(), Vec::new(), ImportKind::Import, language, node));
    }
    let caps = JS_FROM.captures(text)?;
    let is_type_only = caps.get(1).is_some();
    let clause = caps[2].trim();
    let module = caps[3].to_string();

    if clause.starts_with('*') {
        return Some(finish(&module, Vec::new(), ImportKind::StarImport, language, node));
    }
    if let Some(brace_start) = clause.find('{') {
        let inner = &clause[brace_start + 1..clause.rfind('}').unwrap_or(clause.len())];
        let names = split_names(inner);
        let kind = if is_type_only { ImportKind::TypeOnly } else { ImportKind::FromImport };
        return Some(finish(&module, names, kind, language, node));
    }
    let names = vec![ImportedName { name: clause.to_string(), alias: None }];
    Some(finish(&module, names, ImportKind::ImportAlias, language, node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnesis_parser::{parse, LanguageRegistry};

    fn imports_for(source: &str, language: Language) -> Vec<ExtractedImport> {
        let registry = LanguageRegistry::new();
        let ctx = parse(&registry, source, language).unwrap();
        extract_imports(&ctx.root, language)
    }

    #[test]
    fn python_from_import_round_trips_with_is_stdlib() {
        let imports = imports_for("from collections import defaultdict, Counter\n", Language::Python);
        assert_eq!(imports.len(), 1);
        let imp = &imports[0];
        assert_eq!(imp.module, "collections");
        assert_eq!(imp.kind, ImportKind::FromImport);
        assert!(imp.is_stdlib);
        assert_eq!(imp.names.len(), 2);
        assert_eq!(imp.names[0].name, "defaultdict");
    }

    #[test]
    fn python_relative_import_reports_dot_level() {
        let imports = imports_for("from ..pkg import thing\n", Language::Python);
        let imp = &imports[0];
        assert!(imp.is_relative);
        assert_eq!(imp.relative_level, 2);
    }

    #[test]
    fn python_star_import_has_no_names() {
        let imports = imports_for("from os import *\n", Language::Python);
        let imp = &imports[0];
        assert_eq!(imp.kind, ImportKind::StarImport);
        assert!(imp.names.is_empty());
    }

    #[test]
    fn rust_use_with_braces_and_alias_resolves_local_names() {
        let imports = imports_for("use std::collections::{HashMap, HashSet as Set};\n", Language::Rust);
        let imp = &imports[0];
        assert_eq!(imp.module, "std::collections");
        assert!(imp.is_stdlib);
        let set_name = imp.names.iter().find(|n| n.name == "HashSet").unwrap();
        assert_eq!(set_name.local_name(), "Set");
    }

    #[test]
    fn js_named_import_with_alias() {
        let imports = imports_for("import { foo as bar } from \"./mod\";\n", Language::JavaScript);
        let imp = &imports[0];
        assert!(imp.is_relative);
        assert_eq!(imp.names[0].local_name(), "bar");
    }
}
