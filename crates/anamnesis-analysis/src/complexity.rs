// ABOUTME: Per-function and per-file complexity metrics: cyclomatic, cognitive,
// ABOUTME: Halstead, LOC breakdown, maintainability index, hotspot detection.
// ABOUTME: Cyclomatic decision-point table grounded on codegraph-parser/src/complexity.rs,
// ABOUTME: extended here with cognitive/Halstead/MI per the full specification.

use anamnesis_extract::{ExtractedSymbol, SymbolKind};
use anamnesis_parser::{Language, ParsedNode};

use crate::halstead::{self, HalsteadMetrics};

const DECISION_POINT_KINDS: &[&str] = &[
    "if_expression", "if_statement", "if_let_expression", "elif_clause", "else_if_clause",
    "while_expression", "while_statement", "do_statement",
    "for_expression", "for_statement", "for_in_statement", "for_of_statement", "foreach_statement", "enhanced_for_statement",
    "loop_expression",
    "match_expression", "switch_statement", "switch_expression", "select_statement", "case",
    "conditional_expression", "ternary_expression",
    "catch_clause", "except_clause", "rescue", "match_statement",
    "list_comprehension", "set_comprehension", "dictionary_comprehension", "generator_expression",
];

const FLOW_BREAK_KINDS: &[&str] = &[
    "if_expression", "if_statement", "if_let_expression", "elif_clause", "else_if_clause",
    "while_expression", "while_statement", "do_statement",
    "for_expression", "for_statement", "for_in_statement", "for_of_statement", "foreach_statement", "enhanced_for_statement",
    "loop_expression",
    "match_expression", "switch_statement", "switch_expression", "select_statement",
    "catch_clause", "except_clause", "rescue", "match_statement",
];

const BOOLEAN_CHAIN_KINDS: &[&str] = &["binary_expression", "boolean_operator", "logical_expression"];

#[derive(Debug, Clone)]
pub struct FunctionComplexity {
    pub name: String,
    pub qualified_name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub cyclomatic: u32,
    pub cognitive: u32,
}

#[derive(Debug, Clone)]
pub struct LocBreakdown {
    pub total: u32,
    pub code: u32,
    pub comments: u32,
    pub blank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintainabilityBand {
    A,
    B,
    C,
    D,
    F,
}

impl MaintainabilityBand {
    fn from_index(index: f64) -> Self {
        if index >= 85.0 {
            MaintainabilityBand::A
        } else if index >= 65.0 {
            MaintainabilityBand::B
        } else if index >= 45.0 {
            MaintainabilityBand::C
        } else if index >= 25.0 {
            MaintainabilityBand::D
        } else {
            MaintainabilityBand::F
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileComplexity {
    pub functions: Vec<FunctionComplexity>,
    pub total_cyclomatic: u32,
    pub avg_cyclomatic: f64,
    pub halstead: HalsteadMetrics,
    pub loc: LocBreakdown,
    pub maintainability_index: f64,
    pub maintainability_band: MaintainabilityBand,
    pub hotspots: Vec<FunctionComplexity>,
}

/// 1 (base) + decision points in the subtree. Teacher's original formula, carried
/// forward unchanged.
pub fn cyclomatic_complexity(node: &ParsedNode) -> u32 {
    1 + count_decision_points(node)
}

fn count_decision_points(node: &ParsedNode) -> u32 {
    let mut count = if DECISION_POINT_KINDS.contains(&node.native_kind.as_str()) { 1 } else { 0 };

    if BOOLEAN_CHAIN_KINDS.contains(&node.native_kind.as_str()) {
        count += count_boolean_operators(&node.text);
    }

    for child in &node.children {
        count += count_decision_points(child);
    }
    count
}

fn count_boolean_operators(text: &str) -> u32 {
    (text.matches("&&").count() + text.matches("||").count()) as u32
}

/// Structural-nesting-aware complexity: `+1` per flow break plus `+nesting_level` for
/// each level of nesting; short-circuit chains add one point per additional operand.
/// Recursion never nests because call expressions are not flow-break kinds.
pub fn cognitive_complexity(node: &ParsedNode) -> u32 {
    cognitive_inner(node, 0, "")
}

fn cognitive_inner(node: &ParsedNode, nesting: u32, parent_kind: &str) -> u32 {
    let kind = node.native_kind.as_str();
    let mut total = 0u32;

    let is_flow_break = FLOW_BREAK_KINDS.contains(&kind);
    if is_flow_break {
        total += 1 + nesting;
    }

    if BOOLEAN_CHAIN_KINDS.contains(&kind) && parent_kind != kind {
        let ops = count_boolean_operators(&node.text);
        if ops > 1 {
            total += ops - 1;
        }
    }

    let child_nesting = if is_flow_break { nesting + 1 } else { nesting };
    for child in &node.children {
        total += cognitive_inner(child, child_nesting, kind);
    }
    total
}

/// Classifies each raw line as code, comment, or blank. Comment classification is a
/// per-language line-prefix/block-span heuristic, not a full lexer.
pub fn loc_breakdown(source: &str, language: Language) -> LocBreakdown {
    let (line_prefix, block_open, block_close) = comment_markers(language);
    let mut total = 0u32;
    let mut blank = 0u32;
    let mut comments = 0u32;
    let mut in_block = false;

    for line in source.lines() {
        total += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            blank += 1;
            continue;
        }
        if in_block {
            comments += 1;
            if let Some(close) = block_close {
                if trimmed.contains(close) {
                    in_block = false;
                }
            }
            continue;
        }
        if let Some(prefix) = line_prefix {
            if trimmed.starts_with(prefix) {
                comments += 1;
                continue;
            }
        }
        if let (Some(open), Some(close)) = (block_open, block_close) {
            if trimmed.starts_with(open) {
                comments += 1;
                if !trimmed[open.len()..].contains(close) {
                    in_block = true;
                }
                continue;
            }
        }
    }

    LocBreakdown { total, code: total - comments - blank, comments, blank }
}

fn comment_markers(language: Language) -> (Option<&'static str>, Option<&'static str>, Option<&'static str>) {
    match language {
        Language::Python | Language::Ruby => (Some("#"), None, None),
        _ => (Some("//"), Some("/*"), Some("*/")),
    }
}

/// `171 - 5.2*ln(volume) - 0.23*cyclomatic - 16.2*ln(loc)`, clamped to `[0, 100]`.
pub fn maintainability_index(volume: f64, cyclomatic: f64, loc: f64) -> (f64, MaintainabilityBand) {
    let volume_term = if volume > 0.0 { volume.ln() } else { 0.0 };
    let loc_term = if loc > 0.0 { loc.ln() } else { 0.0 };
    let raw = 171.0 - 5.2 * volume_term - 0.23 * cyclomatic - 16.2 * loc_term;
    let clamped = raw.clamp(0.0, 100.0);
    (clamped, MaintainabilityBand::from_index(clamped))
}

const DEFAULT_HOTSPOT_THRESHOLD: u32 = 10;
const MAX_HOTSPOTS: usize = 10;

pub fn analyze_file(
    root: &ParsedNode,
    symbols: &[ExtractedSymbol],
    source: &str,
    language: Language,
    hotspot_threshold: Option<u32>,
) -> FileComplexity {
    let threshold = hotspot_threshold.unwrap_or(DEFAULT_HOTSPOT_THRESHOLD);

    let functions: Vec<FunctionComplexity> = symbols
        .iter()
        .filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method))
        .map(|s| {
            let subtree = find_subtree(root, s.start_line, s.end_line);
            let (cyclomatic, cognitive) = match subtree {
                Some(n) => (cyclomatic_complexity(n), cognitive_complexity(n)),
                None => (1, 0),
            };
            FunctionComplexity {
                name: s.name.clone(),
                qualified_name: s.qualified_name.clone(),
                start_line: s.start_line,
                end_line: s.end_line,
                cyclomatic,
                cognitive,
            }
        })
        .collect();

    let total_cyclomatic: u32 = functions.iter().map(|f| f.cyclomatic).sum();
    let avg_cyclomatic = if functions.is_empty() { 0.0 } else { total_cyclomatic as f64 / functions.len() as f64 };

    let halstead = halstead::compute(source, language);
    let loc = loc_breakdown(source, language);
    let (maintainability_index, maintainability_band) = maintainability_index(halstead.volume, total_cyclomatic as f64, loc.code as f64);

    let mut hotspots: Vec<FunctionComplexity> = functions.iter().filter(|f| f.cyclomatic >= threshold).cloned().collect();
    hotspots.sort_by(|a, b| b.cyclomatic.cmp(&a.cyclomatic));
    hotspots.truncate(MAX_HOTSPOTS);

    FileComplexity {
        functions,
        total_cyclomatic,
        avg_cyclomatic,
        halstead,
        loc,
        maintainability_index,
        maintainability_band,
        hotspots,
    }
}

fn find_subtree(root: &ParsedNode, start_line: u32, end_line: u32) -> Option<&ParsedNode> {
    if root.start_line == start_line && root.end_line == end_line {
        return Some(root);
    }
    for child in &root.children {
        if child.start_line <= start_line && child.end_line >= end_line {
            if let Some(found) = find_subtree(child, start_line, end_line) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnesis_parser::{parse, LanguageRegistry};

    fn parse_rust(source: &str) -> ParsedNode {
        let registry = LanguageRegistry::new();
        parse(&registry, source, Language::Rust).unwrap().root
    }

    #[test]
    fn empty_function_body_has_base_complexity_one() {
        let root = parse_rust("fn simple() {}");
        let function = root.children.first().unwrap();
        assert_eq!(cyclomatic_complexity(function), 1);
    }

    #[test]
    fn each_if_branch_adds_one() {
        let root = parse_rust("fn f(x: i32) -> i32 { if x > 0 { 1 } else if x < 0 { -1 } else { 0 } }");
        let function = root.children.first().unwrap();
        assert!(cyclomatic_complexity(function) >= 3);
    }

    #[test]
    fn boolean_chain_adds_per_operator() {
        let root = parse_rust("fn f(a: bool, b: bool, c: bool) -> bool { a && b && c }");
        let function = root.children.first().unwrap();
        assert!(cyclomatic_complexity(function) >= 3);
    }

    #[test]
    fn deeper_nesting_increases_cognitive_more_than_cyclomatic() {
        let flat = parse_rust("fn f(x: i32) { if x > 0 {} if x > 1 {} }");
        let nested = parse_rust("fn f(x: i32) { if x > 0 { if x > 1 { if x > 2 {} } } }");
        let flat_fn = flat.children.first().unwrap();
        let nested_fn = nested.children.first().unwrap();
        assert!(cognitive_complexity(nested_fn) > cognitive_complexity(flat_fn));
    }

    #[test]
    fn maintainability_index_is_clamped_to_unit_range() {
        let (index, _) = maintainability_index(-1000.0, 500.0, 10000.0);
        assert!((0.0..=100.0).contains(&index));
    }

    #[test]
    fn loc_breakdown_classifies_blank_and_comment_lines() {
        let source = "// a comment\nfn f() {}\n\n";
        let loc = loc_breakdown(source, Language::Rust);
        assert_eq!(loc.total, 3);
        assert_eq!(loc.comments, 1);
        assert_eq!(loc.blank, 1);
        assert_eq!(loc.code, 1);
    }

    #[test]
    fn avg_cyclomatic_is_zero_with_no_functions() {
        let root = parse_rust("struct S;");
        let complexity = analyze_file(&root, &[], "struct S;", Language::Rust, None);
        assert_eq!(complexity.avg_cyclomatic, 0.0);
    }
}
