// ABOUTME: Halstead operator/operand tokenization and metric derivation.
// ABOUTME: Per Open Question decision #3: fixed per-language token-kind tables,
// ABOUTME: published but not pinned to exact values in tests.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use anamnesis_parser::Language;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[A-Za-z_][A-Za-z0-9_]*|[0-9]+\.?[0-9]*|[^\sA-Za-z0-9_'"]+"#).unwrap()
});

const COMMON_SYMBOLS: &[&str] = &[
    "+", "-", "*", "/", "%", "=", "==", "!=", "<", "<=", ">", ">=", "&&", "||", "!", "&", "|", "^",
    "<<", ">>", "+=", "-=", "*=", "/=", "(", ")", "{", "}", "[", "]", ",", ";", ":", ".",
];

pub fn operator_kinds(language: Language) -> HashSet<&'static str> {
    let mut set: HashSet<&'static str> = COMMON_SYMBOLS.iter().copied().collect();
    let keywords: &[&str] = match language {
        Language::Python => &["def", "class", "if", "elif", "else", "for", "while", "return", "import", "from", "and", "or", "not", "in", "is", "lambda", "try", "except", "finally", "with", "as", "pass", "break", "continue", "yield", "raise", "global", "nonlocal", "assert", "del"],
        Language::Rust => &["fn", "let", "mut", "if", "else", "for", "while", "loop", "match", "return", "struct", "impl", "pub", "trait", "enum", "use", "mod", "crate", "self", "Self", "where", "as", "move", "ref", "async", "await", "->", "=>", "::"],
        Language::Go => &["func", "if", "else", "for", "range", "return", "var", "const", "type", "struct", "interface", "package", "import", "go", "chan", "select", "switch", "case", "default", "defer", ":="],
        Language::Java => &["public", "private", "protected", "class", "interface", "extends", "implements", "if", "else", "for", "while", "do", "switch", "case", "return", "new", "static", "final", "void", "try", "catch", "finally", "throw"],
        Language::TypeScript | Language::Tsx | Language::JavaScript => &["function", "const", "let", "var", "if", "else", "for", "while", "return", "class", "extends", "new", "typeof", "instanceof", "try", "catch", "finally", "throw", "async", "await", "=>"],
        Language::Cpp | Language::CSharp => &["if", "else", "for", "while", "do", "switch", "case", "return", "class", "struct", "public", "private", "protected", "static", "const", "new", "delete", "try", "catch", "throw", "namespace", "using"],
        Language::Ruby => &["def", "end", "if", "elsif", "else", "unless", "while", "until", "class", "module", "return", "yield", "begin", "rescue", "ensure", "do"],
        Language::Php => &["function", "if", "elseif", "else", "foreach", "while", "for", "return", "class", "public", "private", "protected", "static", "new", "try", "catch", "throw", "->", "=>"],
    };
    set.extend(keywords.iter());
    set
}

#[derive(Debug, Clone, Default)]
pub struct HalsteadMetrics {
    pub distinct_operators: u32,
    pub distinct_operands: u32,
    pub total_operators: u32,
    pub total_operands: u32,
    pub vocabulary: u32,
    pub length: u32,
    pub volume: f64,
    pub difficulty: f64,
    pub effort: f64,
}

pub fn compute(source: &str, language: Language) -> HalsteadMetrics {
    let operator_set = operator_kinds(language);
    let mut operator_counts: HashMap<&'static str, u32> = HashMap::new();
    let mut operand_counts: HashMap<String, u32> = HashMap::new();

    for token in TOKEN_RE.find_iter(source).map(|m| m.as_str()) {
        if let Some(known) = operator_set.get(token) {
            *operator_counts.entry(*known).or_insert(0) += 1;
        } else {
            *operand_counts.entry(token.to_string()).or_insert(0) += 1;
        }
    }

    let n1 = operator_counts.len() as u32;
    let n2 = operand_counts.len() as u32;
    let big_n1: u32 = operator_counts.values().sum();
    let big_n2: u32 = operand_counts.values().sum();

    let vocabulary = n1 + n2;
    let length = big_n1 + big_n2;
    let volume = if vocabulary > 0 { length as f64 * (vocabulary as f64).log2() } else { 0.0 };
    let difficulty = if n2 > 0 { (n1 as f64 / 2.0) * (big_n2 as f64 / n2 as f64) } else { 0.0 };
    let effort = difficulty * volume;

    HalsteadMetrics {
        distinct_operators: n1,
        distinct_operands: n2,
        total_operators: big_n1,
        total_operands: big_n2,
        vocabulary,
        length,
        volume,
        difficulty,
        effort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_yields_zeroed_metrics() {
        let m = compute("", Language::Rust);
        assert_eq!(m.vocabulary, 0);
        assert_eq!(m.volume, 0.0);
    }

    #[test]
    fn known_operators_and_identifiers_are_split() {
        let m = compute("let x = a + b;", Language::Rust);
        assert!(m.total_operators > 0);
        assert!(m.total_operands > 0);
    }

    #[test]
    fn repeated_identifiers_count_once_in_distinct_operands() {
        let m = compute("a = a + a;", Language::Rust);
        assert_eq!(m.distinct_operands, 1);
        assert_eq!(m.total_operands, 3);
    }

    #[test]
    fn volume_is_nondecreasing_with_length() {
        let small = compute("let x = 1;", Language::Rust);
        let bigger = compute("let x = 1; let y = 2; let z = x + y;", Language::Rust);
        assert!(bigger.volume >= small.volume);
    }
}
