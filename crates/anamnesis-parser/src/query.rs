// ABOUTME: Compiles and runs tree-sitter S-expression queries against a parsed tree.
// ABOUTME: Grounded on codegraph-parser's use of tree_sitter::Query/QueryCursor.

use std::collections::HashMap;

use anamnesis_core::error::AnamnesisError;

use crate::language::Language;

#[derive(Debug, Clone)]
pub struct CaptureMatch {
    pub pattern_index: usize,
    pub captures: HashMap<String, String>,
}

pub struct CompiledQuery {
    query: tree_sitter::Query,
}

/// Compiles an S-expression query for `language`. Returns `InvalidQuery` on any
/// compile error, with the tree-sitter-reported reason folded into the message.
pub fn compile(language: Language, grammar: &tree_sitter::Language, source: &str) -> Result<CompiledQuery, AnamnesisError> {
    let _ = language;
    let query = tree_sitter::Query::new(grammar, source)
        .map_err(|e| AnamnesisError::InvalidQuery(e.to_string()))?;
    Ok(CompiledQuery { query })
}

impl CompiledQuery {
    pub fn find_all(&self, root: tree_sitter::Node, source: &[u8]) -> Vec<CaptureMatch> {
        let mut cursor = tree_sitter::QueryCursor::new();
        let names = self.query.capture_names();
        let mut out = Vec::new();
        let mut matches = cursor.matches(&self.query, root, source);
        while let Some(m) = matches.next() {
            let mut captures = HashMap::new();
            for capture in m.captures {
                let name = names[capture.index as usize].to_string();
                let text = capture.node.utf8_text(source).unwrap_or("").to_string();
                captures.insert(name, text);
            }
            out.push(CaptureMatch { pattern_index: m.pattern_index, captures });
        }
        out
    }
}
