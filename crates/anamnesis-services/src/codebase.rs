// ABOUTME: Coordinates per-file and whole-codebase analysis with an in-process LRU of
// ABOUTME: results. Grounded on original_source/anamnesis/services/codebase_service.py.

use std::collections::HashMap;
use std::path::Path;

use anamnesis_analysis::{analyze_file as compute_file_complexity, FileComplexity, MaintainabilityBand};
use anamnesis_core::cache::Cache;
use anamnesis_extract::{extract_imports, extract_symbols, ExtractedSymbol, SymbolExtractionOptions};
use anamnesis_parser::{parse, LanguageRegistry};

#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub file_path: String,
    pub language: String,
    pub complexity: Option<FileComplexity>,
    pub symbols: Vec<ExtractedSymbol>,
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CodebaseHealth {
    pub healthy: bool,
    pub score: f64,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Coordinates file-level analysis (parse → extract → complexity) behind a small LRU
/// cache, keyed by resolved file path.
pub struct CodebaseService {
    registry: LanguageRegistry,
    file_cache: Cache<String, FileAnalysis>,
}

impl Default for CodebaseService {
    fn default() -> Self {
        Self::new()
    }
}

impl CodebaseService {
    pub fn new() -> Self {
        Self { registry: LanguageRegistry::new(), file_cache: Cache::new(2000) }
    }

    pub fn analyze_file(&self, file_path: &Path, source: &str, use_cache: bool) -> Option<FileAnalysis> {
        let path_str = file_path.to_string_lossy().to_string();

        if use_cache {
            if let Some(cached) = self.file_cache.get(&path_str) {
                return Some(cached);
            }
        }

        let language = self.registry.detect_language(&path_str).ok().flatten()?;
        let context = parse(&self.registry, source, language).ok()?;
        let symbols = extract_symbols(&context.root, language, &path_str, &SymbolExtractionOptions::default());
        let imports = extract_imports(&context.root, language).into_iter().map(|i| i.module).collect();
        let complexity = compute_file_complexity(&context.root, &symbols, source, language, Some(10));

        let analysis = FileAnalysis { file_path: path_str.clone(), language: language.canonical_name().to_string(), complexity: Some(complexity), symbols, imports };

        self.file_cache.set(path_str, analysis.clone());
        Some(analysis)
    }

    pub fn clear_cache(&self) {
        self.file_cache.clear();
    }

    /// Aggregates a set of already-computed per-file complexities into a codebase
    /// health summary using the same thresholds as the original implementation
    /// (>30 avg cyclomatic: -20, >15: -10, maintainability band D/F: -15, more than
    /// three languages observed: -5).
    pub fn codebase_health(&self, analyses: &[FileAnalysis]) -> CodebaseHealth {
        let mut health = CodebaseHealth { healthy: true, score: 100.0, issues: Vec::new(), recommendations: Vec::new() };

        if analyses.is_empty() {
            health.healthy = false;
            health.score = 0.0;
            health.issues.push("no files analyzed".to_string());
            return health;
        }

        let complexities: Vec<&FileComplexity> = analyses.iter().filter_map(|a| a.complexity.as_ref()).collect();
        if !complexities.is_empty() {
            let avg_cyclomatic: f64 = complexities.iter().map(|c| c.avg_cyclomatic).sum::<f64>() / complexities.len() as f64;

            if avg_cyclomatic > 30.0 {
                health.score -= 20.0;
                health.issues.push("high cyclomatic complexity detected".to_string());
                health.recommendations.push("consider refactoring complex functions".to_string());
            } else if avg_cyclomatic > 15.0 {
                health.score -= 10.0;
                health.issues.push("moderate cyclomatic complexity".to_string());
            }

            let low_maintainability = complexities.iter().any(|c| matches!(c.maintainability_band, MaintainabilityBand::D | MaintainabilityBand::F));
            if low_maintainability {
                health.score -= 15.0;
                health.issues.push("low maintainability index".to_string());
                health.recommendations.push("improve code documentation and structure".to_string());
            }
        }

        let mut languages: Vec<&str> = analyses.iter().map(|a| a.language.as_str()).collect();
        languages.sort_unstable();
        languages.dedup();
        if languages.len() > 3 {
            health.score -= 5.0;
            health.issues.push("multiple languages detected".to_string());
            health.recommendations.push("consider standardizing on fewer languages".to_string());
        }

        health.score = health.score.max(0.0);
        health.healthy = health.score >= 60.0;
        health
    }

    /// Counts files by extension under `root`, descending by count, matching
    /// `get_file_stats`'s sort order.
    pub fn file_stats(&self, root: &Path) -> Vec<(String, usize)> {
        let mut stats: HashMap<String, usize> = HashMap::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() {
                let ext = entry.path().extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
                *stats.entry(ext).or_insert(0) += 1;
            }
        }
        let mut pairs: Vec<(String, usize)> = stats.into_iter().collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_file_detects_language_and_extracts_symbols() {
        let service = CodebaseService::new();
        let source = "pub fn add(a: i32, b: i32) -> i32 { a + b }";
        let analysis = service.analyze_file(Path::new("a.rs"), source, false).unwrap();
        assert_eq!(analysis.language, "rust");
        assert!(analysis.symbols.iter().any(|s| s.name == "add"));
    }

    #[test]
    fn analyze_file_returns_none_for_unrecognized_extension() {
        let service = CodebaseService::new();
        assert!(service.analyze_file(Path::new("a.unknownext"), "hello", false).is_none());
    }

    #[test]
    fn second_analyze_call_hits_the_cache() {
        let service = CodebaseService::new();
        let source = "pub fn add() {}";
        let first = service.analyze_file(Path::new("a.rs"), source, true).unwrap();
        let second = service.analyze_file(Path::new("a.rs"), "pub fn totally_different() {}", true).unwrap();
        assert_eq!(first.symbols.len(), second.symbols.len());
    }

    #[test]
    fn empty_analysis_set_is_unhealthy() {
        let service = CodebaseService::new();
        let health = service.codebase_health(&[]);
        assert!(!health.healthy);
    }

    #[test]
    fn many_languages_reduce_health_score() {
        let service = CodebaseService::new();
        let analyses: Vec<FileAnalysis> = ["rust", "python", "go", "java"]
            .iter()
            .map(|lang| FileAnalysis { file_path: format!("f.{lang}"), language: lang.to_string(), complexity: None, symbols: vec![], imports: vec![] })
            .collect();
        let health = service.codebase_health(&analyses);
        assert!(health.score < 100.0);
    }
}
