// ABOUTME: Knowledge layer over detected patterns: learns per-file frequency and
// ABOUTME: recommends patterns for a problem description by keyword overlap.

use std::collections::HashMap;

use anamnesis_extract::{detect_patterns, DetectedPattern, ExtractedSymbol, PatternDetectionOptions, PatternKind};
use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
struct LearnedPattern {
    frequency: u32,
    files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PatternRecommendation {
    pub kind: PatternKind,
    pub score: f64,
    pub reasoning: String,
    pub example_files: Vec<String>,
}

pub struct PatternEngine {
    learned: RwLock<HashMap<PatternKind, LearnedPattern>>,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternEngine {
    pub fn new() -> Self {
        Self { learned: RwLock::new(HashMap::new()) }
    }

    pub fn detect(&self, symbols: &[ExtractedSymbol], source: &str, file_path: &str, options: &PatternDetectionOptions) -> Vec<DetectedPattern> {
        detect_patterns(symbols, source, file_path, options)
    }

    pub fn learn(&self, file_path: &str, patterns: &[DetectedPattern]) {
        let mut learned = self.learned.write();
        for pattern in patterns {
            let entry = learned.entry(pattern.kind).or_default();
            entry.frequency += 1;
            if !entry.files.contains(&file_path.to_string()) {
                entry.files.push(file_path.to_string());
            }
        }
    }

    pub fn frequency(&self, kind: PatternKind) -> u32 {
        self.learned.read().get(&kind).map(|p| p.frequency).unwrap_or(0)
    }

    pub fn recommend(&self, problem_description: &str, top_k: usize) -> Vec<PatternRecommendation> {
        let description_lower = problem_description.to_lowercase();
        let learned = self.learned.read();
        let mut scored: Vec<PatternRecommendation> = learned
            .iter()
            .filter_map(|(kind, entry)| {
                let keywords = pattern_keywords(*kind);
                let matched: Vec<&str> = keywords.iter().filter(|kw| description_lower.contains(**kw)).copied().collect();
                if matched.is_empty() {
                    return None;
                }
                let score = (matched.len() as f64 / keywords.len() as f64) * (1.0 + (entry.frequency as f64).ln_1p());
                Some(PatternRecommendation {
                    kind: *kind,
                    score,
                    reasoning: format!("matched keywords [{}]; seen in {} file(s)", matched.join(", "), entry.files.len()),
                    example_files: entry.files.clone(),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k.max(1));
        scored
    }
}

fn pattern_keywords(kind: PatternKind) -> &'static [&'static str] {
    match kind {
        PatternKind::Singleton => &["singleton", "single instance", "shared instance"],
        PatternKind::Factory => &["factory", "create", "construct", "instantiate"],
        PatternKind::Builder => &["builder", "fluent", "configure", "chain"],
        PatternKind::Observer => &["observer", "event", "notify", "subscribe", "listener"],
        PatternKind::Repository => &["repository", "data access", "persistence", "crud"],
        PatternKind::Service => &["service", "business logic", "orchestrate"],
        PatternKind::DependencyInjection => &["dependency injection", "inject", "container"],
        PatternKind::ContextManager => &["context manager", "resource", "cleanup", "with"],
        PatternKind::Dataclass => &["dataclass", "value object", "immutable"],
        PatternKind::Property => &["property", "getter", "setter"],
        PatternKind::AsyncPattern => &["async", "concurrent", "await", "non-blocking"],
        PatternKind::Logging => &["log", "logging", "observability"],
        PatternKind::ErrorHandling => &["error", "exception", "failure", "recover"],
        PatternKind::NamingSnakeCase => &["snake_case", "naming"],
        PatternKind::NamingCamelCase => &["camelcase", "naming"],
        PatternKind::NamingPascalCase => &["pascalcase", "naming"],
        PatternKind::GodClass => &["god class", "too many responsibilities"],
        PatternKind::LongMethod => &["long method", "too long", "refactor"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnesis_extract::SymbolKind;

    fn repository_pattern(file: &str) -> DetectedPattern {
        DetectedPattern {
            kind: PatternKind::Repository,
            name: "UserRepository".to_string(),
            file_path: file.to_string(),
            start_line: 1,
            end_line: 10,
            confidence: 0.9,
            evidence: vec!["has find/save/delete".to_string()],
        }
    }

    #[test]
    fn learning_accumulates_frequency_across_files() {
        let engine = PatternEngine::new();
        engine.learn("a.py", &[repository_pattern("a.py")]);
        engine.learn("b.py", &[repository_pattern("b.py")]);
        assert_eq!(engine.frequency(PatternKind::Repository), 2);
    }

    #[test]
    fn recommend_matches_on_keyword_overlap() {
        let engine = PatternEngine::new();
        engine.learn("a.py", &[repository_pattern("a.py")]);
        let recs = engine.recommend("I need a data access layer for persistence", 5);
        assert!(recs.iter().any(|r| r.kind == PatternKind::Repository));
    }

    #[test]
    fn recommend_respects_top_k() {
        let engine = PatternEngine::new();
        for kind in [PatternKind::Repository, PatternKind::Service, PatternKind::Logging] {
            let pattern = DetectedPattern { kind, ..repository_pattern("a.py") };
            engine.learn("a.py", std::slice::from_ref(&pattern));
        }
        let recs = engine.recommend("service logging repository error", 2);
        assert!(recs.len() <= 2);
    }

    #[test]
    fn detect_delegates_to_the_extractor() {
        let engine = PatternEngine::new();
        let symbols: Vec<ExtractedSymbol> = Vec::new();
        let _ = SymbolKind::Class;
        let patterns = engine.detect(&symbols, "", "f.py", &PatternDetectionOptions::default());
        assert!(patterns.is_empty());
    }
}
