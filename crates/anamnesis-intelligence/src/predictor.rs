// ABOUTME: Predicts a likely coding approach for a problem description by scoring
// ABOUTME: fixed keyword families against the description, no direct teacher equivalent.

use anamnesis_extract::PatternKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatedComplexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct CodingApproachPrediction {
    pub approach: String,
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_patterns: Vec<PatternKind>,
    pub estimated_complexity: EstimatedComplexity,
    pub file_routing: Option<Vec<String>>,
}

struct ApproachFamily {
    approach: &'static str,
    keywords: &'static [&'static str],
    patterns: &'static [PatternKind],
    complexity: EstimatedComplexity,
}

const FAMILIES: &[ApproachFamily] = &[
    ApproachFamily {
        approach: "CRUD data-access layer",
        keywords: &["crud", "database", "persist", "save", "store record", "repository"],
        patterns: &[PatternKind::Repository, PatternKind::Service],
        complexity: EstimatedComplexity::Medium,
    },
    ApproachFamily {
        approach: "event-driven notification",
        keywords: &["event", "notify", "subscribe", "listener", "pub/sub", "webhook"],
        patterns: &[PatternKind::Observer],
        complexity: EstimatedComplexity::Medium,
    },
    ApproachFamily {
        approach: "configurable object construction",
        keywords: &["configure", "fluent", "builder", "optional parameters", "construct step by step"],
        patterns: &[PatternKind::Builder],
        complexity: EstimatedComplexity::Low,
    },
    ApproachFamily {
        approach: "shared singleton resource",
        keywords: &["single instance", "shared state", "global", "singleton"],
        patterns: &[PatternKind::Singleton],
        complexity: EstimatedComplexity::Low,
    },
    ApproachFamily {
        approach: "async concurrent pipeline",
        keywords: &["concurrent", "async", "parallel", "non-blocking", "background task"],
        patterns: &[PatternKind::AsyncPattern, PatternKind::Service],
        complexity: EstimatedComplexity::High,
    },
    ApproachFamily {
        approach: "layered service orchestration",
        keywords: &["orchestrate", "business logic", "service layer", "coordinate"],
        patterns: &[PatternKind::Service, PatternKind::DependencyInjection],
        complexity: EstimatedComplexity::High,
    },
    ApproachFamily {
        approach: "resource-scoped context management",
        keywords: &["cleanup", "resource", "teardown", "acquire release", "with block"],
        patterns: &[PatternKind::ContextManager],
        complexity: EstimatedComplexity::Low,
    },
];

/// Scores each known approach family by keyword overlap against the description and
/// returns the best match. Falls back to a low-confidence generic prediction when no
/// family's keywords appear at all.
pub fn predict_coding_approach(problem_description: &str, file_routing: Option<Vec<String>>) -> CodingApproachPrediction {
    let description_lower = problem_description.to_lowercase();

    let mut best: Option<(f64, &ApproachFamily, Vec<&str>)> = None;
    for family in FAMILIES {
        let matched: Vec<&str> = family.keywords.iter().filter(|kw| description_lower.contains(**kw)).copied().collect();
        if matched.is_empty() {
            continue;
        }
        let score = matched.len() as f64 / family.keywords.len() as f64;
        if best.as_ref().map_or(true, |(best_score, _, _)| score > *best_score) {
            best = Some((score, family, matched));
        }
    }

    match best {
        Some((score, family, matched)) => CodingApproachPrediction {
            approach: family.approach.to_string(),
            confidence: score,
            reasoning: format!("matched keywords [{}] for the \"{}\" approach", matched.join(", "), family.approach),
            suggested_patterns: family.patterns.to_vec(),
            estimated_complexity: family.complexity,
            file_routing,
        },
        None => CodingApproachPrediction {
            approach: "general-purpose implementation".to_string(),
            confidence: 0.1,
            reasoning: "no known approach family's keywords matched the description".to_string(),
            suggested_patterns: Vec::new(),
            estimated_complexity: EstimatedComplexity::Medium,
            file_routing,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crud_description_predicts_repository_approach() {
        let prediction = predict_coding_approach("I need to persist user records to a database", None);
        assert_eq!(prediction.approach, "CRUD data-access layer");
        assert!(prediction.suggested_patterns.contains(&PatternKind::Repository));
    }

    #[test]
    fn unmatched_description_falls_back_to_generic() {
        let prediction = predict_coding_approach("xyzzy plugh", None);
        assert_eq!(prediction.approach, "general-purpose implementation");
        assert!(prediction.confidence < 0.2);
    }

    #[test]
    fn async_description_is_high_complexity() {
        let prediction = predict_coding_approach("run this as a background task concurrently", None);
        assert_eq!(prediction.estimated_complexity, EstimatedComplexity::High);
    }

    #[test]
    fn file_routing_is_passed_through_unchanged() {
        let routing = vec!["src/repo.rs".to_string()];
        let prediction = predict_coding_approach("persist to database", Some(routing.clone()));
        assert_eq!(prediction.file_routing, Some(routing));
    }
}
