// ABOUTME: Aggregates naming conventions, pattern usage, and file clusters into a
// ABOUTME: developer profile. Grounded on codegraph-mcp's analyzer aggregation idiom.

use std::collections::HashMap;

use anamnesis_extract::{DetectedPattern, PatternKind};

#[derive(Debug, Clone, Default)]
pub struct DeveloperProfile {
    pub preferred_naming_convention: Option<PatternKind>,
    pub most_used_patterns: Vec<(PatternKind, u32)>,
    pub expertise_areas: Vec<ExpertiseArea>,
    pub current_session_files: Vec<String>,
    pub current_feature: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExpertiseArea {
    pub module_prefix: String,
    pub file_count: usize,
    pub dominant_patterns: Vec<PatternKind>,
}

const NAMING_KINDS: &[PatternKind] = &[PatternKind::NamingSnakeCase, PatternKind::NamingCamelCase, PatternKind::NamingPascalCase];

/// Builds a profile from every pattern detected across a codebase crawl, clustering
/// files by their shared leading path segment to approximate a module.
pub fn build_profile(detected: &[DetectedPattern], current_session_files: Vec<String>, current_feature: Option<String>) -> DeveloperProfile {
    let mut frequency: HashMap<PatternKind, u32> = HashMap::new();
    let mut naming_frequency: HashMap<PatternKind, u32> = HashMap::new();
    let mut by_module: HashMap<String, Vec<&DetectedPattern>> = HashMap::new();

    for pattern in detected {
        *frequency.entry(pattern.kind).or_insert(0) += 1;
        if NAMING_KINDS.contains(&pattern.kind) {
            *naming_frequency.entry(pattern.kind).or_insert(0) += 1;
        }
        let module = module_prefix(&pattern.file_path);
        by_module.entry(module).or_default().push(pattern);
    }

    let mut most_used: Vec<(PatternKind, u32)> = frequency.into_iter().filter(|(kind, _)| !NAMING_KINDS.contains(kind)).collect();
    most_used.sort_by(|a, b| b.1.cmp(&a.1));

    let preferred_naming_convention = naming_frequency.into_iter().max_by_key(|(_, count)| *count).map(|(kind, _)| kind);

    let mut expertise_areas: Vec<ExpertiseArea> = by_module
        .into_iter()
        .map(|(module_prefix, patterns)| {
            let mut file_paths: Vec<&str> = patterns.iter().map(|p| p.file_path.as_str()).collect();
            file_paths.sort_unstable();
            file_paths.dedup();

            let mut dominant: HashMap<PatternKind, u32> = HashMap::new();
            for pattern in &patterns {
                *dominant.entry(pattern.kind).or_insert(0) += 1;
            }
            let mut dominant_patterns: Vec<(PatternKind, u32)> = dominant.into_iter().collect();
            dominant_patterns.sort_by(|a, b| b.1.cmp(&a.1));

            ExpertiseArea {
                module_prefix,
                file_count: file_paths.len(),
                dominant_patterns: dominant_patterns.into_iter().take(3).map(|(kind, _)| kind).collect(),
            }
        })
        .collect();
    expertise_areas.sort_by(|a, b| b.file_count.cmp(&a.file_count));

    DeveloperProfile { preferred_naming_convention, most_used_patterns: most_used, expertise_areas, current_session_files, current_feature }
}

fn module_prefix(file_path: &str) -> String {
    file_path.split('/').next().unwrap_or(file_path).to_string()
}
