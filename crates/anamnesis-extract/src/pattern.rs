// ABOUTME: Pattern detectors over extracted symbols and raw source, each contributing
// ABOUTME: evidence that accumulates into a confidence score. Grounded on
// ABOUTME: codegraph-mcp/src/pattern_detector.rs's detector-table shape.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::symbol::{ExtractedSymbol, SymbolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Singleton,
    Factory,
    Builder,
    Observer,
    Repository,
    Service,
    DependencyInjection,
    ContextManager,
    Dataclass,
    Property,
    AsyncPattern,
    Logging,
    ErrorHandling,
    NamingSnakeCase,
    NamingCamelCase,
    NamingPascalCase,
    GodClass,
    LongMethod,
}

#[derive(Debug, Clone)]
pub struct DetectedPattern {
    pub kind: PatternKind,
    pub name: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PatternDetectionOptions {
    pub min_confidence: f64,
    pub detect_antipatterns: bool,
    pub god_class_method_threshold: u32,
    pub long_method_loc_threshold: u32,
}

impl Default for PatternDetectionOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            detect_antipatterns: false,
            god_class_method_threshold: 20,
            long_method_loc_threshold: 50,
        }
    }
}

struct Accumulator {
    evidence: Vec<(String, f64)>,
}

impl Accumulator {
    fn new() -> Self {
        Self { evidence: Vec::new() }
    }

    fn add(&mut self, reason: impl Into<String>, weight: f64) {
        self.evidence.push((reason.into(), weight));
    }

    fn is_empty(&self) -> bool {
        self.evidence.is_empty()
    }

    fn into_pattern(self, kind: PatternKind, name: String, file_path: String, start_line: u32, end_line: u32) -> DetectedPattern {
        let confidence = self.evidence.iter().map(|(_, w)| w).sum::<f64>().min(1.0);
        DetectedPattern {
            kind,
            name,
            file_path,
            start_line,
            end_line,
            confidence,
            evidence: self.evidence.into_iter().map(|(r, _)| r).collect(),
        }
    }
}

static SNAKE_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").unwrap());
static CAMEL_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-zA-Z0-9]*$").unwrap());
static PASCAL_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*$").unwrap());
static TYPED_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*([A-Z]\w*)").unwrap());
static EXCEPTION_BASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"class\s+\w+\s*\([^)]*Exception[^)]*\)").unwrap());
static RAISE_FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r"raise\s+\S+.*\bfrom\b").unwrap());

const COLLABORATOR_TYPE_SUFFIXES: &[&str] =
    &["Repository", "Repo", "Service", "Client", "Provider", "Factory", "Manager", "Logger", "Handler", "Gateway"];

pub fn detect_patterns(
    symbols: &[ExtractedSymbol],
    source: &str,
    file_path: &str,
    options: &PatternDetectionOptions,
) -> Vec<DetectedPattern> {
    let mut out = Vec::new();

    for class in symbols.iter().filter(|s| s.kind == SymbolKind::Class) {
        let methods: Vec<&ExtractedSymbol> = symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Method && s.start_line >= class.start_line && s.end_line <= class.end_line)
            .collect();
        let method_names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();

        detect_singleton(class, &method_names, source, &mut out, file_path);
        detect_factory(class, &method_names, &mut out, file_path);
        detect_builder(&methods, &mut out, class, file_path);
        detect_observer(class, &method_names, source, &mut out, file_path);
        detect_repository(class, &method_names, &mut out, file_path);
        detect_service(class, &mut out, file_path);
        detect_context_manager(&method_names, class, &mut out, file_path);
        detect_dataclass(class, source, &mut out, file_path);
        detect_dependency_injection(class, &methods, source, &mut out, file_path);
        detect_error_handling(class, source, &mut out, file_path);

        if options.detect_antipatterns && methods.len() as u32 >= options.god_class_method_threshold {
            let mut acc = Accumulator::new();
            acc.add(format!("{} methods >= threshold {}", methods.len(), options.god_class_method_threshold), 1.0);
            out.push(acc.into_pattern(PatternKind::GodClass, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
        }
    }

    for function in symbols.iter().filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method)) {
        detect_async_pattern(function, source, &mut out, file_path);
        detect_property(function, &mut out, file_path);

        if options.detect_antipatterns {
            let loc = function.end_line - function.start_line + 1;
            if loc >= options.long_method_loc_threshold {
                let mut acc = Accumulator::new();
                acc.add(format!("{loc} LOC >= threshold {}", options.long_method_loc_threshold), 1.0);
                out.push(acc.into_pattern(PatternKind::LongMethod, function.name.clone(), file_path.to_string(), function.start_line, function.end_line));
            }
        }
    }

    detect_logging(source, &mut out, file_path);
    detect_naming_patterns(symbols, &mut out, file_path);

    out.into_iter().filter(|p| p.confidence >= options.min_confidence).collect()
}

fn detect_singleton(class: &ExtractedSymbol, methods: &[&str], source: &str, out: &mut Vec<DetectedPattern>, file_path: &str) {
    let mut acc = Accumulator::new();
    if source.contains("_instance") || source.contains("_instance =") {
        acc.add("class carries an _instance attribute", 0.4);
    }
    if methods.contains(&"get_instance") || methods.contains(&"instance") {
        acc.add("exposes a get_instance/instance accessor", 0.4);
    }
    if methods.iter().any(|m| *m == "__new__") {
        acc.add("overrides __new__", 0.3);
    }
    if !acc.is_empty() {
        out.push(acc.into_pattern(PatternKind::Singleton, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
    }
}

fn detect_factory(class: &ExtractedSymbol, methods: &[&str], out: &mut Vec<DetectedPattern>, file_path: &str) {
    let mut acc = Accumulator::new();
    if methods.iter().any(|m| m.starts_with("create_") || m.starts_with("make_") || m.starts_with("new_")) {
        acc.add("has a create_/make_/new_ constructor method", 0.5);
    }
    if class.name.ends_with("Factory") {
        acc.add("class name ends in Factory", 0.4);
    }
    if !acc.is_empty() {
        out.push(acc.into_pattern(PatternKind::Factory, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
    }
}

fn detect_builder(methods: &[&ExtractedSymbol], out: &mut Vec<DetectedPattern>, class: &ExtractedSymbol, file_path: &str) {
    let mut acc = Accumulator::new();
    if methods.iter().any(|m| m.name == "build") {
        acc.add("has a terminal build() method", 0.5);
    }
    if methods.len() >= 2 {
        acc.add("chains multiple configuration methods", 0.3);
    }
    if !acc.is_empty() {
        out.push(acc.into_pattern(PatternKind::Builder, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
    }
}

fn detect_observer(class: &ExtractedSymbol, methods: &[&str], source: &str, out: &mut Vec<DetectedPattern>, file_path: &str) {
    let mut acc = Accumulator::new();
    let has_subscribe = methods.iter().any(|m| m.contains("subscribe") || m.contains("add_observer") || m.contains("add_listener"));
    let has_notify = methods.iter().any(|m| m.contains("notify") || m.contains("emit") || m.contains("fire"));
    if has_subscribe {
        acc.add("has a subscribe/add_observer method", 0.4);
    }
    if has_notify {
        acc.add("has a notify/emit method", 0.4);
    }
    if source.contains("subscribers") || source.contains("listeners") || source.contains("observers") {
        acc.add("carries a subscriber/listener collection", 0.2);
    }
    if !acc.is_empty() {
        out.push(acc.into_pattern(PatternKind::Observer, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
    }
}

const REPOSITORY_VERBS: &[&str] = &["find", "get", "save", "delete", "update", "list"];

fn detect_repository(class: &ExtractedSymbol, methods: &[&str], out: &mut Vec<DetectedPattern>, file_path: &str) {
    let matched = REPOSITORY_VERBS.iter().filter(|verb| methods.iter().any(|m| m.starts_with(**verb))).count();
    if matched >= 3 {
        let mut acc = Accumulator::new();
        acc.add(format!("{matched} of {{find,get,save,delete,update,list}} present"), 0.3 * matched as f64);
        out.push(acc.into_pattern(PatternKind::Repository, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
    }
}

fn detect_service(class: &ExtractedSymbol, out: &mut Vec<DetectedPattern>, file_path: &str) {
    if class.name.ends_with("Service") {
        let mut acc = Accumulator::new();
        acc.add("class name ends in Service", 0.6);
        out.push(acc.into_pattern(PatternKind::Service, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
    }
}

fn detect_context_manager(methods: &[&str], class: &ExtractedSymbol, out: &mut Vec<DetectedPattern>, file_path: &str) {
    if methods.contains(&"__enter__") && methods.contains(&"__exit__") {
        let mut acc = Accumulator::new();
        acc.add("defines both __enter__ and __exit__", 0.8);
        out.push(acc.into_pattern(PatternKind::ContextManager, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
    }
}

fn detect_dataclass(class: &ExtractedSymbol, source: &str, out: &mut Vec<DetectedPattern>, file_path: &str) {
    if class.decorators.iter().any(|d| d == "dataclass") || source.contains("@dataclass") {
        let mut acc = Accumulator::new();
        acc.add("decorated with @dataclass", 0.9);
        out.push(acc.into_pattern(PatternKind::Dataclass, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
    }
}

/// Best-effort constructor signature text: the verbatim body when available
/// (an `include_body` extraction), otherwise the source lines from the
/// constructor's start up to its first closing paren.
fn constructor_signature(source: &str, ctor: &ExtractedSymbol) -> String {
    if let Some(body) = &ctor.body {
        return match body.find(')') {
            Some(end) => body[..=end].to_string(),
            None => body.clone(),
        };
    }
    let start = ctor.start_line.saturating_sub(1) as usize;
    let mut sig = String::new();
    for line in source.lines().skip(start).take(5) {
        sig.push_str(line);
        sig.push('\n');
        if line.contains(')') {
            break;
        }
    }
    sig
}

fn detect_dependency_injection(class: &ExtractedSymbol, methods: &[&ExtractedSymbol], source: &str, out: &mut Vec<DetectedPattern>, file_path: &str) {
    let Some(ctor) = methods.iter().find(|m| m.name == "__init__" || m.name == "new") else {
        return;
    };
    let signature = constructor_signature(source, ctor);
    let typed_params: Vec<&str> = TYPED_PARAM.captures_iter(&signature).map(|c| c.get(1).unwrap().as_str()).collect();
    if typed_params.is_empty() {
        return;
    }
    let collaborator_typed = typed_params.iter().filter(|t| COLLABORATOR_TYPE_SUFFIXES.iter().any(|suffix| t.ends_with(suffix))).count();

    let mut acc = Accumulator::new();
    if collaborator_typed > 0 {
        acc.add(format!("{collaborator_typed} constructor parameter(s) typed as collaborators"), 0.5);
        if collaborator_typed > 1 {
            acc.add("more than one collaborator injected", 0.2);
        }
    } else if typed_params.len() >= 2 {
        acc.add(format!("{} constructor parameters carry type annotations", typed_params.len()), 0.3);
    }
    if !acc.is_empty() {
        out.push(acc.into_pattern(PatternKind::DependencyInjection, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
    }
}

fn detect_error_handling(class: &ExtractedSymbol, source: &str, out: &mut Vec<DetectedPattern>, file_path: &str) {
    let mut acc = Accumulator::new();
    if class.name.ends_with("Error") || class.name.ends_with("Exception") {
        acc.add("class name ends in Error/Exception", 0.5);
    }
    if let Some(line) = source.lines().nth(class.start_line.saturating_sub(1) as usize) {
        if EXCEPTION_BASE.is_match(line) {
            acc.add("inherits explicitly from an Exception base", 0.4);
        }
    }
    if acc.is_empty() {
        return;
    }
    if RAISE_FROM.is_match(source) {
        acc.add("raise ... from ... used in the module", 0.3);
    }
    out.push(acc.into_pattern(PatternKind::ErrorHandling, class.name.clone(), file_path.to_string(), class.start_line, class.end_line));
}

fn detect_async_pattern(function: &ExtractedSymbol, source: &str, out: &mut Vec<DetectedPattern>, file_path: &str) {
    if function.is_async {
        let mut acc = Accumulator::new();
        acc.add("declared async", 0.5);
        let body = function.body.as_deref().unwrap_or(source);
        if body.contains("await ") {
            acc.add("awaits inside the body", 0.4);
        }
        out.push(acc.into_pattern(PatternKind::AsyncPattern, function.name.clone(), file_path.to_string(), function.start_line, function.end_line));
    }
}

fn detect_property(function: &ExtractedSymbol, out: &mut Vec<DetectedPattern>, file_path: &str) {
    if function.decorators.iter().any(|d| d == "property" || d.ends_with(".setter")) {
        let mut acc = Accumulator::new();
        acc.add("decorated with @property or a matching .setter", 0.8);
        out.push(acc.into_pattern(PatternKind::Property, function.name.clone(), file_path.to_string(), function.start_line, function.end_line));
    }
}

fn detect_logging(source: &str, out: &mut Vec<DetectedPattern>, file_path: &str) {
    let has_logger = source.contains("getLogger") || source.contains("logging.getLogger") || source.contains("tracing::") || source.contains("log::");
    if has_logger {
        let mut acc = Accumulator::new();
        acc.add("module-level logger accessor present", 0.7);
        out.push(acc.into_pattern(PatternKind::Logging, "<module>".to_string(), file_path.to_string(), 1, 1));
    }
}

fn detect_naming_patterns(symbols: &[ExtractedSymbol], out: &mut Vec<DetectedPattern>, file_path: &str) {
    let mut snake = 0usize;
    let mut camel = 0usize;
    let mut pascal = 0usize;
    for s in symbols {
        if SNAKE_CASE.is_match(&s.name) {
            snake += 1;
        } else if PASCAL_CASE.is_match(&s.name) {
            pascal += 1;
        } else if CAMEL_CASE.is_match(&s.name) {
            camel += 1;
        }
    }
    let total = symbols.len().max(1) as f64;
    if snake > 0 {
        push_naming(out, PatternKind::NamingSnakeCase, snake, total, file_path);
    }
    if camel > 0 {
        push_naming(out, PatternKind::NamingCamelCase, camel, total, file_path);
    }
    if pascal > 0 {
        push_naming(out, PatternKind::NamingPascalCase, pascal, total, file_path);
    }
}

fn push_naming(out: &mut Vec<DetectedPattern>, kind: PatternKind, count: usize, total: f64, file_path: &str) {
    let mut acc = Accumulator::new();
    acc.add(format!("{count}/{total} identifiers match"), (count as f64 / total).min(1.0));
    out.push(acc.into_pattern(kind, "<module>".to_string(), file_path.to_string(), 1, 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Visibility;

    fn class(name: &str, start: u32, end: u32) -> ExtractedSymbol {
        ExtractedSymbol {
            kind: SymbolKind::Class,
            name: name.to_string(),
            qualified_name: name.to_string(),
            file_path: "f.py".to_string(),
            start_line: start,
            end_line: end,
            is_async: false,
            visibility: Visibility::Public,
            decorators: Vec::new(),
            modifiers: Vec::new(),
            is_exported: true,
            docstring: None,
            body: None,
        }
    }

    fn method(name: &str, start: u32, end: u32) -> ExtractedSymbol {
        let mut m = class(name, start, end);
        m.kind = SymbolKind::Method;
        m
    }

    #[test]
    fn singleton_detected_with_confidence_above_threshold() {
        let symbols = vec![
            class("Registry", 1, 10),
            method("get_instance", 2, 4),
        ];
        let source = "class Registry:\n    _instance = None\n    def get_instance(cls):\n        pass\n";
        let patterns = detect_patterns(&symbols, source, "f.py", &PatternDetectionOptions::default());
        let singleton = patterns.iter().find(|p| p.kind == PatternKind::Singleton).unwrap();
        assert!(singleton.confidence >= 0.7);
    }

    #[test]
    fn repository_requires_at_least_three_matching_verbs() {
        let symbols = vec![
            class("UserRepository", 1, 20),
            method("find", 2, 3),
            method("save", 4, 5),
            method("delete", 6, 7),
        ];
        let patterns = detect_patterns(&symbols, "", "f.py", &PatternDetectionOptions::default());
        assert!(patterns.iter().any(|p| p.kind == PatternKind::Repository));
    }

    #[test]
    fn god_class_only_emitted_when_antipatterns_enabled() {
        let methods: Vec<ExtractedSymbol> = (0..25).map(|i| method(&format!("m{i}"), i + 2, i + 3)).collect();
        let mut symbols = vec![class("Big", 1, 100)];
        symbols.extend(methods);

        let disabled = detect_patterns(&symbols, "", "f.py", &PatternDetectionOptions::default());
        assert!(!disabled.iter().any(|p| p.kind == PatternKind::GodClass));

        let mut options = PatternDetectionOptions::default();
        options.detect_antipatterns = true;
        options.min_confidence = 0.0;
        let enabled = detect_patterns(&symbols, "", "f.py", &options);
        assert!(enabled.iter().any(|p| p.kind == PatternKind::GodClass));
    }

    #[test]
    fn min_confidence_filters_out_weak_matches() {
        let symbols = vec![class("Thing", 1, 5)];
        let mut options = PatternDetectionOptions::default();
        options.min_confidence = 0.95;
        let patterns = detect_patterns(&symbols, "", "f.py", &options);
        assert!(patterns.iter().all(|p| p.confidence >= 0.95));
    }

    #[test]
    fn dependency_injection_detected_when_constructor_takes_collaborator_types() {
        let symbols = vec![
            class("OrderService", 1, 10),
            method("__init__", 2, 4),
        ];
        let source = "class OrderService:\n    def __init__(self, order_repo: OrderRepository, notifier: NotificationClient):\n        self.order_repo = order_repo\n        self.notifier = notifier\n";
        let patterns = detect_patterns(&symbols, source, "f.py", &PatternDetectionOptions::default());
        let di = patterns.iter().find(|p| p.kind == PatternKind::DependencyInjection).unwrap();
        assert!(di.confidence >= 0.7);
    }

    #[test]
    fn dependency_injection_not_detected_without_typed_constructor_params() {
        let symbols = vec![
            class("Thing", 1, 5),
            method("__init__", 2, 3),
        ];
        let source = "class Thing:\n    def __init__(self, value):\n        self.value = value\n";
        let patterns = detect_patterns(&symbols, source, "f.py", &PatternDetectionOptions::default());
        assert!(!patterns.iter().any(|p| p.kind == PatternKind::DependencyInjection));
    }

    #[test]
    fn error_handling_detected_for_custom_exception_with_raise_from() {
        let symbols = vec![class("ConfigError", 1, 3)];
        let source = "class ConfigError(Exception):\n    pass\n\ndef load():\n    raise ConfigError(\"bad\") from original\n";
        let patterns = detect_patterns(&symbols, source, "f.py", &PatternDetectionOptions::default());
        let pattern = patterns.iter().find(|p| p.kind == PatternKind::ErrorHandling).unwrap();
        assert!(pattern.confidence >= 0.8);
    }

    #[test]
    fn error_handling_not_detected_for_ordinary_classes() {
        let symbols = vec![class("Widget", 1, 3)];
        let source = "class Widget:\n    pass\n";
        let patterns = detect_patterns(&symbols, source, "f.py", &PatternDetectionOptions::default());
        assert!(!patterns.iter().any(|p| p.kind == PatternKind::ErrorHandling));
    }

    #[test]
    fn confidence_never_exceeds_one() {
        let symbols = vec![
            class("UserRepository", 1, 20),
            method("find", 2, 3),
            method("get", 4, 5),
            method("save", 6, 7),
            method("delete", 8, 9),
            method("update", 10, 11),
            method("list", 12, 13),
        ];
        let patterns = detect_patterns(&symbols, "", "f.py", &PatternDetectionOptions::default());
        assert!(patterns.iter().all(|p| p.confidence <= 1.0));
    }
}
