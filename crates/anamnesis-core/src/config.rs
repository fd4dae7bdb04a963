// ABOUTME: Runtime configuration, section by section, loaded once from the environment.
// ABOUTME: Mirrors original_source/anamnesis/config/config.py; no global singleton — constructed
// ABOUTME: explicitly at startup and threaded into services (see DESIGN NOTES in SPEC_FULL.md).

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn from_env_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfigSection {
    pub filename: String,
    pub path: Option<PathBuf>,
    pub connection_pool_size: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfigSection {
    fn default() -> Self {
        Self {
            filename: "anamnesis.db".to_string(),
            path: None,
            connection_pool_size: 10,
            busy_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceConfigSection {
    pub batch_size: u32,
    pub max_concurrent_files: u32,
    pub file_operation_timeout_ms: u64,
    pub cache_size: u32,
}

impl Default for PerformanceConfigSection {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrent_files: 10,
            file_operation_timeout_ms: 30_000,
            cache_size: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfigSection {
    pub request_timeout_ms: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_window_ms: u64,
}

impl Default for ApiConfigSection {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            rate_limit_requests: 50,
            rate_limit_window_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisConfigSection {
    pub supported_languages: Vec<String>,
    pub max_file_size: u64,
    pub skip_directories: Vec<String>,
    pub skip_file_patterns: Vec<String>,
}

impl Default for AnalysisConfigSection {
    fn default() -> Self {
        Self {
            supported_languages: [
                "javascript",
                "typescript",
                "python",
                "rust",
                "go",
                "java",
                "cpp",
                "c",
                "csharp",
                "ruby",
                "php",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_file_size: 5 * 1024 * 1024,
            skip_directories: [
                "node_modules",
                ".git",
                ".vscode",
                ".idea",
                "dist",
                "build",
                "target",
                "__pycache__",
                ".next",
                ".nuxt",
                ".venv",
                "venv",
                "vendor",
                "out",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            skip_file_patterns: [
                "*.log", "*.tmp", "*.cache", "*.lock", "*.map", "*.min.js", "*.bundle.js",
                "*.chunk.js",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfigSection {
    pub level: LogLevel,
    pub enable_performance_logging: bool,
    pub mcp_server: bool,
}

impl Default for LoggingConfigSection {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_performance_logging: false,
            mcp_server: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnamnesisConfig {
    pub database: DatabaseConfigSection,
    pub performance: PerformanceConfigSection,
    pub api: ApiConfigSection,
    pub analysis: AnalysisConfigSection,
    pub logging: LoggingConfigSection,
}

impl AnamnesisConfig {
    /// Build a config from hard-coded defaults, then apply environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides(&EnvReader);
        config
    }

    /// Testable seam: override lookups come through a trait so tests can inject
    /// a fake environment without mutating the process's real one.
    fn apply_env_overrides(&mut self, env: &dyn EnvLookup) {
        if let Some(filename) = env.get("ANAMNESIS_DB_FILENAME") {
            self.database.filename = filename;
        }

        if let Some(raw) = env.get("ANAMNESIS_BATCH_SIZE") {
            match raw.parse::<u32>() {
                Ok(v) => self.performance.batch_size = v,
                Err(_) => tracing::warn!("invalid ANAMNESIS_BATCH_SIZE: {raw}"),
            }
        }

        if let Some(raw) = env.get("ANAMNESIS_MAX_CONCURRENT") {
            match raw.parse::<u32>() {
                Ok(v) => self.performance.max_concurrent_files = v,
                Err(_) => tracing::warn!("invalid ANAMNESIS_MAX_CONCURRENT: {raw}"),
            }
        }

        if let Some(raw) = env.get("ANAMNESIS_REQUEST_TIMEOUT") {
            match raw.parse::<u64>() {
                Ok(v) => self.api.request_timeout_ms = v,
                Err(_) => tracing::warn!("invalid ANAMNESIS_REQUEST_TIMEOUT: {raw}"),
            }
        }

        if let Some(raw) = env.get("ANAMNESIS_LOG_LEVEL") {
            match LogLevel::from_env_str(&raw) {
                Some(level) => self.logging.level = level,
                None => tracing::warn!("invalid ANAMNESIS_LOG_LEVEL: {raw}"),
            }
        }

        if let Some(raw) = env.get("ANAMNESIS_PERFORMANCE_LOGGING") {
            if raw.eq_ignore_ascii_case("true") {
                self.logging.enable_performance_logging = true;
            }
        }

        if let Some(raw) = env.get("MCP_SERVER") {
            if raw.eq_ignore_ascii_case("true") {
                self.logging.mcp_server = true;
            }
        }
    }

    /// Resolve the database path for a given project root (or cwd when `None`).
    /// The database always lives inside the analyzed project directory.
    pub fn database_path(&self, project_path: Option<&Path>) -> PathBuf {
        let base = project_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
        let filename = &self.database.filename;
        if filename.contains('/') || filename.contains('\\') {
            tracing::warn!(
                "ANAMNESIS_DB_FILENAME ('{}') contains path separators; \
                 the database directory is always the project path ({})",
                filename,
                base.display()
            );
        }
        base.join(filename)
    }

    /// Validate the loaded configuration, returning every violation at once.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.performance.batch_size == 0 {
            errors.push("performance.batch_size must be greater than 0".to_string());
        }
        if self.performance.max_concurrent_files == 0 {
            errors.push("performance.max_concurrent_files must be greater than 0".to_string());
        }
        if self.api.rate_limit_requests == 0 {
            errors.push("api.rate_limit_requests must be greater than 0".to_string());
        }
        if self.analysis.max_file_size == 0 {
            errors.push("analysis.max_file_size must be greater than 0".to_string());
        }
        if self.database.filename.trim().is_empty() {
            errors.push("database.filename cannot be empty".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Human-readable environment-variable documentation, used by `check --verbose`
    /// and `setup` in the CLI boundary.
    pub fn configuration_help() -> Vec<&'static str> {
        vec![
            "Environment Variables:",
            "  ANAMNESIS_DB_FILENAME - Database filename (default: anamnesis.db)",
            "  ANAMNESIS_BATCH_SIZE - File processing batch size (default: 50)",
            "  ANAMNESIS_MAX_CONCURRENT - Max concurrent file operations (default: 10)",
            "  ANAMNESIS_REQUEST_TIMEOUT - API request timeout in ms (default: 30000)",
            "  ANAMNESIS_LOG_LEVEL - Logging level: error|warn|info|debug (default: info)",
            "  ANAMNESIS_PERFORMANCE_LOGGING - Enable performance logging (default: false)",
            "  MCP_SERVER - Redirect all logging to stderr (default: false)",
            "",
            "Note: the database always lives inside the analyzed project directory",
        ]
    }
}

trait EnvLookup {
    fn get(&self, key: &str) -> Option<String>;
}

struct EnvReader;

impl EnvLookup for EnvReader {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeEnv(HashMap<&'static str, &'static str>);
    impl EnvLookup for FakeEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|s| s.to_string())
        }
    }

    #[test]
    fn defaults_match_original_implementation() {
        let config = AnamnesisConfig::default();
        assert_eq!(config.database.filename, "anamnesis.db");
        assert_eq!(config.performance.batch_size, 50);
        assert_eq!(config.performance.max_concurrent_files, 10);
        assert_eq!(config.api.request_timeout_ms, 30_000);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn invalid_integer_env_keeps_default() {
        let mut config = AnamnesisConfig::default();
        let env = FakeEnv(HashMap::from([("ANAMNESIS_BATCH_SIZE", "not-a-number")]));
        config.apply_env_overrides(&env);
        assert_eq!(config.performance.batch_size, 50);
    }

    #[test]
    fn valid_overrides_apply() {
        let mut config = AnamnesisConfig::default();
        let env = FakeEnv(HashMap::from([
            ("ANAMNESIS_BATCH_SIZE", "25"),
            ("ANAMNESIS_LOG_LEVEL", "debug"),
            ("MCP_SERVER", "true"),
        ]));
        config.apply_env_overrides(&env);
        assert_eq!(config.performance.batch_size, 25);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.mcp_server);
    }

    #[test]
    fn validate_reports_every_violation_at_once() {
        let config = AnamnesisConfig {
            performance: PerformanceConfigSection {
                batch_size: 0,
                max_concurrent_files: 0,
                ..Default::default()
            },
            database: DatabaseConfigSection {
                filename: "  ".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn database_path_always_under_project_root() {
        let config = AnamnesisConfig::default();
        let path = config.database_path(Some(Path::new("/tmp/project")));
        assert_eq!(path, PathBuf::from("/tmp/project/anamnesis.db"));
    }
}
