// ABOUTME: Maps canonical language names and their aliases to tree-sitter grammars.
// ABOUTME: Grounded on codegraph-parser/src/language.rs's LanguageRegistry/LanguageConfig.

use std::collections::HashMap;

use anamnesis_core::error::AnamnesisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Java,
    Cpp,
    CSharp,
    Ruby,
    Php,
}

impl Language {
    pub const ALL: &'static [Language] = &[
        Language::Rust,
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Tsx,
        Language::Go,
        Language::Java,
        Language::Cpp,
        Language::CSharp,
        Language::Ruby,
        Language::Php,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Go => "go",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
        }
    }

    fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Language::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Language::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Language::Php => tree_sitter_php::LANGUAGE_PHP.into(),
        }
    }
}

struct LanguageConfig {
    language: Language,
    extensions: &'static [&'static str],
}

/// Canonical aliases that resolve to a grammar-backed `Language` without being the
/// grammar's own canonical name (e.g. `jsx` reuses the JavaScript grammar).
const ALIASES: &[(&str, Language)] = &[
    ("rs", Language::Rust),
    ("py", Language::Python),
    ("py3", Language::Python),
    ("js", Language::JavaScript),
    ("jsx", Language::JavaScript),
    ("mjs", Language::JavaScript),
    ("cjs", Language::JavaScript),
    ("ts", Language::TypeScript),
    ("golang", Language::Go),
    ("c++", Language::Cpp),
    ("cc", Language::Cpp),
    ("cs", Language::CSharp),
    ("c#", Language::CSharp),
    ("rb", Language::Ruby),
];

/// Names this engine recognizes as real languages but has no tree-sitter grammar
/// for in this build. `detect_language`/`supports` treat these as known-but-unparsed:
/// extractors fall back to the generic path (§4.2) rather than raising.
const RECOGNIZED_UNGROUNDED: &[&str] = &[
    "c", "swift", "kotlin", "scala", "dart", "elixir", "erlang", "haskell", "lua", "perl", "r",
    "shell", "bash", "sh", "html", "css", "scss", "less", "json", "yaml", "toml", "xml",
    "markdown", "sql", "graphql", "dockerfile", "vue", "svelte",
];

pub struct LanguageRegistry {
    configs: HashMap<Language, LanguageConfig>,
    alias_lookup: HashMap<&'static str, Language>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        let mut configs = HashMap::new();
        configs.insert(
            Language::Rust,
            LanguageConfig { language: Language::Rust, extensions: &["rs"] },
        );
        configs.insert(
            Language::Python,
            LanguageConfig { language: Language::Python, extensions: &["py", "pyi"] },
        );
        configs.insert(
            Language::JavaScript,
            LanguageConfig { language: Language::JavaScript, extensions: &["js", "jsx", "mjs", "cjs"] },
        );
        configs.insert(
            Language::TypeScript,
            LanguageConfig { language: Language::TypeScript, extensions: &["ts"] },
        );
        configs.insert(
            Language::Tsx,
            LanguageConfig { language: Language::Tsx, extensions: &["tsx"] },
        );
        configs.insert(
            Language::Go,
            LanguageConfig { language: Language::Go, extensions: &["go"] },
        );
        configs.insert(
            Language::Java,
            LanguageConfig { language: Language::Java, extensions: &["java"] },
        );
        configs.insert(
            Language::Cpp,
            LanguageConfig {
                language: Language::Cpp,
                extensions: &["cpp", "cxx", "cc", "hpp", "hxx", "h"],
            },
        );
        configs.insert(
            Language::CSharp,
            LanguageConfig { language: Language::CSharp, extensions: &["cs"] },
        );
        configs.insert(
            Language::Ruby,
            LanguageConfig { language: Language::Ruby, extensions: &["rb", "rake", "gemspec"] },
        );
        configs.insert(
            Language::Php,
            LanguageConfig { language: Language::Php, extensions: &["php", "phtml"] },
        );

        let alias_lookup = ALIASES.iter().copied().collect();

        Self { configs, alias_lookup }
    }
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_parser(&self, language: Language) -> Result<tree_sitter::Parser, AnamnesisError> {
        let config = self
            .configs
            .get(&language)
            .ok_or_else(|| AnamnesisError::UnsupportedLanguage(language.canonical_name().to_string()))?;
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&config.language.grammar())
            .map_err(|e| AnamnesisError::UnsupportedLanguage(format!("{}: {e}", language.canonical_name())))?;
        Ok(parser)
    }

    /// Resolve a language name or alias to a grammar-backed `Language`. Names in
    /// `RECOGNIZED_UNGROUNDED` resolve to `Ok(None)`: known, but no grammar in this
    /// build. Anything else is `UnsupportedLanguage`.
    pub fn resolve_name(&self, name: &str) -> Result<Option<Language>, AnamnesisError> {
        let normalized = name.to_lowercase();
        for lang in Language::ALL {
            if lang.canonical_name() == normalized {
                return Ok(Some(*lang));
            }
        }
        if let Some(lang) = self.alias_lookup.get(normalized.as_str()) {
            return Ok(Some(*lang));
        }
        if RECOGNIZED_UNGROUNDED.contains(&normalized.as_str()) {
            return Ok(None);
        }
        Err(AnamnesisError::UnsupportedLanguage(name.to_string()))
    }

    pub fn detect_language(&self, path: &str) -> Result<Option<Language>, AnamnesisError> {
        let ext = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| AnamnesisError::UnsupportedLanguage(format!("no extension in {path}")))?;
        self.resolve_name(&ext)
    }

    pub fn extensions_for(&self, language: Language) -> &'static [&'static str] {
        self.configs.get(&language).map(|c| c.extensions).unwrap_or(&[])
    }

    pub fn supports(&self, language: Language) -> bool {
        self.configs.contains_key(&language)
    }

    pub fn list_supported(&self) -> Vec<Language> {
        Language::ALL.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_language_from_extension() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.detect_language("src/main.rs").unwrap(), Some(Language::Rust));
        assert_eq!(registry.detect_language("app.tsx").unwrap(), Some(Language::Tsx));
    }

    #[test]
    fn jsx_alias_resolves_to_javascript_grammar() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.detect_language("component.jsx").unwrap(), Some(Language::JavaScript));
    }

    #[test]
    fn recognized_ungrounded_language_resolves_to_none_not_error() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.resolve_name("swift").unwrap(), None);
    }

    #[test]
    fn truly_unknown_name_is_unsupported_language() {
        let registry = LanguageRegistry::new();
        assert!(registry.resolve_name("brainfuck").is_err());
    }

    #[test]
    fn parser_can_be_constructed_for_every_grammar_backed_language() {
        let registry = LanguageRegistry::new();
        for lang in Language::ALL {
            assert!(registry.create_parser(*lang).is_ok());
        }
    }
}
