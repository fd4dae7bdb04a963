// ABOUTME: Per-language standard-library module name sets, used to flag is_stdlib on imports.

use anamnesis_parser::Language;
use once_cell::sync::Lazy;
use std::collections::HashSet;

static PYTHON_STDLIB: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "os", "sys", "re", "json", "collections", "itertools", "functools", "typing", "abc",
        "asyncio", "dataclasses", "datetime", "enum", "pathlib", "subprocess", "threading",
        "logging", "unittest", "math", "random", "string", "io", "copy", "contextlib",
        "argparse", "http", "socket", "struct", "hashlib", "uuid", "time", "shutil", "glob",
        "tempfile", "traceback", "warnings", "weakref", "queue", "multiprocessing", "csv",
        "sqlite3", "pickle", "base64", "textwrap", "inspect", "importlib", "operator",
    ]
    .into_iter()
    .collect()
});

static GO_STDLIB: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "fmt", "os", "io", "strings", "strconv", "sync", "time", "context", "errors", "bytes",
        "net", "net/http", "encoding/json", "sort", "math", "reflect", "regexp", "bufio", "log",
        "path", "path/filepath", "testing", "unicode", "container/list", "flag",
    ]
    .into_iter()
    .collect()
});

static RUST_STDLIB: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["std", "core", "alloc", "proc_macro", "test"].into_iter().collect()
});

static TS_JS_STDLIB: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "fs", "path", "os", "http", "https", "crypto", "util", "events", "stream", "url",
        "querystring", "child_process", "assert", "buffer", "net", "zlib", "readline",
    ]
    .into_iter()
    .collect()
});

pub fn is_stdlib(language: Language, module: &str) -> bool {
    match language {
        Language::Python => {
            let root = module.split('.').next().unwrap_or(module);
            PYTHON_STDLIB.contains(root)
        }
        Language::Go => {
            let root = module.split('/').next().unwrap_or(module);
            GO_STDLIB.contains(module) || GO_STDLIB.contains(root)
        }
        Language::Rust => {
            let root = module.split("::").next().unwrap_or(module);
            RUST_STDLIB.contains(root)
        }
        Language::TypeScript | Language::Tsx | Language::JavaScript => TS_JS_STDLIB.contains(module),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_collections_is_stdlib() {
        assert!(is_stdlib(Language::Python, "collections"));
    }

    #[test]
    fn python_third_party_package_is_not_stdlib() {
        assert!(!is_stdlib(Language::Python, "requests"));
    }

    #[test]
    fn rust_crate_name_is_not_stdlib() {
        assert!(!is_stdlib(Language::Rust, "serde"));
    }

    #[test]
    fn go_nested_stdlib_path_is_stdlib() {
        assert!(is_stdlib(Language::Go, "net/http"));
    }
}
