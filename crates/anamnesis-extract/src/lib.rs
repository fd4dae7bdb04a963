// ABOUTME: Symbol, import, and pattern extraction built on anamnesis-parser's trees.

pub mod import;
pub mod pattern;
pub mod stdlib;
pub mod symbol;

pub use import::{extract_imports, ExtractedImport, ImportKind, ImportedName};
pub use pattern::{detect_patterns, DetectedPattern, PatternDetectionOptions, PatternKind};
pub use symbol::{extract_symbols, ExtractedSymbol, SymbolExtractionOptions, SymbolKind, Visibility};
