// ABOUTME: Multi-language parsing substrate: language registry, tree-sitter wrapper,
// ABOUTME: S-expression query execution, and tree traversal utilities.

pub mod language;
pub mod query;
pub mod traverse;
pub mod wrapper;

pub use language::{Language, LanguageRegistry};
pub use query::{compile, CaptureMatch, CompiledQuery};
pub use traverse::{find_nodes, traverse, walk};
pub use wrapper::{parse, NodeType, ParseContext, ParsedNode};
