// ABOUTME: Complexity metrics (cyclomatic/cognitive/Halstead/LOC/maintainability) and
// ABOUTME: dependency-graph cycle detection via Tarjan's SCC.

pub mod complexity;
pub mod graph;
pub mod halstead;

pub use complexity::{analyze_file, cognitive_complexity, cyclomatic_complexity, loc_breakdown, maintainability_index, FileComplexity, FunctionComplexity, LocBreakdown, MaintainabilityBand};
pub use graph::{build as build_dependency_graph, CircularDependency, DependencyGraph, GraphMetrics, GraphOptions, Severity};
pub use halstead::HalsteadMetrics;
