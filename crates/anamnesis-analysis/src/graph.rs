// ABOUTME: In-memory module dependency graph with Tarjan's SCC for cycle detection.
// ABOUTME: Node/edge naming grounded on codegraph-graph/src/graph.rs's shape; storage
// ABOUTME: here is a plain adjacency map since this graph is rebuilt per analysis run.

use std::collections::{HashMap, HashSet};

use anamnesis_extract::{ExtractedImport, ImportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct CircularDependency {
    pub cycle: Vec<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub include_stdlib: bool,
    pub include_external: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self { include_stdlib: false, include_external: true }
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub target: String,
    pub kind: ImportKind,
}

#[derive(Debug, Clone, Default)]
pub struct GraphMetrics {
    pub total_modules: u32,
    pub total_edges: u32,
    pub avg_imports: f64,
    pub avg_imported_by: f64,
    pub max_depth: u32,
}

pub struct DependencyGraph {
    adjacency: HashMap<String, Vec<Edge>>,
    reverse: HashMap<String, HashSet<String>>,
}

/// Each unique module path from `imports` becomes a node; `source` is the module the
/// imports were extracted from. stdlib/external imports are excluded unless the
/// matching option is set.
pub fn build(source: &str, imports: &[ExtractedImport], options: &GraphOptions) -> DependencyGraph {
    let mut adjacency: HashMap<String, Vec<Edge>> = HashMap::new();
    let mut reverse: HashMap<String, HashSet<String>> = HashMap::new();
    adjacency.entry(source.to_string()).or_default();

    for import in imports {
        if import.is_stdlib && !options.include_stdlib {
            continue;
        }
        let is_external = !import.is_relative && !import.is_stdlib;
        if is_external && !options.include_external {
            continue;
        }
        adjacency.entry(import.module.clone()).or_default();
        adjacency
            .get_mut(source)
            .unwrap()
            .push(Edge { target: import.module.clone(), kind: import.kind });
        reverse.entry(import.module.clone()).or_default().insert(source.to_string());
    }

    DependencyGraph { adjacency, reverse }
}

impl DependencyGraph {
    pub fn nodes(&self) -> impl Iterator<Item = &String> {
        self.adjacency.keys()
    }

    pub fn fan_out(&self, module: &str) -> usize {
        self.adjacency.get(module).map(Vec::len).unwrap_or(0)
    }

    pub fn fan_in(&self, module: &str) -> usize {
        self.reverse.get(module).map(HashSet::len).unwrap_or(0)
    }

    /// `I = fan_out / (fan_in + fan_out)`; a module with no edges at all has `I = 0`.
    pub fn instability(&self, module: &str) -> f64 {
        let out = self.fan_out(module) as f64;
        let inn = self.fan_in(module) as f64;
        if out + inn == 0.0 {
            0.0
        } else {
            out / (out + inn)
        }
    }

    pub fn metrics(&self) -> GraphMetrics {
        let total_modules = self.adjacency.len() as u32;
        let total_edges: u32 = self.adjacency.values().map(|e| e.len() as u32).sum();
        let avg_imports = if total_modules == 0 { 0.0 } else { total_edges as f64 / total_modules as f64 };
        let avg_imported_by = if total_modules == 0 {
            0.0
        } else {
            self.reverse.values().map(HashSet::len).sum::<usize>() as f64 / total_modules as f64
        };

        let cycles = self.find_cycles();
        let cyclic_nodes: HashSet<&str> = cycles.iter().flat_map(|c| c.cycle.iter().map(String::as_str)).collect();
        let max_depth = self
            .adjacency
            .keys()
            .filter(|m| !cyclic_nodes.contains(m.as_str()))
            .map(|m| self.longest_path_from(m, &mut HashSet::new()))
            .max()
            .unwrap_or(0);

        GraphMetrics { total_modules, total_edges, avg_imports, avg_imported_by, max_depth }
    }

    fn longest_path_from(&self, module: &str, visiting: &mut HashSet<String>) -> u32 {
        if !visiting.insert(module.to_string()) {
            return 0;
        }
        let depth = self
            .adjacency
            .get(module)
            .map(|edges| edges.iter().map(|e| 1 + self.longest_path_from(&e.target, visiting)).max().unwrap_or(0))
            .unwrap_or(0);
        visiting.remove(module);
        depth
    }

    /// Tarjan's strongly-connected-components algorithm; every SCC with more than one
    /// node (or a single node with a self-edge) is reported as a `CircularDependency`.
    pub fn find_cycles(&self) -> Vec<CircularDependency> {
        let mut tarjan = Tarjan::new(self);
        for node in self.adjacency.keys() {
            if !tarjan.indices.contains_key(node) {
                tarjan.strong_connect(node);
            }
        }
        tarjan
            .sccs
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.has_self_edge(&scc[0]))
            .map(|scc| {
                let severity = if scc.len() > 3 {
                    Severity::High
                } else if scc.len() > 1 {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                CircularDependency { cycle: scc, severity }
            })
            .collect()
    }

    fn has_self_edge(&self, module: &str) -> bool {
        self.adjacency.get(module).map(|edges| edges.iter().any(|e| e.target == module)).unwrap_or(false)
    }
}

struct Tarjan<'a> {
    graph: &'a DependencyGraph,
    index_counter: u32,
    indices: HashMap<String, u32>,
    lowlink: HashMap<String, u32>,
    on_stack: HashSet<String>,
    stack: Vec<String>,
    sccs: Vec<Vec<String>>,
}

impl<'a> Tarjan<'a> {
    fn new(graph: &'a DependencyGraph) -> Self {
        Self {
            graph,
            index_counter: 0,
            indices: HashMap::new(),
            lowlink: HashMap::new(),
            on_stack: HashSet::new(),
            stack: Vec::new(),
            sccs: Vec::new(),
        }
    }

    fn strong_connect(&mut self, node: &str) {
        self.indices.insert(node.to_string(), self.index_counter);
        self.lowlink.insert(node.to_string(), self.index_counter);
        self.index_counter += 1;
        self.stack.push(node.to_string());
        self.on_stack.insert(node.to_string());

        let neighbors: Vec<String> = self.graph.adjacency.get(node).map(|edges| edges.iter().map(|e| e.target.clone()).collect()).unwrap_or_default();

        for neighbor in neighbors {
            if !self.indices.contains_key(&neighbor) {
                self.strong_connect(&neighbor);
                let neighbor_low = self.lowlink[&neighbor];
                let node_low = self.lowlink[node];
                self.lowlink.insert(node.to_string(), node_low.min(neighbor_low));
            } else if self.on_stack.contains(&neighbor) {
                let neighbor_index = self.indices[&neighbor];
                let node_low = self.lowlink[node];
                self.lowlink.insert(node.to_string(), node_low.min(neighbor_index));
            }
        }

        if self.lowlink[node] == self.indices[node] {
            let mut component = Vec::new();
            loop {
                let w = self.stack.pop().unwrap();
                self.on_stack.remove(&w);
                let done = w == node;
                component.push(w);
                if done {
                    break;
                }
            }
            self.sccs.push(component);
        }
    }
}
