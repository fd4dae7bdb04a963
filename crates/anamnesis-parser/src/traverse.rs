// ABOUTME: DFS traversal helpers over the ParsedNode tree produced by wrapper::parse.

use crate::wrapper::{NodeType, ParsedNode};

/// Preorder depth-first walk, yielding every node including the root.
pub fn walk(root: &ParsedNode) -> Vec<&ParsedNode> {
    let mut out = Vec::new();
    walk_into(root, &mut out);
    out
}

fn walk_into<'a>(node: &'a ParsedNode, out: &mut Vec<&'a ParsedNode>) {
    out.push(node);
    for child in &node.children {
        walk_into(child, out);
    }
}

/// Collects nodes matching an optional kind allowlist and an optional predicate.
/// Both filters are ANDed; omitting both returns every node in the tree.
pub fn find_nodes<'a, F>(root: &'a ParsedNode, kinds: Option<&[NodeType]>, predicate: Option<F>) -> Vec<&'a ParsedNode>
where
    F: Fn(&ParsedNode) -> bool,
{
    walk(root)
        .into_iter()
        .filter(|n| kinds.map_or(true, |ks| ks.contains(&n.node_type)))
        .filter(|n| predicate.as_ref().map_or(true, |p| p(n)))
        .collect()
}

/// Preorder traversal invoking `callback` on each node. Returning `false` from the
/// callback prunes that node's subtree without stopping the rest of the traversal.
pub fn traverse<F>(root: &ParsedNode, callback: &mut F)
where
    F: FnMut(&ParsedNode) -> bool,
{
    if !callback(root) {
        return;
    }
    for child in &root.children {
        traverse(child, callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{Language, LanguageRegistry};
    use crate::wrapper::parse;

    fn sample_tree() -> ParsedNode {
        let registry = LanguageRegistry::new();
        parse(&registry, "fn a() {}\nfn b() {}\nstruct S {}", Language::Rust)
            .unwrap()
            .root
    }

    #[test]
    fn walk_visits_root_and_all_descendants() {
        let root = sample_tree();
        let visited = walk(&root);
        assert!(visited.len() >= 1 + root.children.len());
        assert!(std::ptr::eq(visited[0], &root));
    }

    #[test]
    fn find_nodes_filters_by_kind() {
        let root = sample_tree();
        let functions = find_nodes(&root, Some(&[NodeType::Function]), None::<fn(&ParsedNode) -> bool>);
        assert_eq!(functions.len(), 2);
    }

    #[test]
    fn find_nodes_filters_by_predicate() {
        let root = sample_tree();
        let named = find_nodes(&root, None, Some(|n: &ParsedNode| n.name.is_some()));
        assert!(named.iter().all(|n| n.name.is_some()));
        assert!(!named.is_empty());
    }

    #[test]
    fn traverse_prunes_subtree_when_callback_returns_false() {
        let root = sample_tree();
        let mut visited_kinds = Vec::new();
        traverse(&root, &mut |n| {
            visited_kinds.push(n.native_kind.clone());
            n.node_type != NodeType::Function
        });
        assert!(visited_kinds.iter().any(|k| k == "function_item"));
        assert!(!visited_kinds.iter().any(|k| k == "identifier"));
    }
}
