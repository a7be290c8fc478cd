use std::collections::{HashMap, VecDeque};

use super::GraphLink;

/// Relation whose links define the vertical hierarchy in tree layout.
pub const TREE_RELATION: &str = "SubClassOf";

/// Depth of every node taking part in a `relation` link.
///
/// Links point from source to target. Roots are nodes no `relation` link
/// targets; a target sits one level below its deepest source. Nodes on or
/// below a cycle get no depth.
pub fn tree_depths(links: &[GraphLink], relation: &str) -> HashMap<String, usize> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indegree: HashMap<&str, usize> = HashMap::new();

    for link in links {
        if link.class() != Some(relation) || link.source == link.target {
            continue;
        }
        children
            .entry(link.source.as_str())
            .or_default()
            .push(link.target.as_str());
        indegree.entry(link.source.as_str()).or_insert(0);
        *indegree.entry(link.target.as_str()).or_insert(0) += 1;
    }

    let mut depths = HashMap::new();
    let mut queue = VecDeque::new();
    let mut roots = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect::<Vec<_>>();
    roots.sort_unstable();
    for root in roots {
        depths.insert(root.to_owned(), 0usize);
        queue.push_back(root);
    }

    while let Some(current) = queue.pop_front() {
        let depth = depths.get(current).copied().unwrap_or(0);
        let Some(targets) = children.get(current) else {
            continue;
        };
        for &target in targets {
            let entry = depths.entry(target.to_owned()).or_insert(0);
            *entry = (*entry).max(depth + 1);
            if let Some(remaining) = indegree.get_mut(target) {
                *remaining -= 1;
                if *remaining == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    depths.retain(|id, _| indegree.get(id.as_str()).is_some_and(|count| *count == 0));
    depths
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn link(id: &str, class: &str, source: &str, target: &str) -> GraphLink {
        let data = json!({"@rid": id, "@class": class})
            .as_object()
            .cloned()
            .unwrap_or_default();
        GraphLink::new(id.to_owned(), data, source.to_owned(), target.to_owned())
    }

    #[test]
    fn chain_depths_follow_link_direction() {
        let links = vec![
            link("ab", TREE_RELATION, "a", "b"),
            link("bc", TREE_RELATION, "b", "c"),
            link("ad", "AliasOf", "a", "d"),
        ];
        let depths = tree_depths(&links, TREE_RELATION);

        assert_eq!(depths.get("a"), Some(&0));
        assert_eq!(depths.get("b"), Some(&1));
        assert_eq!(depths.get("c"), Some(&2));
        assert_eq!(depths.get("d"), None);
    }

    #[test]
    fn depth_uses_the_longest_path() {
        let links = vec![
            link("ab", TREE_RELATION, "a", "b"),
            link("bc", TREE_RELATION, "b", "c"),
            link("ac", TREE_RELATION, "a", "c"),
        ];
        let depths = tree_depths(&links, TREE_RELATION);
        assert_eq!(depths.get("c"), Some(&2));
    }

    #[test]
    fn cycles_receive_no_depth() {
        let links = vec![
            link("ab", TREE_RELATION, "a", "b"),
            link("bc", TREE_RELATION, "b", "c"),
            link("cb", TREE_RELATION, "c", "b"),
        ];
        let depths = tree_depths(&links, TREE_RELATION);
        assert_eq!(depths.get("a"), Some(&0));
        assert_eq!(depths.get("b"), None);
        assert_eq!(depths.get("c"), None);
    }
}
