//! Competency dependency tree.
//!
//! The network structure arrives as `{node, parents}` records. The display
//! tree hangs every node under each of its parents, starting from the nodes
//! without parents, and is flattened depth-first with each node shown once.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A network variable and the variables it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub node: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl NetworkNode {
    /// Create a node record
    pub fn new(node: impl Into<String>, parents: &[&str]) -> Self {
        Self {
            node: node.into(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// One line of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub node: String,
    /// Depth in the display tree, 0 for roots.
    pub indent: usize,
    pub parents: BTreeSet<String>,
}

/// Flattened dependency tree in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyTree {
    entries: Vec<TreeEntry>,
    children: BTreeMap<String, Vec<String>>,
}

impl DependencyTree {
    /// Build and flatten the tree from network structure records.
    ///
    /// Parents named in a record but never declared themselves are treated
    /// as parentless roots. Nodes reachable only through a cycle are appended
    /// as extra roots so every node still appears exactly once.
    pub fn from_nodes(nodes: &[NetworkNode]) -> Self {
        let mut parents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for record in nodes {
            let entry = parents.entry(record.node.clone()).or_default();
            for parent in &record.parents {
                if parent != &record.node {
                    entry.insert(parent.clone());
                }
            }
        }
        let undeclared: Vec<String> = parents
            .values()
            .flatten()
            .filter(|p| !parents.contains_key(*p))
            .cloned()
            .collect();
        for name in undeclared {
            parents.entry(name).or_default();
        }

        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (node, node_parents) in &parents {
            children.entry(node.clone()).or_default();
            for parent in node_parents {
                children.entry(parent.clone()).or_default().push(node.clone());
            }
        }
        for list in children.values_mut() {
            list.sort();
            list.dedup();
        }

        let roots: Vec<String> = parents
            .iter()
            .filter(|(_, p)| p.is_empty())
            .map(|(n, _)| n.clone())
            .collect();

        let mut flat = flatten(&roots, &children);
        let mut seen: HashSet<String> = flat.iter().map(|(n, _)| n.clone()).collect();
        for node in parents.keys() {
            if !seen.contains(node) {
                let extra = flatten(std::slice::from_ref(node), &children);
                for (name, indent) in extra {
                    if seen.insert(name.clone()) {
                        flat.push((name, indent));
                    }
                }
            }
        }

        let entries = flat
            .into_iter()
            .map(|(node, indent)| TreeEntry {
                parents: parents.get(&node).cloned().unwrap_or_default(),
                node,
                indent,
            })
            .collect();

        Self { entries, children }
    }

    /// Entries in display order
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Node names in display order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.node.as_str())
    }

    /// Look up one entry
    pub fn get(&self, node: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.node == node)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.children.contains_key(node)
    }

    /// Direct dependents of `node`, sorted by name
    pub fn children_of(&self, node: &str) -> &[String] {
        self.children.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct prerequisites of `node`
    pub fn parents_of(&self, node: &str) -> Vec<String> {
        self.get(node)
            .map(|e| e.parents.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Depth-first flattening from `roots`, visiting each node once globally.
///
/// The first path to reach a node decides its indent. `children` lists are
/// walked in their given order.
pub fn flatten(roots: &[String], children: &BTreeMap<String, Vec<String>>) -> Vec<(String, usize)> {
    let mut visited = HashSet::new();
    let mut out = Vec::new();

    for root in roots {
        // Explicit stack keeps deep chains off the call stack.
        let mut stack = vec![(root.clone(), 0usize)];
        while let Some((node, indent)) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            if let Some(kids) = children.get(&node) {
                for child in kids.iter().rev() {
                    if !visited.contains(child) {
                        stack.push((child.clone(), indent + 1));
                    }
                }
            }
            out.push((node, indent));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimation_tree() -> DependencyTree {
        DependencyTree::from_nodes(&[
            NetworkNode::new("Estimation", &[]),
            NetworkNode::new("Quotient_Using_Multiples", &["Estimation"]),
            NetworkNode::new("Multiply_Two_Numbers", &["Estimation"]),
        ])
    }

    fn layout(tree: &DependencyTree) -> Vec<(&str, usize)> {
        tree.entries()
            .iter()
            .map(|e| (e.node.as_str(), e.indent))
            .collect()
    }

    #[test]
    fn test_children_sorted_by_name() {
        let tree = estimation_tree();
        assert_eq!(
            layout(&tree),
            vec![
                ("Estimation", 0),
                ("Multiply_Two_Numbers", 1),
                ("Quotient_Using_Multiples", 1),
            ]
        );
        assert_eq!(
            tree.children_of("Estimation"),
            &["Multiply_Two_Numbers".to_string(), "Quotient_Using_Multiples".to_string()]
        );
    }

    #[test]
    fn test_diamond_visits_descendant_once() {
        let tree = DependencyTree::from_nodes(&[
            NetworkNode::new("Root", &[]),
            NetworkNode::new("Left", &["Root"]),
            NetworkNode::new("Right", &["Root"]),
            NetworkNode::new("Bottom", &["Left", "Right"]),
        ]);

        assert_eq!(
            layout(&tree),
            vec![("Root", 0), ("Left", 1), ("Bottom", 2), ("Right", 1)]
        );
        assert_eq!(tree.nodes().filter(|n| *n == "Bottom").count(), 1);
        assert_eq!(tree.parents_of("Bottom"), vec!["Left", "Right"]);
    }

    #[test]
    fn test_ordering_network_layout() {
        // Edges from the ordering domain network.
        let tree = DependencyTree::from_nodes(&[
            NetworkNode::new("Ordering_Numbers", &[]),
            NetworkNode::new("Order_Numbers_20", &["Ordering_Numbers"]),
            NetworkNode::new("Order_Numbers_100", &["Ordering_Numbers", "Order_Numbers_20"]),
            NetworkNode::new("Order_Numbers_1k", &["Ordering_Numbers", "Order_Numbers_100"]),
            NetworkNode::new("Numbers_N", &["Ordering_Numbers", "Compare_Order_Decimals"]),
            NetworkNode::new("Compare_Order_Decimals", &["Ordering_Numbers", "Order_Numbers_1k"]),
        ]);

        assert_eq!(tree.len(), 6);
        assert_eq!(tree.entries()[0].node, "Ordering_Numbers");
        let unique: HashSet<&str> = tree.nodes().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn test_cycle_does_not_recurse_forever() {
        let tree = DependencyTree::from_nodes(&[
            NetworkNode::new("A", &["B"]),
            NetworkNode::new("B", &["A"]),
            NetworkNode::new("C", &[]),
        ]);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.entries()[0].node, "C");
        assert_eq!(layout(&tree)[1..], [("A", 0), ("B", 1)]);
    }

    #[test]
    fn test_undeclared_parent_becomes_root() {
        let tree = DependencyTree::from_nodes(&[NetworkNode::new("Child", &["Ghost"])]);
        assert_eq!(layout(&tree), vec![("Ghost", 0), ("Child", 1)]);
        assert!(tree.contains("Ghost"));
    }

    #[test]
    fn test_empty_structure() {
        let tree = DependencyTree::from_nodes(&[]);
        assert!(tree.is_empty());
        assert!(tree.children_of("X").is_empty());
    }

    #[test]
    fn test_flatten_with_explicit_order() {
        let mut children = BTreeMap::new();
        children.insert("R".to_string(), vec!["Z".to_string(), "A".to_string()]);
        let flat = flatten(&["R".to_string()], &children);
        assert_eq!(
            flat,
            vec![("R".to_string(), 0), ("Z".to_string(), 1), ("A".to_string(), 1)]
        );
    }
}
