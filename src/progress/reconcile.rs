use std::collections::{HashMap, HashSet};

use super::{ActualMastery, LockedMastery, MasteryProbabilities, ProgressRow, ScoreMap};
use crate::network::DependencyTree;

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// One row per tree node, in tree display order
    pub rows: Vec<ProgressRow>,
    /// Nodes that took their estimate from this inference result and must be
    /// locked from now on
    pub newly_locked: Vec<String>,
    /// Inference nodes absent from the tree
    pub ignored: Vec<String>,
}

impl Reconciliation {
    pub fn row(&self, node: &str) -> Option<&ProgressRow> {
        self.rows.iter().find(|r| r.node == node)
    }
}

/// Merge tree, inference result, locked estimates and scores into rows.
///
/// Locked estimates win over the inference result. Nodes estimated for the
/// first time are reported in [`Reconciliation::newly_locked`] and marked
/// locked in their rows.
pub fn reconcile(
    tree: &DependencyTree,
    inference: &MasteryProbabilities,
    locked: &LockedMastery,
    scores: &ScoreMap,
) -> Reconciliation {
    reconcile_with_previous(tree, inference, locked, &MasteryProbabilities::new(), scores)
}

/// [`reconcile`] with earlier unlocked estimates as a fallback.
///
/// Estimate precedence is locked value, then the new inference value, then
/// the `previous` estimate, then blank. A row filled from `previous` stays
/// unlocked.
pub fn reconcile_with_previous(
    tree: &DependencyTree,
    inference: &MasteryProbabilities,
    locked: &LockedMastery,
    previous: &MasteryProbabilities,
    scores: &ScoreMap,
) -> Reconciliation {
    let mut resolver = MasteryResolver::new(tree, scores);
    let mut newly_locked = Vec::new();

    let rows = tree
        .entries()
        .iter()
        .map(|entry| {
            let (estimated_mastery, is_locked) = match locked.get(&entry.node) {
                Some(&frozen) => (Some(frozen), true),
                None => match inference.get(&entry.node) {
                    Some(&p) => {
                        newly_locked.push(entry.node.clone());
                        (Some(p.clamp(0.0, 1.0)), true)
                    }
                    None => (previous.get(&entry.node).copied(), false),
                },
            };

            let raw_score = scores.get(&entry.node).copied();
            ProgressRow {
                node: entry.node.clone(),
                indent: entry.indent,
                estimated_mastery,
                percentage: raw_score.and_then(|s| s.percentage()),
                raw_score,
                actual_mastery: resolver.resolve(&entry.node),
                is_locked,
            }
        })
        .collect();

    let ignored = inference
        .keys()
        .filter(|node| !tree.contains(node))
        .cloned()
        .collect();

    Reconciliation {
        rows,
        newly_locked,
        ignored,
    }
}

/// Pass/fail roll-up over the tree.
///
/// A scored node is classified by its own score. An unscored node passes only
/// when all of its children pass; a leaf without a score is unknown.
struct MasteryResolver<'a> {
    tree: &'a DependencyTree,
    scores: &'a ScoreMap,
    memo: HashMap<String, ActualMastery>,
    visiting: HashSet<String>,
}

impl<'a> MasteryResolver<'a> {
    fn new(tree: &'a DependencyTree, scores: &'a ScoreMap) -> Self {
        Self {
            tree,
            scores,
            memo: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    fn resolve(&mut self, node: &str) -> ActualMastery {
        if let Some(&known) = self.memo.get(node) {
            return known;
        }
        if let Some(score) = self.scores.get(node) {
            let mastery = score.classify();
            self.memo.insert(node.to_string(), mastery);
            return mastery;
        }
        // Cycle through an unscored node.
        if !self.visiting.insert(node.to_string()) {
            return ActualMastery::Unknown;
        }

        let tree = self.tree;
        let children = tree.children_of(node);
        let mastery = if !children.is_empty()
            && children
                .iter()
                .all(|child| self.resolve(child) == ActualMastery::Pass)
        {
            ActualMastery::Pass
        } else {
            ActualMastery::Unknown
        };

        self.visiting.remove(node);
        self.memo.insert(node.to_string(), mastery);
        mastery
    }
}
