use std::cmp::Ordering;

use super::MasteryProbabilities;

/// Prerequisite a student should work on after failing a competency.
///
/// With no parents there is nothing to recommend. A single parent is returned
/// as is. Otherwise the parent with the lowest mastery probability wins, ties
/// broken by name; when none of the parents has a probability the first one
/// is returned.
pub fn weakest_prerequisite<S: AsRef<str>>(
    parents: &[S],
    probabilities: &MasteryProbabilities,
) -> Option<String> {
    match parents {
        [] => None,
        [only] => Some(only.as_ref().to_string()),
        [first, ..] => parents
            .iter()
            .filter_map(|p| probabilities.get(p.as_ref()).map(|&prob| (p.as_ref(), prob)))
            .min_by(|a, b| compare_mastery(a, b))
            .map(|(name, _)| name.to_string())
            .or_else(|| Some(first.as_ref().to_string())),
    }
}

/// Nodes ordered from least to most mastered.
pub fn rank_by_mastery(probabilities: &MasteryProbabilities) -> Vec<(String, f64)> {
    let mut ranked: Vec<(&str, f64)> = probabilities
        .iter()
        .map(|(node, &p)| (node.as_str(), p))
        .collect();
    ranked.sort_by(compare_mastery);
    ranked
        .into_iter()
        .map(|(node, p)| (node.to_string(), p))
        .collect()
}

fn compare_mastery(a: &(&str, f64), b: &(&str, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0))
}
