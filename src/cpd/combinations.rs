use super::PARENT_CARDINALITY;

/// Number of parent-state combinations for `evidence_count` binary parents.
pub fn combination_count(evidence_count: usize) -> usize {
    PARENT_CARDINALITY.pow(evidence_count as u32)
}

/// Enumerate every parent-state combination in nested-loop order.
///
/// The first evidence variable varies slowest and the last fastest, which is
/// the row order of [`Cpd`](super::Cpd) values. No evidence yields a single
/// empty combination (the unconditional case).
///
/// ```
/// use tutor_bayes::cpd::enumerate_combinations;
///
/// assert_eq!(enumerate_combinations::<&str>(&[]), vec![Vec::<u8>::new()]);
/// assert_eq!(
///     enumerate_combinations(&["A", "B"]),
///     vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
/// );
/// ```
pub fn enumerate_combinations<S: AsRef<str>>(evidence: &[S]) -> Vec<Vec<u8>> {
    let width = evidence.len();
    let mut combinations = Vec::with_capacity(combination_count(width));
    let mut current = vec![0u8; width];

    loop {
        combinations.push(current.clone());

        // Odometer step from the last position.
        let mut position = width;
        loop {
            if position == 0 {
                return combinations;
            }
            position -= 1;
            if (current[position] as usize) + 1 < PARENT_CARDINALITY {
                current[position] += 1;
                break;
            }
            current[position] = 0;
        }
    }
}

/// Row index of a combination, the inverse of [`enumerate_combinations`].
///
/// Returns `None` if any state is outside the parent cardinality.
pub fn combination_index(combination: &[u8]) -> Option<usize> {
    combination.iter().try_fold(0usize, |acc, &state| {
        let state = state as usize;
        (state < PARENT_CARDINALITY).then(|| acc * PARENT_CARDINALITY + state)
    })
}

/// Human-readable label for a row, e.g. `A=0, B=1`.
pub fn describe_combination<S: AsRef<str>>(evidence: &[S], combination: &[u8]) -> String {
    if evidence.is_empty() {
        return "(prior)".to_string();
    }

    evidence
        .iter()
        .zip(combination)
        .map(|(name, state)| format!("{}={}", name.as_ref(), state))
        .collect::<Vec<_>>()
        .join(", ")
}
