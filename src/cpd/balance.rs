//! Single-cell edits that keep a probability row normalized.
//!
//! Arithmetic is settled in hundredths so that the two-decimal rounding the
//! editor displays never disturbs the row sum.

use super::{MAX_PROBABILITY, MIN_PROBABILITY};
use crate::error::{CpdError, CpdResult};

const SCALE: f64 = 100.0;
const MIN_CENTS: i64 = 1;
const MAX_CENTS: i64 = 99;
const TOTAL_CENTS: i64 = 100;

/// Clamp a probability to the editable range.
pub fn clamp_probability(value: f64) -> f64 {
    value.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * SCALE).round() / SCALE
}

/// Set `row[changed_index]` to `new_value` and rebalance the rest of the row.
///
/// The new value is clamped to `[0.01, 0.99]` and rounded to two decimals.
/// For a two-state row the other entry becomes `1 - new_value`. Wider rows
/// spread the remaining mass over the other entries in proportion to their
/// previous weights (evenly when those were all zero). Any rounding residual
/// goes to the first other entry with room for it, so the result always sums
/// to 1 and every entry stays within `[0.01, 0.99]`.
///
/// With `k` other entries the edited value is capped at `1 - 0.01 * k`, the
/// largest value that leaves every other entry at the floor.
///
/// Redistribution uses the weights of `row` as given, so repeating the same
/// edit on its own output is not guaranteed to be a no-op for rows wider than
/// two.
pub fn balance_row(row: &[f64], changed_index: usize, new_value: f64) -> CpdResult<Vec<f64>> {
    let len = row.len();
    if changed_index >= len {
        return Err(CpdError::IndexOutOfRange {
            index: changed_index,
            len,
        });
    }
    if !new_value.is_finite() {
        return Err(CpdError::NotAProbability { value: new_value });
    }

    let others = len as i64 - 1;
    if others < 1 || others * MIN_CENTS > TOTAL_CENTS - MIN_CENTS {
        return Err(CpdError::Unbalanceable { len });
    }

    let ceiling = MAX_CENTS.min(TOTAL_CENTS - others * MIN_CENTS);
    let chosen = to_cents(clamp_probability(new_value)).clamp(MIN_CENTS, ceiling);
    let remaining = TOTAL_CENTS - chosen;

    let mut cents = vec![0i64; len];
    cents[changed_index] = chosen;

    if len == 2 {
        cents[1 - changed_index] = remaining.clamp(MIN_CENTS, MAX_CENTS);
        return Ok(from_cents(&cents));
    }

    let previous_total: f64 = row
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != changed_index)
        .map(|(_, v)| v.max(0.0))
        .sum();

    let remaining_mass = remaining as f64 / SCALE;
    let mut shares = vec![0.0; len];
    for (i, share) in shares.iter_mut().enumerate() {
        if i == changed_index {
            continue;
        }
        *share = if previous_total > 0.0 {
            remaining_mass * row[i].max(0.0) / previous_total
        } else {
            remaining_mass / others as f64
        };
        cents[i] = to_cents(*share).clamp(MIN_CENTS, MAX_CENTS);
    }

    let assigned: i64 = cents.iter().sum();
    let mut residual = TOTAL_CENTS - assigned;
    if residual != 0 {
        // Prefer entries that received mass, then any other entry.
        let preferred = (0..len).filter(|&i| i != changed_index && shares[i] > 0.0);
        let fallback = (0..len).filter(|&i| i != changed_index);
        for i in preferred.chain(fallback) {
            if residual == 0 {
                break;
            }
            let adjustment = if residual > 0 {
                residual.min(MAX_CENTS - cents[i])
            } else {
                residual.max(MIN_CENTS - cents[i])
            };
            cents[i] += adjustment;
            residual -= adjustment;
        }
    }

    Ok(from_cents(&cents))
}

fn to_cents(value: f64) -> i64 {
    (value * SCALE).round() as i64
}

fn from_cents(cents: &[i64]) -> Vec<f64> {
    cents.iter().map(|&c| c as f64 / SCALE).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpd::ROW_SUM_TOLERANCE;

    fn assert_valid(row: &[f64]) {
        let sum: f64 = row.iter().sum();
        assert!(
            (sum - 1.0).abs() <= ROW_SUM_TOLERANCE,
            "row {:?} sums to {}",
            row,
            sum
        );
        for v in row {
            assert!(
                (MIN_PROBABILITY..=MAX_PROBABILITY).contains(v),
                "value {} out of range in {:?}",
                v,
                row
            );
        }
    }

    #[test]
    fn test_two_state_complement() {
        assert_eq!(balance_row(&[0.5, 0.5], 0, 0.8).unwrap(), vec![0.8, 0.2]);
        assert_eq!(balance_row(&[0.5, 0.5], 1, 0.35).unwrap(), vec![0.65, 0.35]);
    }

    #[test]
    fn test_two_state_clamps_extremes() {
        assert_eq!(balance_row(&[0.5, 0.5], 0, 1.0).unwrap(), vec![0.99, 0.01]);
        assert_eq!(balance_row(&[0.5, 0.5], 0, -3.0).unwrap(), vec![0.01, 0.99]);
        assert_eq!(balance_row(&[0.5, 0.5], 1, 0.0).unwrap(), vec![0.99, 0.01]);
    }

    #[test]
    fn test_two_state_rounds_input() {
        assert_eq!(balance_row(&[0.5, 0.5], 0, 0.456).unwrap(), vec![0.46, 0.54]);
    }

    #[test]
    fn test_three_state_proportional() {
        let row = balance_row(&[0.2, 0.3, 0.5], 0, 0.5).unwrap();
        assert_eq!(row[0], 0.5);
        assert!((row[1] - 0.1875).abs() < 0.01);
        assert!((row[2] - 0.3125).abs() < 0.01);
        assert_valid(&row);
    }

    #[test]
    fn test_three_state_zero_siblings_split_evenly() {
        let row = balance_row(&[1.0, 0.0, 0.0], 0, 0.4).unwrap();
        assert_eq!(row, vec![0.4, 0.3, 0.3]);
    }

    #[test]
    fn test_three_state_residual_stays_in_range() {
        let row = balance_row(&[0.34, 0.33, 0.33], 0, 0.01).unwrap();
        assert_eq!(row[0], 0.01);
        assert_valid(&row);
    }

    #[test]
    fn test_wide_row_caps_changed_value() {
        let row = balance_row(&[0.25, 0.25, 0.25, 0.25], 2, 0.99).unwrap();
        assert_eq!(row[2], 0.97);
        assert_valid(&row);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            balance_row(&[0.5, 0.5], 2, 0.3).unwrap_err(),
            CpdError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert!(matches!(
            balance_row(&[0.5, 0.5], 0, f64::NAN).unwrap_err(),
            CpdError::NotAProbability { .. }
        ));
        assert_eq!(
            balance_row(&[1.0], 0, 0.3).unwrap_err(),
            CpdError::Unbalanceable { len: 1 }
        );
        assert_eq!(
            balance_row(&vec![0.0; 101], 0, 0.3).unwrap_err(),
            CpdError::Unbalanceable { len: 101 }
        );
    }

    #[test]
    fn test_every_edit_yields_valid_distribution() {
        let rows: Vec<Vec<f64>> = vec![
            vec![0.5, 0.5],
            vec![0.01, 0.99],
            vec![0.2, 0.3, 0.5],
            vec![0.0, 0.0, 1.0],
            vec![0.1, 0.2, 0.3, 0.4],
            vec![0.97, 0.01, 0.01, 0.01],
        ];
        let values = [-1.0, 0.0, 0.004, 0.01, 0.125, 0.333, 0.5, 0.777, 0.99, 1.0, 2.0];

        for row in &rows {
            for index in 0..row.len() {
                for &value in &values {
                    let balanced = balance_row(row, index, value).unwrap();
                    assert_eq!(balanced.len(), row.len());
                    assert_valid(&balanced);
                }
            }
        }
    }

    #[test]
    fn test_helpers() {
        assert_eq!(round2(0.456), 0.46);
        assert_eq!(clamp_probability(1.5), MAX_PROBABILITY);
        assert_eq!(clamp_probability(-0.5), MIN_PROBABILITY);
    }
}
