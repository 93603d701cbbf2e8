//! Conditional probability tables.
//!
//! A [`Cpd`] is always held in the flat representation: one row per parent
//! combination (in [`enumerate_combinations`] order), one column per state of
//! the variable. Conversion to the nested shape the inference backend expects
//! happens only at the boundary, in [`shape`].

mod balance;
mod combinations;
mod editor;
pub mod shape;

pub use balance::*;
pub use combinations::*;
pub use editor::*;
pub use shape::BackendValues;

use serde::{Deserialize, Serialize};

use crate::error::{CpdError, CpdResult};

/// Number of states per network variable.
pub const STATE_COUNT: usize = 2;
/// Number of states assumed for every evidence (parent) variable.
pub const PARENT_CARDINALITY: usize = 2;
/// Lowest probability the balancer will produce.
pub const MIN_PROBABILITY: f64 = 0.01;
/// Highest probability the balancer will produce.
pub const MAX_PROBABILITY: f64 = 0.99;
/// Allowed deviation of a row sum from 1.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// A conditional probability table for one network variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cpd {
    /// Network node this table describes.
    pub variable: String,
    /// Ordered parent variable names (possibly empty).
    pub evidence: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Cpd {
    /// Create a table for a binary variable, validating its shape.
    pub fn new(
        variable: impl Into<String>,
        evidence: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> CpdResult<Self> {
        Self::with_states(variable, evidence, STATE_COUNT, rows)
    }

    /// Create a table whose variable has `state_count` states.
    pub fn with_states(
        variable: impl Into<String>,
        evidence: Vec<String>,
        state_count: usize,
        rows: Vec<Vec<f64>>,
    ) -> CpdResult<Self> {
        let variable = variable.into();
        check_shape(&variable, evidence.len(), state_count, &rows)?;

        for (r, row) in rows.iter().enumerate() {
            for (i, &value) in row.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(CpdError::InvalidValue {
                        variable,
                        row: r,
                        index: i,
                        value,
                    });
                }
            }
        }

        Ok(Self {
            variable,
            evidence,
            rows,
        })
    }

    /// A binary table with every row at 0.5 / 0.5.
    pub fn uniform(variable: impl Into<String>, evidence: Vec<String>) -> Self {
        let rows = vec![vec![0.5; STATE_COUNT]; combination_count(evidence.len())];
        Self {
            variable: variable.into(),
            evidence,
            rows,
        }
    }

    /// Build a table from the backend's nested representation.
    pub fn from_backend(
        variable: impl Into<String>,
        evidence: Vec<String>,
        values: &BackendValues,
    ) -> CpdResult<Self> {
        let variable = variable.into();
        let rows = shape::from_backend_shape(values, &evidence, STATE_COUNT).map_err(|e| {
            match e {
                CpdError::Shape { message } => CpdError::Shape {
                    message: format!("{}: {}", variable, message),
                },
                other => other,
            }
        })?;
        Self::new(variable, evidence, rows)
    }

    /// The nested representation the backend expects for this table.
    pub fn to_backend(&self) -> CpdResult<BackendValues> {
        shape::to_backend_shape(&self.rows, &self.evidence, self.state_count())
    }

    /// Number of parent variables.
    pub fn evidence_count(&self) -> usize {
        self.evidence.len()
    }

    /// Number of states of the variable (row width).
    pub fn state_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(STATE_COUNT)
    }

    /// All rows, in parent-combination order.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Row for combination `index`.
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Parent-state combinations, aligned with [`Cpd::rows`].
    pub fn combinations(&self) -> Vec<Vec<u8>> {
        enumerate_combinations(&self.evidence)
    }

    /// Set one cell and rebalance its row so it still sums to 1.
    ///
    /// Returns the rebalanced row.
    pub fn set_value(&mut self, row: usize, index: usize, value: f64) -> CpdResult<&[f64]> {
        let len = self.rows.len();
        let current = self
            .rows
            .get_mut(row)
            .ok_or(CpdError::IndexOutOfRange { index: row, len })?;

        let balanced = balance_row(current, index, value)?;
        *current = balanced;
        Ok(current.as_slice())
    }

    /// Check that every row is a probability distribution.
    pub fn validate_distribution(&self) -> CpdResult<()> {
        for (r, row) in self.rows.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(CpdError::RowSum {
                    variable: self.variable.clone(),
                    row: r,
                    sum,
                });
            }
        }
        Ok(())
    }
}

/// Reject rows whose count or width does not match the declared shape.
pub(crate) fn check_shape(
    variable: &str,
    evidence_count: usize,
    state_count: usize,
    rows: &[Vec<f64>],
) -> CpdResult<()> {
    let expected = combination_count(evidence_count);
    if rows.len() != expected {
        return Err(CpdError::RowCount {
            variable: variable.to_string(),
            expected,
            actual: rows.len(),
        });
    }

    for (r, row) in rows.iter().enumerate() {
        if row.len() != state_count {
            return Err(CpdError::RowWidth {
                variable: variable.to_string(),
                row: r,
                expected: state_count,
                actual: row.len(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_accepts_matching_shape() {
        let cpd = Cpd::new(
            "Estimation",
            names(&["A", "B"]),
            vec![
                vec![0.5, 0.5],
                vec![0.6, 0.4],
                vec![0.7, 0.3],
                vec![0.8, 0.2],
            ],
        )
        .unwrap();

        assert_eq!(cpd.evidence_count(), 2);
        assert_eq!(cpd.state_count(), 2);
        assert_eq!(cpd.row(2), Some(&[0.7, 0.3][..]));
        assert_eq!(cpd.combinations().len(), 4);
    }

    #[test]
    fn test_new_rejects_wrong_row_count() {
        let err = Cpd::new("X", names(&["A"]), vec![vec![0.5, 0.5]]).unwrap_err();
        assert_eq!(
            err,
            CpdError::RowCount {
                variable: "X".to_string(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_new_rejects_wrong_row_width() {
        let err = Cpd::new("X", vec![], vec![vec![0.2, 0.3, 0.5]]).unwrap_err();
        assert!(matches!(err, CpdError::RowWidth { row: 0, expected: 2, actual: 3, .. }));
    }

    #[test]
    fn test_new_rejects_negative_and_nan() {
        let err = Cpd::new("X", vec![], vec![vec![-0.1, 1.1]]).unwrap_err();
        assert!(matches!(err, CpdError::InvalidValue { index: 0, .. }));

        let err = Cpd::new("X", vec![], vec![vec![0.5, f64::NAN]]).unwrap_err();
        assert!(matches!(err, CpdError::InvalidValue { index: 1, .. }));
    }

    #[test]
    fn test_uniform_table() {
        let cpd = Cpd::uniform("Numbers_N", names(&["A", "B", "C"]));
        assert_eq!(cpd.rows().len(), 8);
        assert!(cpd.rows().iter().all(|r| r == &vec![0.5, 0.5]));
        assert!(cpd.validate_distribution().is_ok());
    }

    #[test]
    fn test_set_value_rebalances_row() {
        let mut cpd = Cpd::uniform("X", names(&["A"]));
        let row = cpd.set_value(1, 0, 0.8).unwrap().to_vec();
        assert_eq!(row, vec![0.8, 0.2]);
        assert_eq!(cpd.row(0), Some(&[0.5, 0.5][..]));
    }

    #[test]
    fn test_set_value_out_of_range() {
        let mut cpd = Cpd::uniform("X", vec![]);
        assert_eq!(
            cpd.set_value(1, 0, 0.3).unwrap_err(),
            CpdError::IndexOutOfRange { index: 1, len: 1 }
        );
        assert_eq!(
            cpd.set_value(0, 2, 0.3).unwrap_err(),
            CpdError::IndexOutOfRange { index: 2, len: 2 }
        );
    }

    #[test]
    fn test_validate_distribution_rejects_bad_sum() {
        let cpd = Cpd::new("X", vec![], vec![vec![0.5, 0.4]]).unwrap();
        assert!(matches!(
            cpd.validate_distribution(),
            Err(CpdError::RowSum { row: 0, .. })
        ));
    }

    #[test]
    fn test_deterministic_rows_load() {
        let cpd = Cpd::new("X", vec![], vec![vec![1.0, 0.0]]).unwrap();
        assert!(cpd.validate_distribution().is_ok());
    }
}
