//! Conversion between flat CPD rows and the backend's nested arrays.
//!
//! - No evidence: a column vector, one singleton list per state:
//!   `[0.7, 0.3]` becomes `[[0.7], [0.3]]`.
//! - `N` evidence variables: an array of shape `[2; N] ++ [states]`, walked in
//!   the same order as [`enumerate_combinations`](super::enumerate_combinations)
//!   so flat row `i` is always combination `i`.

use serde::{Deserialize, Serialize};

use super::{combination_count, PARENT_CARDINALITY};
use crate::error::{CpdError, CpdResult};

/// A nested array of probabilities as exchanged with the inference backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendValues {
    Value(f64),
    List(Vec<BackendValues>),
}

impl BackendValues {
    fn list(items: impl IntoIterator<Item = BackendValues>) -> Self {
        BackendValues::List(items.into_iter().collect())
    }

    fn describe(&self) -> String {
        match self {
            BackendValues::Value(v) => format!("number {}", v),
            BackendValues::List(items) => format!("list of {}", items.len()),
        }
    }
}

/// Convert flat rows into the backend's nested representation.
pub fn to_backend_shape<S: AsRef<str>>(
    rows: &[Vec<f64>],
    evidence: &[S],
    state_count: usize,
) -> CpdResult<BackendValues> {
    let expected_rows = combination_count(evidence.len());
    if rows.len() != expected_rows {
        return Err(shape_error(format!(
            "expected {} rows for {} evidence variables, got {}",
            expected_rows,
            evidence.len(),
            rows.len()
        )));
    }
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != state_count) {
        return Err(shape_error(format!(
            "row {} has {} states, expected {}",
            i,
            row.len(),
            state_count
        )));
    }

    if evidence.is_empty() {
        let column = rows[0]
            .iter()
            .map(|&v| BackendValues::list([BackendValues::Value(v)]));
        return Ok(BackendValues::list(column));
    }

    Ok(nest(rows))
}

/// Split rows into equal blocks per state of the slowest-varying parent.
fn nest(rows: &[Vec<f64>]) -> BackendValues {
    if rows.len() == 1 {
        return BackendValues::list(rows[0].iter().map(|&v| BackendValues::Value(v)));
    }

    let block = rows.len() / PARENT_CARDINALITY;
    BackendValues::list(rows.chunks(block).map(nest))
}

/// Convert the backend's nested representation into flat rows.
pub fn from_backend_shape<S: AsRef<str>>(
    values: &BackendValues,
    evidence: &[S],
    state_count: usize,
) -> CpdResult<Vec<Vec<f64>>> {
    if evidence.is_empty() {
        let items = expect_list(values, state_count, "column vector")?;
        let row = items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                BackendValues::List(cell) => match cell.as_slice() {
                    [BackendValues::Value(v)] => Ok(*v),
                    _ => Err(shape_error(format!(
                        "column entry {} must hold exactly one number",
                        i
                    ))),
                },
                other => Err(shape_error(format!(
                    "column entry {} must be a singleton list, got {}",
                    i,
                    other.describe()
                ))),
            })
            .collect::<CpdResult<Vec<f64>>>()?;
        return Ok(vec![row]);
    }

    let mut rows = Vec::with_capacity(combination_count(evidence.len()));
    flatten_into(values, 0, evidence.len(), state_count, &mut rows)?;
    Ok(rows)
}

fn flatten_into(
    values: &BackendValues,
    depth: usize,
    evidence_count: usize,
    state_count: usize,
    rows: &mut Vec<Vec<f64>>,
) -> CpdResult<()> {
    if depth == evidence_count {
        let items = expect_list(values, state_count, "state row")?;
        let row = items
            .iter()
            .map(|item| match item {
                BackendValues::Value(v) => Ok(*v),
                other => Err(shape_error(format!(
                    "state row at depth {} holds {}, expected a number",
                    depth,
                    other.describe()
                ))),
            })
            .collect::<CpdResult<Vec<f64>>>()?;
        rows.push(row);
        return Ok(());
    }

    let branches = expect_list(values, PARENT_CARDINALITY, "parent branch")?;
    for branch in branches {
        flatten_into(branch, depth + 1, evidence_count, state_count, rows)?;
    }
    Ok(())
}

fn expect_list<'a>(
    values: &'a BackendValues,
    len: usize,
    what: &str,
) -> CpdResult<&'a [BackendValues]> {
    match values {
        BackendValues::List(items) if items.len() == len => Ok(items),
        BackendValues::List(items) => Err(shape_error(format!(
            "{} has {} entries, expected {}",
            what,
            items.len(),
            len
        ))),
        other => Err(shape_error(format!(
            "{} must be a list, got {}",
            what,
            other.describe()
        ))),
    }
}

fn shape_error(message: String) -> CpdError {
    CpdError::Shape { message }
}
