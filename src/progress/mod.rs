//! Per-student mastery progress.
//!
//! [`reconcile`] merges the dependency tree, the latest inference result, the
//! locked estimates and the assessment scores into display rows without side
//! effects. [`ProgressTracker`] applies the result to a [`ProgressStore`].
//!
//! [`ProgressStore`]: crate::storage::ProgressStore

mod focus;
mod reconcile;
mod tracker;

pub use focus::*;
pub use reconcile::*;
pub use tracker::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Score ratio at or above which an assessment counts as mastered.
pub const PASS_THRESHOLD: f64 = 0.7;

/// Node to mastery probability, as returned by an inference query.
pub type MasteryProbabilities = BTreeMap<String, f64>;

/// Node to frozen estimate for nodes whose estimate must not change.
pub type LockedMastery = BTreeMap<String, f64>;

/// Node to latest assessment score.
pub type ScoreMap = BTreeMap<String, AssessmentScore>;

/// Pass/fail classification of a competency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActualMastery {
    Pass,
    Fail,
    #[default]
    Unknown,
}

impl fmt::Display for ActualMastery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActualMastery::Pass => "Pass",
            ActualMastery::Fail => "Fail",
            ActualMastery::Unknown => "Unknown",
        };
        f.pad(label)
    }
}

impl FromStr for ActualMastery {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => Ok(ActualMastery::Pass),
            "fail" => Ok(ActualMastery::Fail),
            "" | "unknown" | "n/a" => Ok(ActualMastery::Unknown),
            other => Err(AppError::Validation {
                field: "actual_mastery".to_string(),
                reason: format!("unrecognized value '{}'", other),
            }),
        }
    }
}

/// A completed assessment result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssessmentScore {
    pub score: f64,
    pub total: f64,
}

impl AssessmentScore {
    pub fn new(score: f64, total: f64) -> Self {
        Self { score, total }
    }

    /// `score / total`, or `None` when the total is not positive
    pub fn ratio(&self) -> Option<f64> {
        if self.total > 0.0 && self.total.is_finite() && self.score.is_finite() {
            Some(self.score / self.total)
        } else {
            None
        }
    }

    /// Percentage of the total, rounded to 2 decimals
    pub fn percentage(&self) -> Option<f64> {
        self.ratio().map(|r| (r * 10_000.0).round() / 100.0)
    }

    pub fn classify(&self) -> ActualMastery {
        match self.ratio() {
            Some(r) if r >= PASS_THRESHOLD => ActualMastery::Pass,
            Some(_) => ActualMastery::Fail,
            None => ActualMastery::Unknown,
        }
    }
}

impl fmt::Display for AssessmentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.score, self.total)
    }
}

impl FromStr for AssessmentScore {
    type Err = AppError;

    /// Parse the `"score/total"` form, e.g. `"7/10"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| AppError::Validation {
            field: "raw_score".to_string(),
            reason,
        };

        let (score, total) = s
            .split_once('/')
            .ok_or_else(|| invalid(format!("expected 'score/total', got '{}'", s)))?;
        let score: f64 = score
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid score '{}'", score.trim())))?;
        let total: f64 = total
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid total '{}'", total.trim())))?;

        Ok(Self { score, total })
    }
}

/// One display row of the progress table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRow {
    pub node: String,
    pub indent: usize,
    /// Locked value, else the latest inference probability, else blank
    pub estimated_mastery: Option<f64>,
    pub raw_score: Option<AssessmentScore>,
    pub percentage: Option<f64>,
    pub actual_mastery: ActualMastery,
    pub is_locked: bool,
}

/// Display a probability or fraction as a percentage with 2 decimals.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
