//! Storage layer for per-student progress snapshots.
//!
//! A snapshot is the full set of progress rows for one (student, domain)
//! pair, keyed by competency node. Saving a snapshot replaces whatever was
//! stored for that pair.

mod http;
mod sqlite;

pub use http::HttpProgressStore;
pub use sqlite::SqliteProgressStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::StorageResult;
use crate::progress::{
    ActualMastery, AssessmentScore, LockedMastery, MasteryProbabilities, ProgressRow, ScoreMap,
};

/// Identifies one student's progress within one content domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgressKey {
    pub student_id: String,
    pub domain_id: i64,
}

impl ProgressKey {
    pub fn new(student_id: impl Into<String>, domain_id: i64) -> Self {
        Self {
            student_id: student_id.into(),
            domain_id,
        }
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.student_id, self.domain_id)
    }
}

/// Persisted state of one competency node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProgress {
    #[serde(default)]
    pub estimated_mastery: Option<f64>,
    /// `"score/total"`, see [`AssessmentScore`]
    #[serde(default)]
    pub raw_score: Option<String>,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub actual_mastery: ActualMastery,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredProgress {
    /// Parsed raw score, `None` when absent or unreadable
    pub fn score(&self) -> Option<AssessmentScore> {
        self.raw_score.as_deref().and_then(|s| s.parse().ok())
    }
}

impl From<&ProgressRow> for StoredProgress {
    fn from(row: &ProgressRow) -> Self {
        Self {
            estimated_mastery: row.estimated_mastery,
            raw_score: row.raw_score.map(|s| s.to_string()),
            percentage: row.percentage,
            actual_mastery: row.actual_mastery,
            is_locked: row.is_locked,
            updated_at: None,
        }
    }
}

/// Node to persisted state for one (student, domain) pair.
pub type ProgressSnapshot = BTreeMap<String, StoredProgress>;

/// Build a snapshot from reconciled rows.
pub fn snapshot_from_rows(rows: &[ProgressRow]) -> ProgressSnapshot {
    rows.iter()
        .map(|row| (row.node.clone(), StoredProgress::from(row)))
        .collect()
}

/// Locked estimates recorded in a snapshot.
pub fn locked_mastery(snapshot: &ProgressSnapshot) -> LockedMastery {
    snapshot
        .iter()
        .filter(|(_, p)| p.is_locked)
        .filter_map(|(node, p)| p.estimated_mastery.map(|m| (node.clone(), m)))
        .collect()
}

/// Estimates recorded on unlocked rows.
pub fn unlocked_estimates(snapshot: &ProgressSnapshot) -> MasteryProbabilities {
    snapshot
        .iter()
        .filter(|(_, p)| !p.is_locked)
        .filter_map(|(node, p)| p.estimated_mastery.map(|m| (node.clone(), m)))
        .collect()
}

/// Scores recorded in a snapshot.
pub fn recorded_scores(snapshot: &ProgressSnapshot) -> ScoreMap {
    snapshot
        .iter()
        .filter_map(|(node, p)| p.score().map(|s| (node.clone(), s)))
        .collect()
}

/// Persistence operations for progress snapshots.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Get the snapshot for a key; empty when nothing is stored.
    async fn get_snapshot(&self, key: &ProgressKey) -> StorageResult<ProgressSnapshot>;
    /// Replace the snapshot for a key.
    async fn save_snapshot(&self, key: &ProgressKey, snapshot: &ProgressSnapshot)
        -> StorageResult<()>;
    /// Delete the snapshot for a key.
    async fn delete_snapshot(&self, key: &ProgressKey) -> StorageResult<()>;
}
