use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cpd::BackendValues;
use crate::error::{AppError, AppResult};
use crate::progress::PASS_THRESHOLD;

/// One CPD as served by the inference backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpdRecord {
    #[serde(default)]
    pub evidence: Vec<String>,
    pub values: BackendValues,
}

/// Response of the CPD listing endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CpdListResponse {
    pub cpds: BTreeMap<String, CpdRecord>,
}

/// Kind of staged CPD change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Update,
    Delete,
}

/// A change record in a CPD batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpdChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub network: String,
    pub variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<BackendValues>,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Body of the batch endpoint
#[derive(Debug, Serialize)]
pub struct BatchRequest<'a> {
    pub changes: &'a [CpdChange],
}

/// Response of the batch endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// A mastery query for one tested competency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Network file the competency belongs to
    #[serde(rename = "bif_file")]
    pub network: String,
    pub competency: String,
    pub score: f64,
    pub total: f64,
    pub student_id: String,
    pub domain_id: i64,
}

impl QueryRequest {
    /// Create a validated query request
    pub fn new(
        network: impl Into<String>,
        competency: impl Into<String>,
        score: f64,
        total: f64,
        student_id: impl Into<String>,
        domain_id: i64,
    ) -> AppResult<Self> {
        let request = Self {
            network: network.into(),
            competency: competency.into(),
            score,
            total,
            student_id: student_id.into(),
            domain_id,
        };
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> AppResult<()> {
        if self.network.trim().is_empty() {
            return Err(validation("network", "cannot be empty"));
        }
        if self.competency.trim().is_empty() {
            return Err(validation("competency", "cannot be empty"));
        }
        if !self.total.is_finite() || self.total <= 0.0 {
            return Err(validation("total", "must be greater than zero"));
        }
        if !self.score.is_finite() || self.score < 0.0 {
            return Err(validation("score", "cannot be negative"));
        }
        if self.score > self.total {
            return Err(validation("score", "cannot exceed total"));
        }
        Ok(())
    }

    /// Fraction of the assessment answered correctly
    pub fn ratio(&self) -> f64 {
        self.score / self.total
    }

    /// Whether the score meets the mastery threshold.
    ///
    /// The backend only runs inference for failing scores.
    pub fn is_passing(&self) -> bool {
        self.ratio() >= PASS_THRESHOLD
    }
}

fn validation(field: &str, reason: &str) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Result of a mastery query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub competency: String,
    pub score: f64,
    pub total: f64,
    /// Absent when the score passed and no inference ran
    #[serde(default)]
    pub mastery_probabilities: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub next_focus: Option<String>,
}

impl QueryResponse {
    /// Mastery probabilities, empty when the backend ran no inference
    pub fn probabilities(&self) -> BTreeMap<String, f64> {
        self.mastery_probabilities.clone().unwrap_or_default()
    }
}
