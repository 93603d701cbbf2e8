//! End-to-end mastery assessment.
//!
//! Fetches the network structure, runs the inference query, reconciles the
//! result with the persisted progress and persists the new snapshot.
//! Responses that arrive after the selection changed are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::inference::{InferenceBackend, QueryRequest, QueryResponse};
use crate::network::DependencyTree;
use crate::progress::{
    weakest_prerequisite, AssessmentScore, ProgressTracker, Reconciliation, ScoreMap,
};
use crate::storage::ProgressKey;

/// A completed assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub response: QueryResponse,
    pub reconciliation: Reconciliation,
    /// Weakest direct prerequisite of a failed competency
    pub recommended_focus: Option<String>,
}

/// Result of [`MasteryWorkflow::assess`].
#[derive(Debug, Clone, PartialEq)]
pub enum AssessOutcome {
    Completed(Assessment),
    /// The selection changed while the query was in flight. Nothing was
    /// persisted.
    Superseded,
}

/// Drives assessment, progress loading and reset for one session.
pub struct MasteryWorkflow {
    backend: Arc<dyn InferenceBackend>,
    tracker: ProgressTracker,
    generation: AtomicU64,
}

impl MasteryWorkflow {
    pub fn new(backend: Arc<dyn InferenceBackend>, tracker: ProgressTracker) -> Self {
        Self {
            backend,
            tracker,
            generation: AtomicU64::new(0),
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Current selection generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Switch to another (student, domain) pair.
    ///
    /// Every assessment started before this call is superseded.
    pub fn select(&self, key: &ProgressKey) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(key = %key, generation, "Selection changed");
        generation
    }

    /// Fetch and flatten the dependency tree of `network`.
    pub async fn dependency_tree(&self, network: &str) -> AppResult<DependencyTree> {
        let nodes = self.backend.fetch_structure(network).await?;
        Ok(DependencyTree::from_nodes(&nodes))
    }

    /// Query inference for one assessment result and record the outcome.
    pub async fn assess(&self, request: &QueryRequest) -> AppResult<AssessOutcome> {
        let started = self.generation();
        let key = ProgressKey::new(request.student_id.clone(), request.domain_id);

        let tree = self.dependency_tree(&request.network).await?;
        let response = self.backend.query(request).await?;
        if self.is_stale(started) {
            return Ok(self.superseded(&key, started));
        }

        let probabilities = response.probabilities();
        let mut scores = ScoreMap::new();
        scores.insert(
            request.competency.clone(),
            AssessmentScore::new(request.score, request.total),
        );

        let reconciliation = self
            .tracker
            .prepare(&key, &tree, &probabilities, &scores)
            .await?;
        if self.is_stale(started) {
            return Ok(self.superseded(&key, started));
        }
        self.tracker.persist(&key, &reconciliation).await?;

        let recommended_focus = if request.is_passing() {
            None
        } else {
            let parents = tree.parents_of(&request.competency);
            weakest_prerequisite(parents.as_slice(), &probabilities)
        };

        info!(
            key = %key,
            competency = %request.competency,
            passing = request.is_passing(),
            focus = recommended_focus.as_deref().unwrap_or("-"),
            "Assessment recorded"
        );

        Ok(AssessOutcome::Completed(Assessment {
            response,
            reconciliation,
            recommended_focus,
        }))
    }

    /// Progress table for a pair, from persisted state only.
    pub async fn progress(&self, network: &str, key: &ProgressKey) -> AppResult<Reconciliation> {
        let tree = self.dependency_tree(network).await?;
        self.tracker.load(key, &tree).await
    }

    /// Clear a pair's snapshot.
    pub async fn reset(&self, network: &str, key: &ProgressKey) -> AppResult<Reconciliation> {
        let tree = self.dependency_tree(network).await?;
        self.tracker.reset(key, &tree).await
    }

    pub async fn unlock(&self, key: &ProgressKey, node: &str) -> AppResult<bool> {
        self.tracker.unlock(key, node).await
    }

    fn is_stale(&self, started: u64) -> bool {
        self.generation() != started
    }

    fn superseded(&self, key: &ProgressKey, started: u64) -> AssessOutcome {
        warn!(
            key = %key,
            started,
            current = self.generation(),
            "Discarding superseded assessment result"
        );
        AssessOutcome::Superseded
    }
}
