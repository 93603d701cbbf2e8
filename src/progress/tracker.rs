use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    reconcile, reconcile_with_previous, LockedMastery, MasteryProbabilities, Reconciliation,
    ScoreMap,
};
use crate::error::AppResult;
use crate::network::DependencyTree;
use crate::storage::{
    locked_mastery, recorded_scores, snapshot_from_rows, unlocked_estimates, ProgressKey,
    ProgressStore,
};

/// Applies reconciliation results to a progress store.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Rebuild the table from the persisted snapshot alone.
    pub async fn load(&self, key: &ProgressKey, tree: &DependencyTree) -> AppResult<Reconciliation> {
        self.prepare(key, tree, &MasteryProbabilities::new(), &ScoreMap::new())
            .await
    }

    /// Reconcile an inference result against the persisted state.
    ///
    /// `scores` are merged over the persisted scores. Unlocked rows keep their
    /// last estimate until a new inference value replaces it. Nothing is
    /// written.
    pub async fn prepare(
        &self,
        key: &ProgressKey,
        tree: &DependencyTree,
        inference: &MasteryProbabilities,
        scores: &ScoreMap,
    ) -> AppResult<Reconciliation> {
        let snapshot = self.store.get_snapshot(key).await?;
        let locked = locked_mastery(&snapshot);
        let previous = unlocked_estimates(&snapshot);

        let mut merged = recorded_scores(&snapshot);
        merged.extend(scores.iter().map(|(node, score)| (node.clone(), *score)));

        let result = reconcile_with_previous(tree, inference, &locked, &previous, &merged);
        if !result.ignored.is_empty() {
            warn!(
                key = %key,
                ignored = ?result.ignored,
                "Inference returned nodes outside the dependency tree"
            );
        }
        debug!(
            key = %key,
            rows = result.rows.len(),
            newly_locked = result.newly_locked.len(),
            "Progress reconciled"
        );
        Ok(result)
    }

    /// Overwrite the persisted snapshot with a reconciliation's rows.
    pub async fn persist(&self, key: &ProgressKey, result: &Reconciliation) -> AppResult<()> {
        let snapshot = snapshot_from_rows(&result.rows);
        self.store.save_snapshot(key, &snapshot).await?;
        info!(
            key = %key,
            nodes = snapshot.len(),
            newly_locked = ?result.newly_locked,
            "Progress snapshot persisted"
        );
        Ok(())
    }

    /// Reconcile, lock newly estimated nodes and persist.
    pub async fn apply(
        &self,
        key: &ProgressKey,
        tree: &DependencyTree,
        inference: &MasteryProbabilities,
        scores: &ScoreMap,
    ) -> AppResult<Reconciliation> {
        let result = self.prepare(key, tree, inference, scores).await?;
        self.persist(key, &result).await?;
        Ok(result)
    }

    /// Clear the persisted snapshot and return the unestimated table.
    pub async fn reset(&self, key: &ProgressKey, tree: &DependencyTree) -> AppResult<Reconciliation> {
        self.store.delete_snapshot(key).await?;
        info!(key = %key, "Progress reset");
        Ok(reconcile(
            tree,
            &MasteryProbabilities::new(),
            &LockedMastery::new(),
            &ScoreMap::new(),
        ))
    }

    /// Clear the lock flag of one node.
    ///
    /// The stored estimate is kept until a later inference result covers the
    /// node. Returns `false` when the node has no locked row.
    pub async fn unlock(&self, key: &ProgressKey, node: &str) -> AppResult<bool> {
        let mut snapshot = self.store.get_snapshot(key).await?;
        match snapshot.get_mut(node) {
            Some(progress) if progress.is_locked => progress.is_locked = false,
            _ => {
                debug!(key = %key, node = %node, "Nothing to unlock");
                return Ok(false);
            }
        }

        self.store.save_snapshot(key, &snapshot).await?;
        info!(key = %key, node = %node, "Estimate unlocked");
        Ok(true)
    }
}
