//! CPD editing session for one network.
//!
//! Edits are local until [`CpdEditor::submit`] sends the staged changes to the
//! inference backend as one batch. The queue is cleared only once the backend
//! confirms the batch.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::Cpd;
use crate::error::{AppResult, CpdError, CpdResult};
use crate::inference::{ChangeType, CpdChange, InferenceBackend};

/// A change staged for the next batch.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    /// Replace the variable's table
    Update(Cpd),
    /// Remove the variable's table
    Delete {
        variable: String,
        evidence: Vec<String>,
    },
}

impl PendingChange {
    /// Variable this change applies to
    pub fn variable(&self) -> &str {
        match self {
            PendingChange::Update(cpd) => &cpd.variable,
            PendingChange::Delete { variable, .. } => variable,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            PendingChange::Update(_) => ChangeType::Update,
            PendingChange::Delete { .. } => ChangeType::Delete,
        }
    }

    /// Convert into the backend's change record.
    pub fn to_wire(&self, network: &str) -> CpdResult<CpdChange> {
        match self {
            PendingChange::Update(cpd) => Ok(CpdChange {
                change_type: ChangeType::Update,
                network: network.to_string(),
                variable: cpd.variable.clone(),
                values: Some(cpd.to_backend()?),
                evidence: cpd.evidence.clone(),
            }),
            PendingChange::Delete { variable, evidence } => Ok(CpdChange {
                change_type: ChangeType::Delete,
                network: network.to_string(),
                variable: variable.clone(),
                values: None,
                evidence: evidence.clone(),
            }),
        }
    }
}

/// Staged changes, at most one per variable, in order of first staging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeQueue {
    changes: Vec<PendingChange>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a change, replacing any earlier change to the same variable.
    pub fn stage(&mut self, change: PendingChange) {
        match self
            .changes
            .iter_mut()
            .find(|c| c.variable() == change.variable())
        {
            Some(existing) => *existing = change,
            None => self.changes.push(change),
        }
    }

    pub fn get(&self, variable: &str) -> Option<&PendingChange> {
        self.changes.iter().find(|c| c.variable() == variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Build the batch body for `network`.
    pub fn to_wire(&self, network: &str) -> CpdResult<Vec<CpdChange>> {
        self.changes.iter().map(|c| c.to_wire(network)).collect()
    }
}

/// Loaded tables and staged changes for one network.
#[derive(Debug, Clone)]
pub struct CpdEditor {
    network: String,
    tables: BTreeMap<String, Cpd>,
    queue: ChangeQueue,
}

impl CpdEditor {
    /// Create an editor over already loaded tables.
    pub fn new(network: impl Into<String>, tables: impl IntoIterator<Item = Cpd>) -> Self {
        Self {
            network: network.into(),
            tables: tables
                .into_iter()
                .map(|cpd| (cpd.variable.clone(), cpd))
                .collect(),
            queue: ChangeQueue::new(),
        }
    }

    /// Fetch every table of `network` from the backend.
    ///
    /// Tables are shape-checked on the way in. A malformed table fails the
    /// whole load.
    pub async fn load<B: InferenceBackend + ?Sized>(
        backend: &B,
        network: impl Into<String>,
    ) -> AppResult<Self> {
        let network = network.into();
        let records = backend.fetch_cpds(&network).await?;

        let mut tables = Vec::with_capacity(records.len());
        for (variable, record) in records {
            tables.push(Cpd::from_backend(variable, record.evidence, &record.values)?);
        }

        debug!(network = %network, tables = tables.len(), "CPD editor loaded");
        Ok(Self::new(network, tables))
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Current table for `variable`, including unsubmitted edits
    pub fn table(&self, variable: &str) -> Option<&Cpd> {
        self.tables.get(variable)
    }

    /// Variable names, sorted
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Cpd> {
        self.tables.values()
    }

    /// Staged changes
    pub fn pending(&self) -> &ChangeQueue {
        &self.queue
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Set one cell, rebalance its row and stage the table.
    ///
    /// The table is left untouched when the edit or the resulting table is
    /// rejected. Returns the rebalanced row.
    pub fn edit(
        &mut self,
        variable: &str,
        row: usize,
        index: usize,
        value: f64,
    ) -> CpdResult<Vec<f64>> {
        let mut updated = self.lookup(variable)?.clone();
        let balanced = updated.set_value(row, index, value)?.to_vec();
        updated.validate_distribution()?;

        debug!(
            network = %self.network,
            variable = %variable,
            row,
            index,
            value,
            "CPD cell edited"
        );
        self.commit(updated);
        Ok(balanced)
    }

    /// Stage a whole replacement table.
    pub fn stage_update(&mut self, cpd: Cpd) -> CpdResult<()> {
        cpd.validate_distribution()?;
        self.commit(cpd);
        Ok(())
    }

    /// Stage deletion of `variable` and drop its table.
    pub fn stage_delete(&mut self, variable: &str) -> CpdResult<()> {
        let cpd = self
            .tables
            .remove(variable)
            .ok_or_else(|| CpdError::UnknownVariable {
                variable: variable.to_string(),
            })?;

        self.queue.stage(PendingChange::Delete {
            variable: cpd.variable,
            evidence: cpd.evidence,
        });
        Ok(())
    }

    /// Drop all staged changes. Returns how many were dropped.
    ///
    /// Local tables keep their edited values; reload to get the backend state.
    pub fn discard(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Send the staged changes as one batch.
    ///
    /// Returns the number of changes applied. An empty queue never contacts
    /// the backend. On failure the queue is left as it was so the caller can
    /// retry.
    pub async fn submit<B: InferenceBackend + ?Sized>(&mut self, backend: &B) -> AppResult<usize> {
        if self.queue.is_empty() {
            debug!(network = %self.network, "No staged CPD changes to submit");
            return Ok(0);
        }

        for change in self.queue.iter() {
            if let PendingChange::Update(cpd) = change {
                cpd.validate_distribution()?;
            }
        }
        let batch = self.queue.to_wire(&self.network)?;

        match backend.apply_changes(&batch).await {
            Ok(()) => {
                let applied = batch.len();
                self.queue.clear();
                info!(network = %self.network, applied, "CPD batch submitted");
                Ok(applied)
            }
            Err(e) => {
                warn!(
                    network = %self.network,
                    error = %e,
                    pending = self.queue.len(),
                    "CPD batch rejected, keeping staged changes"
                );
                Err(e.into())
            }
        }
    }

    fn lookup(&self, variable: &str) -> CpdResult<&Cpd> {
        self.tables
            .get(variable)
            .ok_or_else(|| CpdError::UnknownVariable {
                variable: variable.to_string(),
            })
    }

    fn commit(&mut self, cpd: Cpd) {
        self.queue.stage(PendingChange::Update(cpd.clone()));
        self.tables.insert(cpd.variable.clone(), cpd);
    }
}
