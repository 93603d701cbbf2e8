//! Inference backend access.
//!
//! The backend owns the Bayesian networks and runs inference. This crate only
//! reads tables and structure from it, submits CPD batches and asks for
//! mastery probabilities.

mod client;
mod types;

pub use client::*;
pub use types::*;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::BackendResult;
use crate::network::NetworkNode;

/// Operations the inference backend exposes.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Fetch every CPD of a network, keyed by variable.
    async fn fetch_cpds(&self, network: &str) -> BackendResult<BTreeMap<String, CpdRecord>>;

    /// Apply a batch of CPD changes atomically.
    async fn apply_changes(&self, changes: &[CpdChange]) -> BackendResult<()>;

    /// Fetch the `{node, parents}` structure of a network.
    async fn fetch_structure(&self, network: &str) -> BackendResult<Vec<NetworkNode>>;

    /// Run a mastery query for one tested competency.
    async fn query(&self, request: &QueryRequest) -> BackendResult<QueryResponse>;
}
