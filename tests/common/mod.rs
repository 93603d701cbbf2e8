//! Shared test doubles for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use serde_json::json;
use std::collections::BTreeMap;

use tutor_bayes::error::BackendResult;
use tutor_bayes::inference::{CpdChange, CpdRecord, InferenceBackend, QueryRequest, QueryResponse};
use tutor_bayes::network::NetworkNode;

mock! {
    pub Backend {}

    #[async_trait]
    impl InferenceBackend for Backend {
        async fn fetch_cpds(&self, network: &str) -> BackendResult<BTreeMap<String, CpdRecord>>;
        async fn apply_changes(&self, changes: &[CpdChange]) -> BackendResult<()>;
        async fn fetch_structure(&self, network: &str) -> BackendResult<Vec<NetworkNode>>;
        async fn query(&self, request: &QueryRequest) -> BackendResult<QueryResponse>;
    }
}

/// CPDs of the estimation network as the backend serves them.
pub fn estimation_cpds() -> BTreeMap<String, CpdRecord> {
    serde_json::from_value(json!({
        "Estimation": {"evidence": [], "values": [[0.5], [0.5]]},
        "Multiply_Two_Numbers": {
            "evidence": ["Estimation"],
            "values": [[0.8, 0.2], [0.3, 0.7]]
        },
        "Quotient_Using_Multiples": {
            "evidence": ["Estimation"],
            "values": [[0.9, 0.1], [0.4, 0.6]]
        }
    }))
    .expect("valid CPD fixture")
}

/// Structure of the estimation network.
pub fn estimation_structure() -> Vec<NetworkNode> {
    vec![
        NetworkNode::new("Estimation", &[]),
        NetworkNode::new("Multiply_Two_Numbers", &["Estimation"]),
        NetworkNode::new("Quotient_Using_Multiples", &["Estimation"]),
    ]
}

/// Query response carrying mastery probabilities.
pub fn failing_response(competency: &str, probabilities: &[(&str, f64)]) -> QueryResponse {
    QueryResponse {
        competency: competency.to_string(),
        score: 3.0,
        total: 10.0,
        mastery_probabilities: Some(
            probabilities
                .iter()
                .map(|(node, p)| (node.to_string(), *p))
                .collect(),
        ),
        next_focus: None,
    }
}
