//! # Tutor Bayes
//!
//! Client-side core of a Bayesian-network math tutoring platform: editing
//! conditional probability tables and reconciling a student's estimated and
//! actual mastery across a competency dependency tree.
//!
//! ## Features
//!
//! - **CPD editing**: flat row model, parent combination enumeration,
//!   single-cell auto-balancing and a batch change queue
//! - **Shape conversion**: flat rows to and from the nested arrays the
//!   inference backend stores
//! - **Dependency tree**: depth-first flattening of the network structure
//! - **Mastery reconciliation**: locked estimates, scores and pass/fail
//!   roll-up merged into one progress table
//!
//! ## Architecture
//!
//! ```text
//! CLI → CpdEditor / MasteryWorkflow → Inference backend (HTTP)
//!                    ↓
//!         ProgressStore (SQLite or HTTP)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tutor_bayes::config::Config;
//! use tutor_bayes::inference::{InferenceClient, QueryRequest};
//! use tutor_bayes::progress::ProgressTracker;
//! use tutor_bayes::storage::SqliteProgressStore;
//! use tutor_bayes::workflow::MasteryWorkflow;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let backend = InferenceClient::new(&config.inference, config.request.clone())?;
//!     let store = SqliteProgressStore::new(&config.database).await?;
//!     let workflow = MasteryWorkflow::new(
//!         Arc::new(backend),
//!         ProgressTracker::new(Arc::new(store)),
//!     );
//!     let request = QueryRequest::new("estimate.bif", "Estimation", 4.0, 10.0, "s1", 1)?;
//!     workflow.assess(&request).await?;
//!     Ok(())
//! }
//! ```

/// Command-line subcommands and rendering.
pub mod cli;
/// Configuration management.
pub mod config;
/// Conditional probability tables and the CPD editor.
pub mod cpd;
/// Error types and result aliases for the application.
pub mod error;
/// Inference backend trait, HTTP client and wire types.
pub mod inference;
/// Competency dependency tree.
pub mod network;
/// Progress rows, reconciliation and locking.
pub mod progress;
/// Progress snapshot persistence.
pub mod storage;
/// Assessment workflow with supersession of stale results.
pub mod workflow;

pub use config::Config;
pub use cpd::{Cpd, CpdEditor};
pub use error::{AppError, AppResult};
pub use network::DependencyTree;
pub use progress::ProgressTracker;
pub use workflow::MasteryWorkflow;
