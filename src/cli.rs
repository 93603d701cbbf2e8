//! Command-line front end.
//!
//! Each subcommand maps onto one editor or workflow operation and renders
//! its result as plain text.

use clap::Subcommand;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::cpd::{balance_row, describe_combination, Cpd, CpdEditor};
use crate::error::AppResult;
use crate::inference::{InferenceBackend, QueryRequest};
use crate::network::DependencyTree;
use crate::progress::{format_percent, ProgressRow, ProgressTracker, Reconciliation};
use crate::storage::{ProgressKey, ProgressStore};
use crate::workflow::{AssessOutcome, MasteryWorkflow};

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Show the CPDs of a network
    Cpds {
        /// Network (BIF file) name
        #[arg(long)]
        network: String,

        /// Only show this variable
        #[arg(long)]
        variable: Option<String>,
    },

    /// Balance a probability row locally, without contacting any backend
    Balance {
        /// Row values, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        row: Vec<f64>,

        /// Index of the value to change
        #[arg(long)]
        index: usize,

        /// New value for that index
        #[arg(long)]
        value: f64,
    },

    /// Set one CPD cell, rebalance its row and submit the table
    Edit {
        #[arg(long)]
        network: String,

        #[arg(long)]
        variable: String,

        /// Parent combination (row) index
        #[arg(long)]
        row: usize,

        /// State (column) index
        #[arg(long)]
        index: usize,

        #[arg(long)]
        value: f64,
    },

    /// Delete a variable's CPD from the network
    Delete {
        #[arg(long)]
        network: String,

        #[arg(long)]
        variable: String,
    },

    /// Show the competency dependency tree
    Tree {
        #[arg(long)]
        network: String,
    },

    /// Record an assessment result and update estimated mastery
    Assess {
        #[arg(long)]
        network: String,

        /// Competency node the assessment covers
        #[arg(long)]
        competency: String,

        #[arg(long)]
        score: f64,

        #[arg(long)]
        total: f64,

        #[arg(long)]
        student: String,

        #[arg(long)]
        domain: i64,
    },

    /// Show a student's progress table
    Progress {
        #[arg(long)]
        network: String,

        #[arg(long)]
        student: String,

        #[arg(long)]
        domain: i64,
    },

    /// Delete a student's progress snapshot
    Reset {
        #[arg(long)]
        network: String,

        #[arg(long)]
        student: String,

        #[arg(long)]
        domain: i64,
    },

    /// Allow the next assessment to overwrite one locked estimate
    Unlock {
        #[arg(long)]
        student: String,

        #[arg(long)]
        domain: i64,

        #[arg(long)]
        node: String,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

impl From<AppResult<String>> for CliResult {
    fn from(result: AppResult<String>) -> Self {
        match result {
            Ok(message) => CliResult::success(message),
            Err(e) => CliResult::error(format!("Error: {}", e)),
        }
    }
}

/// Execute a CLI command.
pub async fn execute_command(
    command: Commands,
    backend: Arc<dyn InferenceBackend>,
    store: Arc<dyn ProgressStore>,
) -> CliResult {
    let workflow = MasteryWorkflow::new(backend.clone(), ProgressTracker::new(store));

    let result = match command {
        Commands::Cpds { network, variable } => {
            execute_cpds(backend.as_ref(), &network, variable.as_deref()).await
        }
        Commands::Balance { row, index, value } => execute_balance(&row, index, value),
        Commands::Edit {
            network,
            variable,
            row,
            index,
            value,
        } => execute_edit(backend.as_ref(), &network, &variable, row, index, value).await,
        Commands::Delete { network, variable } => {
            execute_delete(backend.as_ref(), &network, &variable).await
        }
        Commands::Tree { network } => workflow
            .dependency_tree(&network)
            .await
            .map(|tree| render_tree(&tree)),
        Commands::Assess {
            network,
            competency,
            score,
            total,
            student,
            domain,
        } => execute_assess(&workflow, network, competency, score, total, student, domain).await,
        Commands::Progress {
            network,
            student,
            domain,
        } => {
            let key = ProgressKey::new(student, domain);
            workflow
                .progress(&network, &key)
                .await
                .map(|r| render_progress(&key, &r))
        }
        Commands::Reset {
            network,
            student,
            domain,
        } => {
            let key = ProgressKey::new(student, domain);
            workflow
                .reset(&network, &key)
                .await
                .map(|r| format!("Progress reset for {}\n{}", key, render_progress(&key, &r)))
        }
        Commands::Unlock {
            student,
            domain,
            node,
        } => {
            let key = ProgressKey::new(student, domain);
            workflow.unlock(&key, &node).await.map(|unlocked| {
                if unlocked {
                    format!("Unlocked {} for {}", node, key)
                } else {
                    format!("{} has no locked estimate for {}", node, key)
                }
            })
        }
    };

    result.into()
}

async fn execute_cpds(
    backend: &dyn InferenceBackend,
    network: &str,
    variable: Option<&str>,
) -> AppResult<String> {
    let editor = CpdEditor::load(backend, network).await?;
    let mut output = String::new();

    for cpd in editor.tables() {
        if variable.is_some_and(|v| v != cpd.variable) {
            continue;
        }
        output.push_str(&render_cpd(cpd));
    }

    if output.is_empty() {
        output = match variable {
            Some(v) => format!("No CPD for '{}' in {}", v, network),
            None => format!("No CPDs in {}", network),
        };
    }
    Ok(output)
}

fn execute_balance(row: &[f64], index: usize, value: f64) -> AppResult<String> {
    let balanced = balance_row(row, index, value)?;
    Ok(format_row(&balanced))
}

async fn execute_edit(
    backend: &dyn InferenceBackend,
    network: &str,
    variable: &str,
    row: usize,
    index: usize,
    value: f64,
) -> AppResult<String> {
    let mut editor = CpdEditor::load(backend, network).await?;
    editor.edit(variable, row, index, value)?;
    let applied = editor.submit(backend).await?;

    let mut output = format!("Submitted {} change(s) to {}\n", applied, network);
    if let Some(cpd) = editor.table(variable) {
        output.push_str(&render_cpd(cpd));
    }
    Ok(output)
}

async fn execute_delete(
    backend: &dyn InferenceBackend,
    network: &str,
    variable: &str,
) -> AppResult<String> {
    let mut editor = CpdEditor::load(backend, network).await?;
    editor.stage_delete(variable)?;
    editor.submit(backend).await?;
    Ok(format!("Deleted CPD for {} from {}", variable, network))
}

async fn execute_assess(
    workflow: &MasteryWorkflow,
    network: String,
    competency: String,
    score: f64,
    total: f64,
    student: String,
    domain: i64,
) -> AppResult<String> {
    let request = QueryRequest::new(network, competency, score, total, student, domain)?;
    let key = ProgressKey::new(request.student_id.clone(), request.domain_id);

    match workflow.assess(&request).await? {
        AssessOutcome::Completed(assessment) => {
            let mut output = format!(
                "{}: {}/{} ({})\n",
                assessment.response.competency,
                request.score,
                request.total,
                format_percent(request.ratio())
            );
            if let Some(message) = &assessment.response.next_focus {
                let _ = writeln!(output, "Backend focus: {}", message);
            }
            if let Some(focus) = &assessment.recommended_focus {
                let _ = writeln!(output, "Recommended focus: {}", focus);
            }
            output.push_str(&render_progress(&key, &assessment.reconciliation));
            Ok(output)
        }
        AssessOutcome::Superseded => Ok("Assessment superseded by a newer selection".to_string()),
    }
}

/// Render one CPD with a labelled line per parent combination.
pub fn render_cpd(cpd: &Cpd) -> String {
    let mut output = cpd.variable.clone();
    if !cpd.evidence.is_empty() {
        let _ = write!(output, " | {}", cpd.evidence.join(", "));
    }
    output.push('\n');

    for (combo, row) in cpd.combinations().iter().zip(cpd.rows()) {
        let _ = writeln!(
            output,
            "  {:<30} {}",
            describe_combination(&cpd.evidence, combo),
            format_row(row)
        );
    }
    output
}

/// Render the tree as an indented list.
pub fn render_tree(tree: &DependencyTree) -> String {
    let mut output = String::new();
    for entry in tree.entries() {
        let _ = writeln!(output, "{}{}", "  ".repeat(entry.indent), entry.node);
    }
    output
}

/// Render reconciled rows as a table.
pub fn render_progress(key: &ProgressKey, result: &Reconciliation) -> String {
    let mut output = format!("Progress for {}\n", key);
    let _ = writeln!(
        output,
        "{:<40} {:>10} {:>10} {:>10} {:>8}",
        "Competency", "Estimate", "Score", "Percent", "Actual"
    );
    for row in &result.rows {
        output.push_str(&render_progress_row(row));
    }
    output
}

fn render_progress_row(row: &ProgressRow) -> String {
    let name = format!(
        "{}{}{}",
        "  ".repeat(row.indent),
        row.node,
        if row.is_locked { " *" } else { "" }
    );
    let estimate = row
        .estimated_mastery
        .map(format_percent)
        .unwrap_or_else(|| "-".to_string());
    let score = row
        .raw_score
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let percent = row
        .percentage
        .map(|p| format!("{:.2}%", p))
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{:<40} {:>10} {:>10} {:>10} {:>8}\n",
        name, estimate, score, percent, row.actual_mastery
    )
}

fn format_row(row: &[f64]) -> String {
    row.iter()
        .map(|v| format!("{:.2}", v))
        .collect::<Vec<_>>()
        .join(" ")
}
