//! CLI command tests against a mocked backend and an in-memory store.

mod common;

use std::sync::Arc;

use common::{estimation_cpds, estimation_structure, failing_response, MockBackend};
use tutor_bayes::cli::{execute_command, Commands};
use tutor_bayes::error::BackendError;
use tutor_bayes::inference::ChangeType;
use tutor_bayes::storage::{ProgressKey, ProgressStore, SqliteProgressStore};

async fn run(backend: MockBackend, command: Commands) -> (tutor_bayes::cli::CliResult, Arc<SqliteProgressStore>) {
    let store = Arc::new(SqliteProgressStore::new_in_memory().await.unwrap());
    let result = execute_command(command, Arc::new(backend), store.clone()).await;
    (result, store)
}

#[tokio::test]
async fn test_cpds_renders_labelled_rows() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_cpds()
        .returning(|_| Ok(estimation_cpds()));

    let (result, _) = run(
        backend,
        Commands::Cpds {
            network: "estimate.bif".to_string(),
            variable: Some("Multiply_Two_Numbers".to_string()),
        },
    )
    .await;

    assert_eq!(result.exit_code, 0);
    assert!(result.message.starts_with("Multiply_Two_Numbers | Estimation\n"));
    assert!(result.message.contains("Estimation=0"));
    assert!(result.message.contains("0.80 0.20"));
    assert!(result.message.contains("0.30 0.70"));
    assert!(!result.message.contains("Quotient_Using_Multiples"));
}

#[tokio::test]
async fn test_cpds_unknown_variable_reports_absence() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_cpds()
        .returning(|_| Ok(estimation_cpds()));

    let (result, _) = run(
        backend,
        Commands::Cpds {
            network: "estimate.bif".to_string(),
            variable: Some("Geometry".to_string()),
        },
    )
    .await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.message, "No CPD for 'Geometry' in estimate.bif");
}

#[tokio::test]
async fn test_edit_submits_balanced_row() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_cpds()
        .returning(|_| Ok(estimation_cpds()));
    backend
        .expect_apply_changes()
        .withf(|changes| {
            changes.len() == 1
                && changes[0].change_type == ChangeType::Update
                && changes[0].variable == "Estimation"
        })
        .times(1)
        .returning(|_| Ok(()));

    let (result, _) = run(
        backend,
        Commands::Edit {
            network: "estimate.bif".to_string(),
            variable: "Estimation".to_string(),
            row: 0,
            index: 0,
            value: 0.65,
        },
    )
    .await;

    assert_eq!(result.exit_code, 0, "{}", result.message);
    assert!(result.message.starts_with("Submitted 1 change(s) to estimate.bif"));
    assert!(result.message.contains("0.65 0.35"));
}

#[tokio::test]
async fn test_edit_backend_failure_exits_nonzero() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_cpds()
        .returning(|_| Ok(estimation_cpds()));
    backend.expect_apply_changes().returning(|_| {
        Err(BackendError::Api {
            status: 500,
            message: "reload failed".to_string(),
        })
    });

    let (result, _) = run(
        backend,
        Commands::Edit {
            network: "estimate.bif".to_string(),
            variable: "Estimation".to_string(),
            row: 0,
            index: 0,
            value: 0.65,
        },
    )
    .await;

    assert_eq!(result.exit_code, 1);
    assert!(result.message.starts_with("Error: "));
    assert!(result.message.contains("reload failed"));
}

#[tokio::test]
async fn test_tree_indents_children() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_structure()
        .returning(|_| Ok(estimation_structure()));

    let (result, _) = run(
        backend,
        Commands::Tree {
            network: "estimate.bif".to_string(),
        },
    )
    .await;

    assert_eq!(
        result.message,
        "Estimation\n  Multiply_Two_Numbers\n  Quotient_Using_Multiples\n"
    );
}

#[tokio::test]
async fn test_assess_persists_and_reports_focus() {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_structure()
        .returning(|_| Ok(estimation_structure()));
    backend.expect_query().times(1).returning(|_| {
        Ok(failing_response(
            "Multiply_Two_Numbers",
            &[("Estimation", 0.41), ("Multiply_Two_Numbers", 0.22)],
        ))
    });

    let (result, store) = run(
        backend,
        Commands::Assess {
            network: "estimate.bif".to_string(),
            competency: "Multiply_Two_Numbers".to_string(),
            score: 3.0,
            total: 10.0,
            student: "student-1".to_string(),
            domain: 7,
        },
    )
    .await;

    assert_eq!(result.exit_code, 0, "{}", result.message);
    assert!(result.message.starts_with("Multiply_Two_Numbers: 3/10 (30.00%)"));
    assert!(result.message.contains("Recommended focus: Estimation"));
    assert!(result.message.contains("Progress for student-1/7"));
    assert!(result.message.contains("41.00%"));

    let snapshot = store
        .get_snapshot(&ProgressKey::new("student-1", 7))
        .await
        .unwrap();
    assert!(snapshot["Multiply_Two_Numbers"].is_locked);
}

#[tokio::test]
async fn test_assess_rejects_invalid_score_before_querying() {
    let mut backend = MockBackend::new();
    backend.expect_query().never();
    backend.expect_fetch_structure().never();

    let (result, _) = run(
        backend,
        Commands::Assess {
            network: "estimate.bif".to_string(),
            competency: "Estimation".to_string(),
            score: 12.0,
            total: 10.0,
            student: "student-1".to_string(),
            domain: 7,
        },
    )
    .await;

    assert_eq!(result.exit_code, 1);
    assert!(result.message.contains("cannot exceed total"));
}

#[tokio::test]
async fn test_unlock_without_snapshot_reports_nothing_locked() {
    let (result, _) = run(
        MockBackend::new(),
        Commands::Unlock {
            student: "student-1".to_string(),
            domain: 7,
            node: "Estimation".to_string(),
        },
    )
    .await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.message, "Estimation has no locked estimate for student-1/7");
}
