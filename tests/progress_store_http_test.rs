//! Remote progress store tests using wiremock.

use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use tutor_bayes::config::RequestConfig;
use tutor_bayes::error::StorageError;
use tutor_bayes::progress::ActualMastery;
use tutor_bayes::storage::{
    HttpProgressStore, ProgressKey, ProgressSnapshot, ProgressStore, StoredProgress,
};

fn create_test_store(base_url: &str) -> HttpProgressStore {
    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries: 0,
        retry_delay_ms: 100,
    };
    HttpProgressStore::new(base_url, Some("test-token".to_string()), &request_config)
        .expect("Failed to create store")
}

#[tokio::test]
async fn test_get_snapshot() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/progress/student-1/3"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Estimation": {
                "estimated_mastery": 0.41,
                "raw_score": "3/10",
                "percentage": 30.0,
                "actual_mastery": "Fail",
                "is_locked": true
            },
            "Multiply_Two_Numbers": {
                "estimated_mastery": null,
                "raw_score": null,
                "percentage": null,
                "actual_mastery": "Unknown",
                "is_locked": false
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server.uri());
    let snapshot = store
        .get_snapshot(&ProgressKey::new("student-1", 3))
        .await
        .unwrap();

    assert_eq!(snapshot.len(), 2);
    let estimation = &snapshot["Estimation"];
    assert_eq!(estimation.estimated_mastery, Some(0.41));
    assert_eq!(estimation.actual_mastery, ActualMastery::Fail);
    assert!(estimation.is_locked);
    assert_eq!(snapshot["Multiply_Two_Numbers"].estimated_mastery, None);
}

#[tokio::test]
async fn test_missing_snapshot_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/progress/student-1/3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server.uri());
    let snapshot = store
        .get_snapshot(&ProgressKey::new("student-1", 3))
        .await
        .unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn test_save_posts_full_snapshot() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/progress/student-1/3"))
        .and(body_json(json!({
            "Estimation": {
                "estimated_mastery": 0.41,
                "raw_score": "3/10",
                "percentage": 30.0,
                "actual_mastery": "Fail",
                "is_locked": true
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "saved"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut snapshot = ProgressSnapshot::new();
    snapshot.insert(
        "Estimation".to_string(),
        StoredProgress {
            estimated_mastery: Some(0.41),
            raw_score: Some("3/10".to_string()),
            percentage: Some(30.0),
            actual_mastery: ActualMastery::Fail,
            is_locked: true,
            updated_at: None,
        },
    );

    let store = create_test_store(&mock_server.uri());
    store
        .save_snapshot(&ProgressKey::new("student-1", 3), &snapshot)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_save_failure_is_remote_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/progress/student-1/3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database locked"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server.uri());
    let result = store
        .save_snapshot(&ProgressKey::new("student-1", 3), &ProgressSnapshot::new())
        .await;

    match result {
        Err(StorageError::Remote { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "database locked");
        }
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_snapshot() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/progress/student-1/3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server.uri());
    store
        .delete_snapshot(&ProgressKey::new("student-1", 3))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unparseable_snapshot_is_invalid_data() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/progress/student-1/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["not", "a", "map"])))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server.uri());
    let result = store.get_snapshot(&ProgressKey::new("student-1", 3)).await;
    assert!(matches!(result, Err(StorageError::InvalidData { .. })));
}
