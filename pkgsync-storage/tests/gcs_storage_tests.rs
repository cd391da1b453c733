use pkgsync_storage::{GcsConfig, GcsStorage, RetryPolicy, StorageClient, StorageError};
use pkgsync_types::ArtifactKey;
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn key(s: &str) -> ArtifactKey {
    ArtifactKey::parse(s).unwrap()
}

fn mock_config(server: &MockServer) -> GcsConfig {
    GcsConfig {
        bucket: "test-bucket".to_string(),
        root: "packages".to_string(),
        api_base_url: server.uri(),
        access_token: Some("token-123".to_string()),
        timeout_secs: 5,
        retry: RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
    }
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn gcs_config_default() {
    let cfg = GcsConfig::default();
    assert_eq!(cfg.root, "packages");
    assert_eq!(cfg.api_base_url, "https://storage.googleapis.com");
    assert!(cfg.access_token.is_none());
    assert_eq!(cfg.timeout_secs, 60);
    assert_eq!(cfg.retry, RetryPolicy::default());
}

#[test]
fn gcs_config_never_serializes_token() {
    let cfg = GcsConfig {
        bucket: "b".to_string(),
        access_token: Some("secret".to_string()),
        ..Default::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(!json.contains("secret"));
}

#[test]
fn empty_bucket_is_config_error() {
    let result = GcsStorage::new(GcsConfig::default());
    assert!(matches!(result, Err(StorageError::Config(_))));
}

#[test]
fn location_and_tier_name() {
    let storage = GcsStorage::new(GcsConfig {
        bucket: "my-bucket".to_string(),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(storage.tier_name(), "gcs");
    assert_eq!(storage.location(), "gs://my-bucket/packages");
}

// ── list ────────────────────────────────────────────────────────

#[tokio::test]
async fn list_follows_pages_and_strips_root() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o"))
        .and(query_param("prefix", "packages/"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "name": "packages/b-2.0.tar.gz", "size": "20", "updated": "2024-05-01T10:00:00Z" }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o"))
        .and(query_param("prefix", "packages/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "name": "packages/", "size": "0" },
                { "name": "packages/a-1.0.whl", "size": "10", "updated": "2024-05-01T09:00:00Z" }
            ],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let records = storage.list(None).await.unwrap();

    let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["a-1.0.whl", "b-2.0.tar.gz"]);
    assert_eq!(records[0].size, Some(10));
    assert_eq!(records[1].size, Some(20));
    assert!(records[0].modified.is_some());
}

#[tokio::test]
async fn list_empty_bucket() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    assert!(storage.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_skips_hidden_objects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "name": "packages/team/.demo-1.0.tar.gz", "size": "12" },
                { "name": "packages/team/demo-1.0.tar.gz", "size": "12" }
            ]
        })))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let records = storage.list(None).await.unwrap();
    let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["team/demo-1.0.tar.gz"]);
}

#[tokio::test]
async fn list_with_prefix_extends_root() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o"))
        .and(query_param("prefix", "packages/demo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "name": "packages/demo-1.0.whl", "size": "1" }]
        })))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let records = storage.list(Some("demo")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key.as_str(), "demo-1.0.whl");
}

#[tokio::test]
async fn list_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o"))
        .and(header("authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    storage.list(None).await.unwrap();
}

// ── stat ────────────────────────────────────────────────────────

#[tokio::test]
async fn stat_existing_object() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo-1.0.whl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "packages/demo-1.0.whl",
            "size": "1234",
            "updated": "2024-05-01T09:00:00.123Z"
        })))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let record = storage.stat(&key("demo-1.0.whl")).await.unwrap().unwrap();
    assert!(record.exists);
    assert_eq!(record.size, Some(1234));
    assert_eq!(record.key.as_str(), "demo-1.0.whl");
}

#[tokio::test]
async fn stat_missing_object_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fmissing.whl"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    assert!(storage.stat(&key("missing.whl")).await.unwrap().is_none());
}

#[tokio::test]
async fn stat_retries_server_errors_then_fails_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo.whl"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let err = storage.stat(&key("demo.whl")).await.unwrap_err();
    assert!(matches!(err, StorageError::Transient(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn forbidden_is_permission_error_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo.whl"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .expect(1)
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let err = storage.stat(&key("demo.whl")).await.unwrap_err();
    assert!(matches!(err, StorageError::PermissionDenied(_)));
}

#[tokio::test]
async fn bad_request_is_remote_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo.whl"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
        .expect(1)
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let err = storage.stat(&key("demo.whl")).await.unwrap_err();
    assert!(matches!(err, StorageError::Remote { status: 400, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn malformed_metadata_is_remote_error_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo.whl"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let err = storage.stat(&key("demo.whl")).await.unwrap_err();
    assert!(matches!(err, StorageError::Remote { status: 200, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn malformed_listing_is_remote_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"items\": 7}"))
        .expect(1)
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let err = storage.list(None).await.unwrap_err();
    assert!(matches!(err, StorageError::Remote { .. }));
}

// ── read ────────────────────────────────────────────────────────

#[tokio::test]
async fn read_downloads_media() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo.whl"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 255]))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let bytes = storage.read(&key("demo.whl")).await.unwrap();
    assert_eq!(bytes, vec![0u8, 1, 2, 255]);
}

#[tokio::test]
async fn read_missing_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fgone.whl"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let err = storage.read(&key("gone.whl")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn read_recovers_after_one_transient_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo.whl"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo.whl"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    assert_eq!(storage.read(&key("demo.whl")).await.unwrap(), b"payload");
}

// ── write ───────────────────────────────────────────────────────

#[tokio::test]
async fn write_uses_media_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/test-bucket/o"))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "packages/sub/demo.whl"))
        .and(body_bytes(b"wheel-bytes".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "packages/sub/demo.whl",
            "size": "11"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    storage.write(&key("sub/demo.whl"), b"wheel-bytes").await.unwrap();
}

#[tokio::test]
async fn write_failure_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/test-bucket/o"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    let err = storage.write(&key("demo.whl"), b"x").await.unwrap_err();
    assert!(err.is_retryable());
}

// ── delete ──────────────────────────────────────────────────────

#[tokio::test]
async fn delete_existing_object() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo.whl"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    storage.delete(&key("demo.whl")).await.unwrap();
}

#[tokio::test]
async fn delete_missing_object_is_ok() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/test-bucket/o/packages%2Fdemo.whl"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = GcsStorage::new(mock_config(&server)).unwrap();
    storage.delete(&key("demo.whl")).await.unwrap();
}
