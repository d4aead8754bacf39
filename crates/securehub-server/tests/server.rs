use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use clap::Parser;
use serde_json::Value;
use tower::ServiceExt;

use securehub_core::attachment::{AttachmentParent, AttachmentState};
use securehub_db::{Database, SqliteDatabase};
use securehub_server::config::ServerConfig;
use securehub_server::{build_router, build_service, InnerAppState};
use securehub_service::{AttachmentConfig, AttachmentService, UploadRequest};
use securehub_store::MockGateway;

fn mock_service() -> Arc<AttachmentService> {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    Arc::new(AttachmentService::new(
        db,
        Arc::new(MockGateway::new()),
        Arc::new(AttachmentConfig::default()),
    ))
}

#[tokio::test]
async fn health_ok() {
    let app = build_router(Arc::new(InnerAppState {
        service: mock_service(),
    }));
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["status"], "ok");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_router(Arc::new(InnerAppState {
        service: mock_service(),
    }));
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/attachments")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

/// The local stack end to end: SQLite file, filesystem objects, confirm and reap.
#[tokio::test]
async fn build_service_with_local_backends() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("securehub.db");
    let objects = tmp.path().join("objects");
    let config = ServerConfig::parse_from([
        "securehub-server",
        "--sqlite-path",
        db_path.to_str().unwrap(),
        "--object-dir",
        objects.to_str().unwrap(),
        "--max-pending-age",
        "0",
        "reap",
    ]);
    if config.store_config().is_s3() {
        // S3 credentials in the environment would route around the local store.
        return;
    }
    let service = build_service(&config).await.unwrap();
    let parent = AttachmentParent::request("req-1");

    let slot = service
        .request_upload_url(
            &parent,
            &UploadRequest {
                file_name: "notes.txt".into(),
                content_type: "text/plain".into(),
                file_size: 5,
            },
            "alice",
        )
        .await
        .unwrap();
    assert!(slot.upload_url.starts_with("file://"));

    let listed = service.list_attachments(&parent).await.unwrap();
    assert_eq!(listed.len(), 1);
    let object_path = objects.join(&listed[0].object_key);
    std::fs::create_dir_all(object_path.parent().unwrap()).unwrap();
    std::fs::write(&object_path, b"hello").unwrap();

    let confirmed = service
        .confirm_upload(&parent, &slot.attachment_id)
        .await
        .unwrap();
    assert_eq!(confirmed.state, AttachmentState::Active);

    // Active records are never reaped, even with a zero pending age.
    let report = service.reaper().sweep(chrono::Utc::now()).await.unwrap();
    assert_eq!(report.examined, 0);
    assert!(object_path.exists());

    service.delete_attachment(&parent, &slot.attachment_id).await.unwrap();
    assert!(!object_path.exists());
    assert!(db_path.exists());
}
