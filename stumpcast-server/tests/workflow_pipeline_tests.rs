//! End-to-end workflow pipeline over the HTTP surface:
//! create → script → audio → finalize, plus the boundary behaviors.

mod helpers;

use axum::http::StatusCode;
use helpers::{body_json, get, post_json, seed_catalog, test_app};
use std::sync::atomic::Ordering;
use tower::ServiceExt;

async fn create_workflow(app: &helpers::TestApp) -> String {
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/workflow",
            serde_json::json!({"name": "W1", "speechIds": ["archive_a"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "draft");
    json["workflowId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn empty_speech_ids_is_rejected() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/workflow",
            serde_json::json!({"name": "W1", "speechIds": []}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "INVALID_INPUT");
}

#[tokio::test]
async fn unknown_workflow_and_bad_ids_are_distinct() {
    let app = test_app("SCRIPT").await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/workflow/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/workflow/00000000-0000-4000-8000-000000000000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generate_script_issues_one_call_and_advances() {
    let app = test_app("GENERATED SCRIPT").await;
    seed_catalog(&app).await;
    let workflow_id = create_workflow(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/generate-script",
            serde_json::json!({
                "workflowId": workflow_id,
                "model": "x/y",
                "style": "professional",
                "duration": 5
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["script"], "GENERATED SCRIPT");
    assert_eq!(json["strategy"], "single");
    assert_eq!(json["batchProcessed"], false);
    assert_eq!(json["status"], "script_generated");
    // One speech, no swarm: exactly one provider call.
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 1);

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/api/workflow/{}", workflow_id)))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["status"], "script_generated");
    assert_eq!(json["speeches"][0]["id"], "archive_a");
}

#[tokio::test]
async fn upload_script_enforces_the_50k_boundary() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;
    let workflow_id = create_workflow(&app).await;

    let exactly = "a".repeat(50_000);
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/upload-script",
            serde_json::json!({"workflowId": workflow_id, "script": exactly}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "script_uploaded");

    let over = "a".repeat(50_001);
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/upload-script",
            serde_json::json!({"workflowId": workflow_id, "script": over}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/upload-script",
            serde_json::json!({"workflowId": workflow_id, "script": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn audio_requires_script_first() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;
    let workflow_id = create_workflow(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/generate-audio",
            serde_json::json!({"workflowId": workflow_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_pipeline_finalizes_into_a_bundle() {
    let app = test_app("GENERATED SCRIPT").await;
    seed_catalog(&app).await;
    let workflow_id = create_workflow(&app).await;

    // Script stage
    app.router
        .clone()
        .oneshot(post_json(
            "/api/generate-script",
            serde_json::json!({"workflowId": workflow_id, "model": "x/y"}),
        ))
        .await
        .unwrap();

    // Audio stage
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/generate-audio",
            serde_json::json!({"workflowId": workflow_id, "voice": "default", "preset": "fast"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["fallback"], false);
    assert_eq!(
        json["audioUrl"],
        format!("/audio/{}.wav", workflow_id)
    );
    assert_eq!(json["ttsResult"]["success"], true);

    // Finalize with a metacharacter-laden description (S6)
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/finalize",
            serde_json::json!({
                "workflowId": workflow_id,
                "title": "Ep1",
                "description": "<b>bold</b>",
                "localBundle": true
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "finalized");
    assert_eq!(
        json["rssUrl"],
        format!("/bundles/{}/podcast.xml", workflow_id)
    );

    let bundle_dir = app
        .root
        .path()
        .join("bundles")
        .join(&workflow_id);
    assert!(bundle_dir.join("podcast.xml").exists());
    assert!(bundle_dir.join("README.json").exists());
    // Audio copied into the self-contained folder.
    assert!(bundle_dir
        .join("audio")
        .join(format!("{}.wav", workflow_id))
        .exists());

    let xml = std::fs::read_to_string(bundle_dir.join("podcast.xml")).unwrap();
    assert!(xml.contains("<title>Ep1</title>"));
    assert!(xml.contains("&lt;b&gt;bold&lt;/b&gt;"));
    assert!(!xml.contains("<b>bold</b>"));

    // Terminal state: nothing advances past finalized.
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/finalize",
            serde_json::json!({"workflowId": workflow_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn finalize_without_audio_is_rejected() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;
    let workflow_id = create_workflow(&app).await;

    app.router
        .clone()
        .oneshot(post_json(
            "/api/upload-script",
            serde_json::json!({"workflowId": workflow_id, "script": "text"}),
        ))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/finalize",
            serde_json::json!({"workflowId": workflow_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn standalone_finalize_writes_under_rss() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;
    let workflow_id = create_workflow(&app).await;

    app.router
        .clone()
        .oneshot(post_json(
            "/api/upload-script",
            serde_json::json!({"workflowId": workflow_id, "script": "text"}),
        ))
        .await
        .unwrap();
    app.router
        .clone()
        .oneshot(post_json(
            "/api/generate-audio",
            serde_json::json!({"workflowId": workflow_id}),
        ))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/finalize",
            serde_json::json!({"workflowId": workflow_id, "localBundle": false}),
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["rssUrl"], format!("/rss/{}.xml", workflow_id));
    assert!(json.get("bundlePath").is_none());

    let rss_path = app
        .root
        .path()
        .join("rss")
        .join(format!("{}.xml", workflow_id));
    assert!(rss_path.exists());
}
