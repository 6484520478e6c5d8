//! Router-level integration tests: catalog, sources, keys, feedback

mod helpers;

use axum::http::StatusCode;
use helpers::{body_json, get, post_json, seed_catalog, test_app};
use tower::ServiceExt;

#[tokio::test]
async fn health_reports_ok_with_counts() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["database"], "connected");
    assert_eq!(json["counts"]["speeches"], 2);
}

#[tokio::test]
async fn search_returns_date_ordered_results() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;

    let response = app.router.clone().oneshot(get("/api/search")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["pagination"]["total"], 2);
    // Dated row first, null-date row last.
    assert_eq!(json["results"][0]["id"], "archive_a");
    assert_eq!(json["results"][1]["id"], "archive_b");
}

#[tokio::test]
async fn search_keyword_filters_case_insensitively() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/search?keyword=phoenix"))
        .await
        .unwrap();
    let json = body_json(response).await;

    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["results"][0]["id"], "archive_a");
}

#[tokio::test]
async fn search_clamps_limit_and_rejects_bad_dates() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/search?limit=500&offset=-3"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["pagination"]["limit"], 100);
    assert_eq!(json["pagination"]["offset"], 0);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/search?startDate=Feb+19"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "INVALID_INPUT");
}

#[tokio::test]
async fn refresh_archive_ingests_fixture_records() {
    let app = test_app("SCRIPT").await;

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/refresh-archive", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["existing"], 0);
    assert_eq!(json["inserted"], 2);
    assert_eq!(json["total"], 2);

    // Idempotent: same source set, nothing new.
    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/refresh-archive", serde_json::json!({})))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["inserted"], 0);
}

#[tokio::test]
async fn verify_sources_reports_availability() {
    let app = test_app("SCRIPT").await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/verify-sources"))
        .await
        .unwrap();
    let json = body_json(response).await;

    assert_eq!(json["archive"]["available"], true);
    assert_eq!(json["archive"]["method"], "fixture");
}

#[tokio::test]
async fn status_lists_sources_and_ai_flag() {
    let app = test_app("SCRIPT").await;
    seed_catalog(&app).await;

    let response = app.router.clone().oneshot(get("/api/status")).await.unwrap();
    let json = body_json(response).await;

    assert_eq!(json["sources"]["archive"], true);
    assert_eq!(json["counts"]["speeches"], 2);
    assert_eq!(json["ai_configured"], true);
}

#[tokio::test]
async fn key_validation_rejects_bad_format_with_400() {
    let app = test_app("SCRIPT").await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/validate-openrouter-key",
            serde_json::json!({"apiKey": "sk-proj-not-openrouter"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["valid"], false);
    assert_eq!(json["error_code"], "INVALID_KEY_FORMAT");
}

#[tokio::test]
async fn valid_keys_join_the_pool_with_derived_priority() {
    let app = test_app("SCRIPT").await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/validate-keys",
            serde_json::json!({"apiKeys": ["sk-or-v1-aaaa", "sk-bad-format"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    // model_count 50 → priority 5
    assert_eq!(json[0]["valid"], true);
    assert_eq!(json[0]["pooledPriority"], 5);
    assert_eq!(json[1]["valid"], false);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/key-pool-status"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["size"], 1);
    assert_eq!(json["keys"][0]["key_prefix"], "sk-or-v1-aaa...");
}

#[tokio::test]
async fn bulk_validation_caps_at_ten_keys() {
    let app = test_app("SCRIPT").await;
    let keys: Vec<String> = (0..11).map(|i| format!("sk-or-v1-{i:04}")).collect();

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/validate-keys",
            serde_json::json!({"apiKeys": keys}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn openrouter_proxy_returns_content() {
    let app = test_app("PROXIED REPLY").await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/openrouter",
            serde_json::json!({
                "model": "x/y",
                "messages": [{"role": "user", "content": "hello"}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["content"], "PROXIED REPLY");
}

#[tokio::test]
async fn models_endpoint_groups_by_category() {
    let app = test_app("SCRIPT").await;

    let response = app.router.clone().oneshot(get("/api/models")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["categories"]["top_overall"].as_array().unwrap().len() >= 2);
    // Server key validated through the scripted provider.
    assert_eq!(json["validation"]["valid"], true);
}

#[tokio::test]
async fn feedback_round_trips_into_analytics() {
    let app = test_app("SCRIPT").await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/feedback",
            serde_json::json!({
                "overallRating": 5,
                "scriptRating": 4,
                "audioRating": 3,
                "recommend": true,
                "comments": "solid"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/feedback",
            serde_json::json!({"overallRating": 6, "scriptRating": 1, "audioRating": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/feedback/analytics"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["avg_overall"], 5.0);
}

#[tokio::test]
async fn analytics_cleanup_validates_retention() {
    let app = test_app("SCRIPT").await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/analytics/cleanup",
            serde_json::json!({"retentionDays": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/analytics/cleanup", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["retention_days"], 30);
}

#[tokio::test]
async fn voices_come_from_the_synthesizer() {
    let app = test_app("SCRIPT").await;

    let response = app.router.clone().oneshot(get("/api/voices")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["voices"][0], "default");
    assert_eq!(json["voices"][1], "statesman");
}
