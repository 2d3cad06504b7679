//! HTTP API 集成测试

mod common;

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use common::{
    build_app, completion_response, message, spawn_app, stored_analysis, text_channel, two_trends, FakeBackend,
    FakeCollector,
};
use snowledge_analyzer::core::store::Store;

fn collector() -> FakeCollector {
    FakeCollector::default()
        .with_guild(1, "Rustaceans", vec![text_channel(10, "general"), text_channel(11, "help")])
        .with_guild(2, "Empty", vec![])
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let app = build_app(collector(), FakeBackend::default());
    let addr = spawn_app(app.state).await;

    let response = reqwest::get(format!("http://{}/analyzer/health", addr)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_cors_mirrors_origin_and_exposes_reason() {
    let app = build_app(collector(), FakeBackend::default());
    let addr = spawn_app(app.state).await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/analyzer/health", addr))
        .header("Origin", "http://front.example")
        .send()
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "http://front.example");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert!(headers["access-control-expose-headers"]
        .to_str()
        .unwrap()
        .contains("x-reason"));
}

#[tokio::test]
async fn test_list_servers_returns_string_ids() {
    let app = build_app(collector(), FakeBackend::default());
    let addr = spawn_app(app.state).await;

    let body: Value = reqwest::get(format!("http://{}/analyzer/discord/servers", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        body,
        json!({"servers": [{"id": "1", "name": "Rustaceans"}, {"id": "2", "name": "Empty"}]})
    );
}

#[tokio::test]
async fn test_list_servers_failure_is_500() {
    let failing = FakeCollector {
        fail_servers: true,
        ..Default::default()
    };
    let app = build_app(failing, FakeBackend::default());
    let addr = spawn_app(app.state).await;

    let response = reqwest::get(format!("http://{}/analyzer/discord/servers", addr)).await.unwrap();
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "gateway unavailable");
}

#[tokio::test]
async fn test_list_channels_marks_harvested() {
    let app = build_app(collector(), FakeBackend::default());
    app.store
        .save_messages_if_new(&[message(500, 10, Utc::now(), Some("alice"), "hi")])
        .await
        .unwrap();
    let addr = spawn_app(app.state).await;

    let response = reqwest::get(format!("http://{}/analyzer/discord/channels/1", addr)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["server_id"], "1");
    assert_eq!(body["server_name"], "Rustaceans");
    assert_eq!(
        body["channels"],
        json!([
            {"id": "10", "name": "general", "harvested": true},
            {"id": "11", "name": "help", "harvested": false},
        ])
    );
}

#[tokio::test]
async fn test_list_channels_unknown_guild() {
    let app = build_app(collector(), FakeBackend::default());
    let addr = spawn_app(app.state).await;

    let response = reqwest::get(format!("http://{}/analyzer/discord/channels/999", addr)).await.unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Guild 999 not found or bot not a member.");

    let response = reqwest::get(format!("http://{}/analyzer/discord/channels/abc", addr)).await.unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_queue_harvest_and_poll_status() {
    let app = build_app(collector(), FakeBackend::default());
    let addr = spawn_app(app.state).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/analyzer/discord/harvest", addr))
        .json(&json!({
            "discordId": "admin-42",
            "serverId": "1",
            "channels": [10, "11"],
            "after": "2024-05-01T00:00:00Z",
            "before": ""
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "queued");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let stored = app.store.get_harvest_job(&job_id).await.unwrap().unwrap();
    assert_eq!(stored.channels, vec![10, 11]);
    assert_eq!(stored.after.as_deref(), Some("2024-05-01T00:00:00Z"));
    assert_eq!(stored.before, None);

    let status: Value = client
        .get(format!("http://{}/analyzer/discord/harvest/status/{}", addr, job_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        status,
        json!({"job_id": job_id, "status": "pending", "inserted": null, "finished_at": null, "error": null})
    );
}

#[tokio::test]
async fn test_queue_harvest_rejects_missing_fields() {
    let app = build_app(collector(), FakeBackend::default());
    let addr = spawn_app(app.state).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/analyzer/discord/harvest", addr))
        .json(&json!({"serverId": 1, "channels": [10]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("discordId"), "{}", body);

    let response = reqwest::Client::new()
        .post(format!("http://{}/analyzer/discord/harvest", addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_bad_trend_index_is_json_error() {
    let app = build_app(collector(), FakeBackend::default());
    let addr = spawn_app(app.state).await;

    let response = reqwest::get(format!(
        "http://{}/analyzer/discord/trend-to-content/{}?trend_index=-1",
        addr,
        uuid::Uuid::new_v4()
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Failed to deserialize query string"),
        "{}",
        body
    );
}

#[tokio::test]
async fn test_harvest_status_errors() {
    let app = build_app(collector(), FakeBackend::default());
    let addr = spawn_app(app.state).await;

    let response = reqwest::get(format!("http://{}/analyzer/discord/harvest/status/not-an-id", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid job_id format");

    let response = reqwest::get(format!(
        "http://{}/analyzer/discord/harvest/status/{}",
        addr,
        uuid::Uuid::new_v4()
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Job not found");
}

fn analyze_body(period: &str) -> Value {
    json!({
        "creator_id": 7,
        "serverId": "1",
        "channelId": "10",
        "model_name": "small-model",
        "prompt_key": "discord_trends",
        "period": period
    })
}

#[tokio::test]
async fn test_analyze_without_messages_is_204() {
    let app = build_app(collector(), FakeBackend::default());
    let backend = app.backend.clone();
    let addr = spawn_app(app.state).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/analyzer/discord/analyze", addr))
        .json(&analyze_body("last_day"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 204);
    assert_eq!(response.headers()["x-reason"], "No messages found for this period.");
    assert!(backend.payloads().is_empty());
}

#[tokio::test]
async fn test_analyze_rejects_unknown_period() {
    let app = build_app(collector(), FakeBackend::default());
    let addr = spawn_app(app.state).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/analyzer/discord/analyze", addr))
        .json(&analyze_body("last_year"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid period. Use last_day, last_week, or last_month.");
}

#[tokio::test]
async fn test_analyze_returns_raw_llm_response() {
    let llm_response = completion_response(&two_trends());
    let app = build_app(collector(), FakeBackend::responding(vec![llm_response.clone()]));
    let now = Utc::now();
    app.store
        .save_messages_if_new(&[
            message(2, 10, now - Duration::hours(1), None, "second"),
            message(1, 10, now - Duration::hours(2), Some("alice"), "first"),
            message(3, 10, now - Duration::days(3), Some("old"), "too old"),
        ])
        .await
        .unwrap();
    let backend = app.backend.clone();
    let addr = spawn_app(app.state).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/analyzer/discord/analyze", addr))
        .json(&analyze_body("last_day"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, llm_response);

    let payloads = backend.payloads();
    assert_eq!(payloads.len(), 1);
    let user = payloads[0]["messages"][1]["content"].as_str().unwrap();
    let lines: Vec<&str> = user.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].ends_with("alice: first"));
    assert!(lines[2].ends_with("1002: second"));
    assert!(!user.contains("too old"));
}

#[tokio::test]
async fn test_analyze_llm_failure_is_500() {
    let app = build_app(collector(), FakeBackend::failing("overloaded"));
    app.store
        .save_messages_if_new(&[message(1, 10, Utc::now() - Duration::hours(1), Some("a"), "hi")])
        .await
        .unwrap();
    let addr = spawn_app(app.state).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/analyzer/discord/analyze", addr))
        .json(&analyze_body("last_week"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "LLM error: LLM API error: 503 - overloaded");
}

#[tokio::test]
async fn test_trend_to_content_endpoint() {
    let content_response = json!({"choices": [{"message": {"content": "Post!"}}]});
    let app = build_app(collector(), FakeBackend::responding(vec![content_response.clone()]));
    let analysis_id = stored_analysis(app.store.as_ref(), completion_response(&two_trends())).await;
    let backend = app.backend.clone();
    let addr = spawn_app(app.state).await;

    let response = reqwest::get(format!(
        "http://{}/analyzer/discord/trend-to-content/{}?trend_index=1",
        addr, analysis_id
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, content_response);

    let payloads = backend.payloads();
    let prompt = payloads[0]["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("\"trend_title\": \"Été release\""));
    assert!(prompt.contains("\"timeframe\": \"2024-05\""));
}

#[tokio::test]
async fn test_trend_to_content_errors() {
    let app = build_app(collector(), FakeBackend::default());
    let store = app.store.clone();
    let with_trends = stored_analysis(store.as_ref(), completion_response(&two_trends())).await;
    let no_trends = stored_analysis(store.as_ref(), completion_response(&json!({"trends": []}))).await;
    let garbage = stored_analysis(
        store.as_ref(),
        json!({"choices": [{"message": {"content": "not json"}}]}),
    )
    .await;
    let addr = spawn_app(app.state).await;

    let cases = [
        ("nope".to_string(), "", 400u16, "Invalid analyse_id format"),
        (uuid::Uuid::new_v4().to_string(), "", 404, "Analyse not found"),
        (garbage, "", 500, "Failed to parse LLM analysis content"),
        (no_trends, "", 400, "No trends found in the analysis result"),
        (
            with_trends,
            "?trend_index=5",
            400,
            "Trend index 5 out of range. Only 2 trend(s) available.",
        ),
    ];

    for (id, query, status, detail) in cases {
        let response = reqwest::get(format!(
            "http://{}/analyzer/discord/trend-to-content/{}{}",
            addr, id, query
        ))
        .await
        .unwrap();
        assert_eq!(response.status(), status, "{}", detail);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["detail"], detail);
    }
}
