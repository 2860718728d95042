//! Integration tests for the admin HTTP API.

mod helpers;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use helpers::{Harness, test_config};
use mft_api::{AppState, build_app};

struct TestApi {
    harness: Harness,
    router: Router,
}

struct TestResponse {
    status: StatusCode,
    body: Value,
}

impl TestApi {
    fn new() -> Self {
        let harness = Harness::new();
        let router = build_app(AppState::new(test_config(), harness.engine.clone()));
        Self { harness, router }
    }

    async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse { status, body }
    }

    async fn create_config(&self, name: &str, files: &[&str]) -> String {
        for file in files {
            self.harness
                .remote
                .put(&format!("/src/{name}/{file}"), "payload");
        }
        let response = self
            .request(
                "POST",
                "/api/configs",
                Some(json!({
                    "name": name,
                    "source_type": "local",
                    "source_path": format!("/src/{name}"),
                    "destination_type": "local",
                    "destination_path": format!("/dst/{name}"),
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_job(&self, name: &str, schedule: &str, config_ids: &[&str]) -> TestResponse {
        self.request(
            "POST",
            "/api/jobs",
            Some(json!({
                "name": name,
                "schedule": schedule,
                "config_ids": config_ids,
                "webhook_secret": "never-echoed",
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health() {
    let api = TestApi::new();
    let response = api.request("GET", "/api/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["database"], "connected");
    assert_eq!(response.body["data"]["scheduled_jobs"], 0);
}

#[tokio::test]
async fn test_create_and_read_job() {
    let api = TestApi::new();
    let config_id = api.create_config("inbound", &[]).await;

    let created = api
        .create_job("nightly", "0 2 * * *", &[config_id.as_str()])
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let job = &created.body["data"];
    assert!(job["next_run"].is_string());
    assert!(job.get("webhook_secret").is_none());
    let id = job["id"].as_str().unwrap();

    let fetched = api.request("GET", &format!("/api/jobs/{id}"), None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["data"]["name"], "nightly");

    let listed = api.request("GET", "/api/jobs", None).await;
    assert_eq!(listed.body["data"].as_array().unwrap().len(), 1);

    let configs = api.request("GET", "/api/configs", None).await;
    assert!(configs.body["data"][0].get("source_credentials").is_none());
}

#[tokio::test]
async fn test_invalid_jobs_are_rejected() {
    let api = TestApi::new();
    let config_id = api.create_config("c", &[]).await;

    let bad_schedule = api
        .create_job("bad", "every tuesday", &[config_id.as_str()])
        .await;
    assert_eq!(bad_schedule.status, StatusCode::BAD_REQUEST);
    assert!(bad_schedule.body["message"].is_string());

    let unknown_config = api
        .create_job("orphan", "0 * * * *", &["6f1c1f0e-8f4e-4a53-9a57-3f0f3ce0b2a1"])
        .await;
    assert_eq!(unknown_config.status, StatusCode::BAD_REQUEST);

    let missing = api
        .request(
            "GET",
            "/api/jobs/6f1c1f0e-8f4e-4a53-9a57-3f0f3ce0b2a1",
            None,
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_run_now_conflict_and_history() {
    let api = TestApi::new();
    let config_id = api.create_config("files", &["a.txt", "b.txt"]).await;
    let job = api
        .create_job("runner", "0 * * * *", &[config_id.as_str()])
        .await;
    let id = job.body["data"]["id"].as_str().unwrap().to_string();

    api.harness.remote.hold();
    let started = api
        .request("POST", &format!("/api/jobs/{id}/run"), None)
        .await;
    assert_eq!(started.status, StatusCode::ACCEPTED);
    assert_eq!(started.body["data"]["status"], "running");
    let history_id = started.body["data"]["id"].as_str().unwrap().to_string();

    let again = api
        .request("POST", &format!("/api/jobs/{id}/run"), None)
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    api.harness.remote.release();
    let job_id = id.parse().unwrap();
    api.harness.wait_idle(job_id).await;

    let page = api
        .request("GET", &format!("/api/jobs/{id}/history?page=1&page_size=10"), None)
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["data"]["total_items"], 1);
    assert_eq!(page.body["data"]["items"][0]["status"], "completed");

    let execution = api
        .request("GET", &format!("/api/history/{history_id}"), None)
        .await;
    assert_eq!(execution.body["data"]["files_transferred"], 2);

    let files = api
        .request("GET", &format!("/api/history/{history_id}/files"), None)
        .await;
    assert_eq!(files.body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_duplicate_toggle_and_delete() {
    let api = TestApi::new();
    let config_id = api.create_config("c", &[]).await;
    let job = api
        .create_job("weekly", "0 6 * * 1", &[config_id.as_str()])
        .await;
    let id = job.body["data"]["id"].as_str().unwrap().to_string();

    let copy = api
        .request("POST", &format!("/api/jobs/{id}/duplicate"), None)
        .await;
    assert_eq!(copy.status, StatusCode::CREATED);
    assert_eq!(copy.body["data"]["name"], "weekly (Copy)");
    assert_eq!(copy.body["data"]["enabled"], false);
    let copy_id = copy.body["data"]["id"].as_str().unwrap().to_string();

    let enabled = api
        .request(
            "PUT",
            &format!("/api/jobs/{copy_id}/enabled"),
            Some(json!({"enabled": true})),
        )
        .await;
    assert_eq!(enabled.status, StatusCode::OK);
    assert!(enabled.body["data"]["next_run"].is_string());

    let blocked = api
        .request("DELETE", &format!("/api/configs/{config_id}"), None)
        .await;
    assert_eq!(blocked.status, StatusCode::CONFLICT);

    for job_id in [&id, &copy_id] {
        let deleted = api
            .request("DELETE", &format!("/api/jobs/{job_id}"), None)
            .await;
        assert_eq!(deleted.status, StatusCode::OK);
    }
    assert!(api.harness.engine.scheduler.is_empty());

    let freed = api
        .request("DELETE", &format!("/api/configs/{config_id}"), None)
        .await;
    assert_eq!(freed.status, StatusCode::OK);
}
