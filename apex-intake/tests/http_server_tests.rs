//! HTTP Server & Routing Integration Tests
//!
//! Exercise the router end to end with `oneshot`; detection loops run on the
//! test runtime with short ticks.

mod helpers;

use apex_common::EventBus;
use apex_intake::{build_router, AppState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::{fast_config, fixture_dataset};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn test_app() -> Router {
    let state = AppState::new(fixture_dataset(), EventBus::new(100), fast_config());
    build_router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn poll_until_terminal(app: &Router, job_id: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (status, body) = send(app, get(&format!("/api/detect/status/{job_id}"))).await;
            assert_eq!(status, StatusCode::OK);
            if body["overall"] != "running" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job should finish")
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "apex-intake");
    assert_eq!(body["jobs_tracked"], 0);
    assert_eq!(body["jobs_scheduling"], 0);
}

#[tokio::test]
async fn test_start_then_poll_status() {
    let app = test_app();

    let (status, ack) = send(
        &app,
        post_json(
            "/api/detect/start",
            json!({ "jobId": "job-http", "reportKeys": ["soi", "pands"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "started": true }));

    let snapshot = poll_until_terminal(&app, "job-http").await;
    assert_eq!(snapshot["jobId"], "job-http");
    assert_eq!(snapshot["overall"], "success");
    assert_eq!(snapshot["progress"], json!({ "done": 2, "total": 2 }));
    assert_eq!(snapshot["outcome"]["fieldsAnyNo"], true);
    assert_eq!(snapshot["outcome"]["fieldsAllYes"], false);

    let reports = snapshot["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["reportKey"], "soi");
    assert_eq!(reports[0]["fieldsMapped"], "no");
    assert_eq!(reports[0]["attributesMapped"], "no");
}

#[tokio::test]
async fn test_repeated_start_reports_already() {
    let app = test_app();
    let body = json!({ "jobId": "job-twice", "reports": ["soi"] });

    let (_, first) = send(&app, post_json("/api/detect/start", body.clone())).await;
    let (status, second) = send(&app, post_json("/api/detect/start", body)).await;

    assert_eq!(first, json!({ "started": true }));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, json!({ "started": true, "already": true }));
}

#[tokio::test]
async fn test_empty_start_acknowledged() {
    let app = test_app();
    let (status, ack) = send(
        &app,
        post_json("/api/detect/start", json!({ "jobId": "job-none", "reportKeys": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "started": true, "empty": true }));

    let (_, snapshot) = send(&app, get("/api/detect/status/job-none")).await;
    assert_eq!(snapshot["overall"], "success");
    assert_eq!(snapshot["progress"], json!({ "done": 0, "total": 0 }));
}

#[tokio::test]
async fn test_start_without_job_id_is_bad_request() {
    let app = test_app();
    let (status, body) = send(
        &app,
        post_json("/api/detect/start", json!({ "reportKeys": ["soi"] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = test_app();

    let (status, body) = send(&app, get("/api/detect/status/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, post_json("/api/detect/stop/missing", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registered_files_feed_detection() {
    let app = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/jobs/job-files/files",
            json!([
                { "originalName": "Statement of Investments.xlsx", "storedName": "a1.xlsx", "size": 4096 },
                { "originalName": "notes.txt", "storedName": "a2.txt" }
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registered"], 2);
    assert_eq!(body["totalFiles"], 2);

    send(
        &app,
        post_json(
            "/api/detect/start",
            json!({ "jobId": "job-files", "reportKeys": ["soi"], "routines": ["INV"] }),
        ),
    )
    .await;

    let snapshot = poll_until_terminal(&app, "job-files").await;
    let soi = &snapshot["reports"][0];
    assert_eq!(soi["fieldsMapped"], "yes");
    assert_eq!(soi["located"], "yes");
    assert_eq!(soi["locatedSource"], "rules");
    assert_eq!(soi["mappedCount"], 4);
    assert_eq!(snapshot["outcome"]["fieldsAllYes"], true);
}

#[tokio::test]
async fn test_file_without_name_rejected() {
    let app = test_app();
    let (status, body) = send(
        &app,
        post_json(
            "/api/jobs/job-x/files",
            json!([{ "originalName": " ", "storedName": "x.csv" }]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_stop_known_job() {
    let app = test_app();
    send(
        &app,
        post_json("/api/detect/start", json!({ "jobId": "job-stop", "reportKeys": [] })),
    )
    .await;

    let (status, body) = send(&app, post_json("/api/detect/stop/job-stop", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "jobId": "job-stop", "stopped": false }));
}
