//! Integration tests for the builder service

use std::io::Write;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::json;
use slipway_builder::{create_router, AppState, Config, EngineClient};
use tower::ServiceExt; // for `oneshot`

fn test_app(engine_url: &str) -> Router {
    let config = Config {
        host: "127.0.0.1".into(),
        port: 8080,
        engine_url: engine_url.to_string(),
        insecure_registry: false,
        preserve_ownership: false,
        max_context_bytes: 8 * 1024 * 1024,
    };
    let engine = EngineClient::new(&config.engine_url);
    create_router(AppState { config, engine })
}

/// Serve a scripted engine on a real socket, recording the solve request.
async fn spawn_mock_engine(
    frames: Vec<serde_json::Value>,
) -> (String, Arc<Mutex<Option<serde_json::Value>>>) {
    let captured: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
    let captured_clone = captured.clone();
    let body: String = frames.iter().map(|frame| format!("{frame}\n")).collect();

    let app = Router::new().route(
        "/solve",
        post(move |Json(request): Json<serde_json::Value>| {
            let captured = captured_clone.clone();
            let body = body.clone();
            async move {
                *captured.lock().unwrap() = Some(request);
                body
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), captured)
}

/// Serve an engine whose `/solve` response body is used verbatim.
async fn spawn_raw_engine(body: String) -> String {
    let app = Router::new().route(
        "/solve",
        post(move || {
            let body = body.clone();
            async move { body }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn make_context(config_json: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut header = tar::Header::new_gnu();
    header.set_size(config_json.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "config", config_json.as_bytes())
        .unwrap();

    let dockerfile = b"FROM scratch\nCOPY . /srv\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(dockerfile.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "context/Dockerfile", &dockerfile[..])
        .unwrap();

    builder.into_inner().unwrap()
}

fn success_script() -> Vec<serde_json::Value> {
    vec![
        json!({"vertexes": [{
            "name": "[1/2] FROM scratch",
            "started": "2024-05-01T12:00:00Z",
            "completed": "2024-05-01T12:00:01.500Z"
        }]}),
        json!({"statuses": [{
            "id": "sha256:ab12",
            "timestamp": "2024-05-01T12:00:02Z",
            "current": 4096
        }]}),
        json!({"logs": [{
            "timestamp": "2024-05-01T12:00:03Z",
            "data": "exporting layers\n"
        }]}),
    ]
}

async fn post_build(app: Router, payload: Vec<u8>, accept: Option<&str>) -> axum::response::Response {
    let mut request = Request::builder()
        .uri("/build")
        .method("POST")
        .header("content-type", "application/octet-stream");
    if let Some(accept) = accept {
        request = request.header("accept", accept);
    }

    app.oneshot(request.body(Body::from(payload)).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app("http://127.0.0.1:1234");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "slipway-builder");
}

#[tokio::test]
async fn test_build_success_returns_ordered_log() {
    let (engine_url, captured) = spawn_mock_engine(success_script()).await;
    let app = test_app(&engine_url);

    let payload = make_context(r#"{"Ref": "acct/svc:abc123", "Frontend": ""}"#);
    let response = post_build(app, payload, None).await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "success");
    assert_eq!(json["imageName"], "acct/svc:abc123");
    assert_eq!(
        json["log"],
        json!([
            "v: 2024-05-01T12:00:00Z [1/2] FROM scratch 1.50s",
            "s: 2024-05-01T12:00:02Z sha256:ab12 4096",
            "l: 2024-05-01T12:00:03Z exporting layers",
        ])
    );

    let solve = captured.lock().unwrap().take().expect("engine not called");
    assert_eq!(solve["exporter"], "image");
    assert_eq!(solve["exporterAttrs"]["name"], "acct/svc:abc123");
    assert_eq!(solve["exporterAttrs"]["push"], "true");
    assert_eq!(solve["frontend"], "dockerfile.v0");
    assert_eq!(solve["frontendAttrs"]["source"], "tonistiigi/dockerfile:v0");
    assert_eq!(solve["localDirs"]["context"], solve["localDirs"]["dockerfile"]);
}

#[tokio::test]
async fn test_build_success_plain_text_negotiation() {
    let (engine_url, _captured) = spawn_mock_engine(success_script()).await;
    let app = test_app(&engine_url);

    let payload = make_context(r#"{"Ref": "acct/svc:abc123"}"#);
    let response = post_build(app, payload, Some("text/plain")).await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"acct/svc:abc123");
}

#[tokio::test]
async fn test_build_failure_preserves_partial_log() {
    let script = vec![
        json!({"vertexes": [{
            "name": "[1/2] FROM scratch",
            "started": "2024-05-01T12:00:00Z"
        }]}),
        json!({"logs": [{
            "timestamp": "2024-05-01T12:00:01Z",
            "data": "process did not complete"
        }]}),
        json!({"error": "executor failed running [/bin/sh -c make]: exit code 2"}),
    ];
    let (engine_url, _captured) = spawn_mock_engine(script).await;
    let app = test_app(&engine_url);

    let payload = make_context(r#"{"Ref": "acct/svc:abc123"}"#);
    // Failures keep the JSON shape even when plain text was requested.
    let response = post_build(app, payload, Some("text/plain")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let status = json["status"].as_str().unwrap();
    assert!(status.starts_with("failure:"));
    assert!(status.contains("executor failed running"));
    assert_eq!(json["imageName"], "acct/svc:abc123");
    assert_eq!(json["log"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_build_rejects_empty_target_ref() {
    let (engine_url, captured) = spawn_mock_engine(success_script()).await;
    let app = test_app(&engine_url);

    let payload = make_context(r#"{"Ref": "", "Frontend": ""}"#);
    let response = post_build(app, payload, None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let status = json["status"].as_str().unwrap();
    assert!(status.starts_with("unexpected failure:"));
    assert!(status.contains("no target reference to push"));
    assert_eq!(json["imageName"], "");
    assert!(captured.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_build_accepts_gzip_context() {
    let (engine_url, _captured) = spawn_mock_engine(success_script()).await;
    let app = test_app(&engine_url);

    let tar_bytes = make_context(r#"{"Ref": "acct/svc:v2"}"#);
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    let payload = encoder.finish().unwrap();

    let response = post_build(app, payload, None).await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["imageName"], "acct/svc:v2");
}

#[tokio::test]
async fn test_build_broken_stream_keeps_queued_events() {
    let first = json!({"vertexes": [{
        "name": "[1/2] FROM scratch",
        "started": "2024-05-01T12:00:00Z",
        "completed": "2024-05-01T12:00:01.500Z"
    }]});
    let second = json!({"logs": [{
        "timestamp": "2024-05-01T12:00:02Z",
        "data": "pulling base image\n"
    }]});
    // Two whole frames, then the stream ends inside a third one.
    let engine_url = spawn_raw_engine(format!("{first}\n{second}\n{{\"verte")).await;
    let app = test_app(&engine_url);

    let payload = make_context(r#"{"Ref": "acct/svc:abc123"}"#);
    let response = post_build(app, payload, None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let status = json["status"].as_str().unwrap();
    assert!(status.starts_with("failure:"));
    assert!(status.contains("malformed status frame"));
    assert_eq!(json["imageName"], "acct/svc:abc123");
    // Events that reached the queue before the break stay in the log.
    assert_eq!(
        json["log"],
        json!([
            "v: 2024-05-01T12:00:00Z [1/2] FROM scratch 1.50s",
            "l: 2024-05-01T12:00:02Z pulling base image",
        ])
    );
}

#[tokio::test]
async fn test_build_engine_unreachable_is_structured_failure() {
    // Grab a port that nothing is listening on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = test_app(&format!("http://{addr}"));
    let payload = make_context(r#"{"Ref": "acct/svc:abc123"}"#);
    let response = post_build(app, payload, None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(json["status"].as_str().unwrap().starts_with("failure:"));
    assert_eq!(json["imageName"], "acct/svc:abc123");
    assert_eq!(json["log"], json!([]));
}
