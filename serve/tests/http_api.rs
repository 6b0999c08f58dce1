//! End-to-end tests against the HTTP surface, driven over a real TCP socket.

use tokio::net::TcpListener;

async fn spawn_server() -> (
    String,
    tokio::task::JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{addr}");
    let handle = tokio::spawn(serve::run_serve_on_listener(listener));
    (url, handle)
}

#[tokio::test]
async fn health_reports_ok() {
    let (url, _handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client.get(format!("{url}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_session_rejects_missing_workspace() {
    let (url, _handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{url}/api/sessions"))
        .json(&serde_json::json!({
            "workspacePath": "/nonexistent/workspace/path",
            "provider": "openai",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn create_session_rejects_unknown_provider() {
    let (url, _handle) = spawn_server().await;
    let tmp = tempfile::tempdir().unwrap();
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{url}/api/sessions"))
        .json(&serde_json::json!({
            "workspacePath": tmp.path().to_str().unwrap(),
            "provider": "made-up-vendor",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn get_session_404_for_unknown_id() {
    let (url, _handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{url}/api/sessions/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn chat_404_for_unknown_session() {
    let (url, _handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{url}/api/sessions/does-not-exist/chat"))
        .json(&serde_json::json!({"message": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn approve_404_for_unknown_session() {
    let (url, _handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{url}/api/sessions/does-not-exist/approvals/call-1"))
        .json(&serde_json::json!({"approved": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn stream_404_for_unknown_session() {
    let (url, _handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{url}/api/sessions/does-not-exist/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn create_session_openai_without_api_key_is_validation_error() {
    std::env::remove_var("OPENAI_API_KEY");
    let (url, _handle) = spawn_server().await;
    let tmp = tempfile::tempdir().unwrap();
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{url}/api/sessions"))
        .json(&serde_json::json!({
            "workspacePath": tmp.path().to_str().unwrap(),
            "provider": "openai",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
