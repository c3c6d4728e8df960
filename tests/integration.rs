//! End-to-end tests driving a real bound server over HTTP: unary
//! sends, streaming sends, cancellation, and disk-store id rejection.

use std::sync::Arc;

use a2a_task_server::builders::AgentCardBuilder;
use a2a_task_server::dispatch::{router, AppState};
use a2a_task_server::engine::{AgentExecutor, RequestContext, TaskEngine, UpdateEmitter};
use a2a_task_server::store::{DiskTaskStore, InMemoryTaskStore};
use a2a_task_server::types::{Message, Part, StatusUpdate, TaskState, TaskUpdate};
use async_trait::async_trait;
use serde_json::{json, Value};

struct ScriptedAgent {
    updates: Vec<TaskUpdate>,
}

#[async_trait]
impl AgentExecutor for ScriptedAgent {
    async fn execute(&self, _ctx: RequestContext, emit: UpdateEmitter) -> Result<(), String> {
        for update in &self.updates {
            emit.emit(update.clone());
        }
        Ok(())
    }
}

/// Polls `ctx.is_cancelled()` cooperatively instead of running to
/// completion.
struct CancelAwareAgent;

#[async_trait]
impl AgentExecutor for CancelAwareAgent {
    async fn execute(&self, ctx: RequestContext, emit: UpdateEmitter) -> Result<(), String> {
        emit.emit(status(TaskState::Working, Some("working")));
        loop {
            if ctx.is_cancelled() {
                emit.emit(status(TaskState::Canceled, Some("cancelled by request")));
                return Ok(());
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}

fn status(state: TaskState, text: Option<&str>) -> TaskUpdate {
    TaskUpdate::Status(StatusUpdate {
        state,
        message: text.map(Message::agent_text),
    })
}

async fn spawn_server(updates: Vec<TaskUpdate>) -> (String, tokio::task::JoinHandle<()>) {
    spawn_server_with(Arc::new(ScriptedAgent { updates })).await
}

async fn spawn_server_with(
    executor: Arc<dyn AgentExecutor>,
) -> (String, tokio::task::JoinHandle<()>) {
    let store = Arc::new(InMemoryTaskStore::new());
    let engine = TaskEngine::new(store, executor);
    let agent_card = AgentCardBuilder::new("Test Agent")
        .url("http://127.0.0.1:0/")
        .streaming(true)
        .build()
        .unwrap();
    let state = Arc::new(AppState {
        engine,
        agent_card,
        auth_gate: None,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state, None);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/"), handle)
}

#[tokio::test]
async fn scenario_a_echo_unary_over_http() {
    let (url, _server) = spawn_server(vec![
        status(TaskState::Working, Some("working")),
        status(TaskState::Completed, Some("done")),
    ])
    .await;

    let client = reqwest::Client::new();
    let body = json!({
        "jsonrpc": "2.0",
        "id": "req-1",
        "method": "tasks/send",
        "params": {
            "id": "t1",
            "message": { "role": "user", "parts": [{"kind": "text", "text": "hi"}] }
        }
    });

    let resp: Value = client.post(&url).json(&body).send().await.unwrap().json().await.unwrap();
    assert_eq!(resp["id"], "req-1");
    assert_eq!(resp["result"]["status"]["state"], "completed");
}

#[tokio::test]
async fn scenario_f_invalid_id_rejected_by_disk_store() {
    let dir = std::env::temp_dir().join(format!("a2a-it-{}", uuid::Uuid::new_v4()));
    let store = Arc::new(DiskTaskStore::new(&dir).await.unwrap());
    let engine = TaskEngine::new(store, Arc::new(ScriptedAgent { updates: vec![] }));
    let agent_card = AgentCardBuilder::new("Test Agent").url("http://x/").build().unwrap();
    let state = Arc::new(AppState {
        engine,
        agent_card,
        auth_gate: None,
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state, None);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let body = json!({
        "jsonrpc": "2.0",
        "id": "req-2",
        "method": "tasks/send",
        "params": {
            "id": "../escape",
            "message": { "role": "user", "parts": [{"kind": "text", "text": "hi"}] }
        }
    });
    let resp: Value = client
        .post(format!("http://{addr}/"))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["error"]["code"], -32602);
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn tasks_get_returns_not_found_for_unknown_id() {
    let (url, _server) = spawn_server(vec![]).await;
    let client = reqwest::Client::new();
    let body = json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tasks/get",
        "params": { "id": "nope" }
    });
    let resp: Value = client.post(&url).json(&body).send().await.unwrap().json().await.unwrap();
    assert_eq!(resp["error"]["code"], -32001);
}

#[tokio::test]
async fn cancel_of_completed_task_is_a_no_op_success() {
    let (url, _server) = spawn_server(vec![status(TaskState::Completed, None)]).await;
    let client = reqwest::Client::new();

    let send = json!({
        "jsonrpc": "2.0", "id": 1, "method": "tasks/send",
        "params": { "id": "t9", "message": { "role": "user", "parts": [{"kind": "text", "text": "hi"}] } }
    });
    client.post(&url).json(&send).send().await.unwrap();

    let cancel = json!({
        "jsonrpc": "2.0", "id": 2, "method": "tasks/cancel",
        "params": { "id": "t9" }
    });
    let resp: Value = client.post(&url).json(&cancel).send().await.unwrap().json().await.unwrap();
    assert_eq!(resp["result"]["status"]["state"], "completed");
}

#[tokio::test]
async fn scenario_b_streaming_artifact_and_status_frames_over_sse() {
    let (url, _server) = spawn_server(vec![
        status(TaskState::Working, None),
        TaskUpdate::Artifact(a2a_task_server::types::ArtifactUpdate {
            name: Some("out.txt".into()),
            description: None,
            parts: vec![Part::text("chunk-1")],
            index: Some(0),
            append: None,
            last_chunk: Some(false),
            metadata: None,
        }),
        status(TaskState::Completed, Some("done")),
    ])
    .await;

    let client = reqwest::Client::new();
    let body = json!({
        "jsonrpc": "2.0",
        "id": "req-stream",
        "method": "tasks/sendSubscribe",
        "params": {
            "id": "t-stream",
            "message": { "role": "user", "parts": [{"kind": "text", "text": "go"}] }
        }
    });

    let resp = client.post(&url).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let raw = resp.text().await.unwrap();

    let data_lines: Vec<&str> = raw
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .collect();
    assert!(data_lines.len() >= 3, "expected at least 3 SSE frames, got {data_lines:?}");

    let frames: Vec<Value> = data_lines
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    // the artifact frame carries the chunk we emitted, at the index we reported
    let artifact_frame = frames
        .iter()
        .find(|f| f["result"]["artifact"].is_object())
        .expect("no artifact frame in stream");
    assert_eq!(artifact_frame["result"]["artifact"]["name"], "out.txt");

    // the final frame reports the completed status
    let last = frames.last().unwrap();
    assert_eq!(last["result"]["status"]["state"], "completed");
    assert_eq!(last["result"]["final"], true);
}

#[tokio::test]
async fn scenario_c_cancellation_observed_over_sse() {
    let (url, _server) = spawn_server_with(Arc::new(CancelAwareAgent)).await;
    let client = reqwest::Client::new();

    let subscribe = json!({
        "jsonrpc": "2.0",
        "id": "req-cancel",
        "method": "tasks/sendSubscribe",
        "params": {
            "id": "t3",
            "message": { "role": "user", "parts": [{"kind": "text", "text": "go"}] }
        }
    });
    let stream_url = url.clone();
    let stream_handle =
        tokio::spawn(async move { client.post(&stream_url).json(&subscribe).send().await.unwrap().text().await.unwrap() });

    // give the handler time to emit `working` and enter its poll loop
    // before the concurrent cancel lands.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let cancel_client = reqwest::Client::new();
    let cancel_body = json!({
        "jsonrpc": "2.0", "id": "req-cancel-2", "method": "tasks/cancel",
        "params": { "id": "t3" }
    });
    let cancel_resp: Value = cancel_client
        .post(&url)
        .json(&cancel_body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cancel_resp["result"]["status"]["state"], "canceled");

    let raw = stream_handle.await.unwrap();
    let frames: Vec<Value> = raw
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert!(frames
        .iter()
        .any(|f| f["result"]["status"]["state"] == "working"));
    let last = frames.last().unwrap();
    assert_eq!(last["result"]["status"]["state"], "canceled");
    assert_eq!(last["result"]["final"], true);
}

#[test]
fn part_json_shape_matches_wire_contract() {
    let part = Part::text("hi");
    let v = serde_json::to_value(&part).unwrap();
    assert_eq!(v, json!({"kind": "text", "text": "hi"}));
}
