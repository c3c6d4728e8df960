//! SSE streamer: turns engine frames into the wire format — one
//! unnamed `data:` line per frame, a JSON-RPC success envelope
//! wrapping either a status event or an artifact event, and exactly
//! one `final: true` frame ending the stream.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::error;

use crate::engine::EngineFrame;
use crate::types::JsonRpcResponse;

/// Adapts a channel of engine frames into an SSE event stream. The
/// stream ends as soon as the channel closes — either because a final
/// frame was the last thing sent (the engine stops forwarding after
/// it), or because the engine's background task ended without one
/// (a storage error mid-stream, handled by simply closing without an
/// extra frame).
pub fn frames_to_sse(
    request_id: Value,
    mut rx: mpsc::UnboundedReceiver<EngineFrame>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(frame) = rx.recv().await {
            let (result, is_final) = match frame {
                EngineFrame::Status { task, is_final } => {
                    (
                        json!({ "id": task.id, "status": task.status, "final": is_final }),
                        is_final,
                    )
                }
                EngineFrame::Artifact { task, index } => {
                    let artifact = task.artifacts.get(index).cloned();
                    match artifact {
                        Some(artifact) => (
                            json!({ "id": task.id, "artifact": artifact, "final": false }),
                            false,
                        ),
                        None => {
                            error!(task_id = %task.id, "artifact frame referenced a missing index, skipping");
                            continue;
                        }
                    }
                }
            };

            let envelope = JsonRpcResponse::success(request_id.clone(), result);
            match serde_json::to_string(&envelope) {
                Ok(data) => yield Ok(Event::default().data(data)),
                Err(e) => {
                    error!(error = %e, "failed to serialize SSE frame, skipping");
                    continue;
                }
            }

            if is_final {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Status, Task, TaskState};
    use futures::StreamExt;

    #[tokio::test]
    async fn stream_ends_after_final_frame() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut task = Task::new("t1", None);
        task.status = Status::new(TaskState::Working);
        tx.send(EngineFrame::Status {
            task: task.clone(),
            is_final: false,
        })
        .unwrap();
        task.status = Status::new(TaskState::Completed);
        tx.send(EngineFrame::Status {
            task,
            is_final: true,
        })
        .unwrap();
        drop(tx);

        let events: Vec<_> = frames_to_sse(json!("req-1"), rx).collect().await;
        assert_eq!(events.len(), 2);
    }
}
