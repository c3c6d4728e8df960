//! Task engine: loads-or-creates a task, builds the handler's
//! execution context, drives the handler's lazy sequence of updates
//! through the merger, persists after each one, maintains the
//! cancellation set, and forces a terminal state on handler return or
//! failure.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{A2AError, A2AResult};
use crate::merge::merge;
use crate::store::TaskStore;
use crate::types::{
    Message, SendTaskParams, StatusUpdate, Task, TaskAndHistory, TaskHistory, TaskState,
    TaskUpdate,
};

/// Context handed to a handler for one request. Carries a deep copy of
/// the task/history at the moment the engine started driving it, plus
/// a cooperative cancellation predicate.
#[derive(Clone)]
pub struct RequestContext {
    pub task_id: String,
    pub session_id: Option<String>,
    pub message: Message,
    pub task: Task,
    pub history: TaskHistory,
    is_cancelled: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl RequestContext {
    pub fn is_cancelled(&self) -> bool {
        (self.is_cancelled)()
    }
}

/// Sink the handler uses to yield updates back to the engine. Cloning
/// is cheap; handlers may hand clones to sub-tasks.
#[derive(Clone)]
pub struct UpdateEmitter {
    tx: mpsc::UnboundedSender<TaskUpdate>,
}

impl UpdateEmitter {
    pub fn emit(&self, update: TaskUpdate) {
        // The engine may have already stopped listening (terminal state
        // reached, or the stream was dropped); a failed send is not an
        // error the handler needs to see.
        let _ = self.tx.send(update);
    }
}

/// Clears a task's cancellation flag when the run it was raised for
/// ends, on every exit path including early returns and panics. A
/// flag cleared any earlier could be missed by a handler that hasn't
/// polled `is_cancelled()` yet; left set any later, it would bleed
/// into a subsequent run of the same task id (e.g. a terminal reopen).
struct CancellationGuard {
    cancellations: Arc<StdMutex<HashSet<String>>>,
    task_id: String,
}

impl Drop for CancellationGuard {
    fn drop(&mut self) {
        self.cancellations.lock().unwrap().remove(&self.task_id);
    }
}

/// External user code: given a request context, produces a lazy
/// sequence of updates via `emit`, observing `context.is_cancelled()`
/// cooperatively. Returning `Err` synthesizes a `failed` terminal
/// status; returning `Ok(())` without a prior terminal yield forces
/// `completed`.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, context: RequestContext, emit: UpdateEmitter) -> Result<(), String>;
}

/// Frame produced by a streaming run, already merged and persisted —
/// the SSE layer turns these into wire frames.
#[derive(Debug, Clone)]
pub enum EngineFrame {
    Status { task: Task, is_final: bool },
    Artifact { task: Task, index: usize },
}

pub struct TaskEngine {
    store: Arc<dyn TaskStore>,
    executor: Arc<dyn AgentExecutor>,
    cancellations: Arc<StdMutex<HashSet<String>>>,
}

impl TaskEngine {
    pub fn new(store: Arc<dyn TaskStore>, executor: Arc<dyn AgentExecutor>) -> Self {
        TaskEngine {
            store,
            executor,
            cancellations: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    fn validate(params: &SendTaskParams) -> A2AResult<()> {
        if params.id.trim().is_empty() {
            return Err(A2AError::invalid_params("task id must be a non-empty string"));
        }
        if params.message.parts.is_empty() {
            return Err(A2AError::invalid_params("message must contain at least one part"));
        }
        Ok(())
    }

    /// Loads the existing task by id, or creates a fresh one seeded
    /// from `params` if none exists yet, persisting the result either
    /// way.
    async fn load_or_create(&self, params: &SendTaskParams) -> A2AResult<TaskAndHistory> {
        let existing = self.store.load(&params.id).await?;

        let snapshot = match existing {
            None => TaskAndHistory {
                task: {
                    let mut t = Task::new(params.id.clone(), params.session_id.clone());
                    t.metadata = params.metadata.clone();
                    t
                },
                history: TaskHistory {
                    messages: vec![params.message.clone()],
                },
            },
            Some(mut snap) => {
                snap.history.push(params.message.clone());

                if snap.task.status.state.is_terminal() {
                    (snap, _) = merge(
                        &snap,
                        &TaskUpdate::Status(StatusUpdate {
                            state: TaskState::Submitted,
                            message: None,
                        }),
                    );
                } else if snap.task.status.state == TaskState::InputRequired {
                    (snap, _) = merge(
                        &snap,
                        &TaskUpdate::Status(StatusUpdate {
                            state: TaskState::Working,
                            message: None,
                        }),
                    );
                }

                snap
            }
        };

        self.store.save(&snapshot).await?;
        Ok(snapshot)
    }

    fn build_context(&self, snapshot: &TaskAndHistory, params: &SendTaskParams) -> RequestContext {
        let task_id = snapshot.task.id.clone();
        let cancellations = self.cancellations.clone();
        RequestContext {
            task_id: task_id.clone(),
            session_id: snapshot.task.session_id.clone(),
            message: params.message.clone(),
            task: snapshot.task.clone(),
            history: snapshot.history.clone(),
            is_cancelled: Arc::new(move || cancellations.lock().unwrap().contains(&task_id)),
        }
    }

    /// `tasks/send`: drive the handler to completion, return the final
    /// persisted task.
    pub async fn send(&self, params: SendTaskParams) -> A2AResult<Task> {
        Self::validate(&params)?;
        let snapshot = self.load_or_create(&params).await?;
        // A cancel() against a previous, no-longer-running instance of
        // this id must not bleed into this fresh run.
        self.cancellations.lock().unwrap().remove(&params.id);
        let context = self.build_context(&snapshot, &params);
        let _clear_on_drop = CancellationGuard {
            cancellations: self.cancellations.clone(),
            task_id: params.id.clone(),
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let emitter = UpdateEmitter { tx };
        let executor = self.executor.clone();
        let ctx_for_handler = context.clone();
        let handle = tokio::spawn(async move { executor.execute(ctx_for_handler, emitter).await });

        let mut current = snapshot;
        let mut terminal_reached = false;

        while let Some(update) = rx.recv().await {
            if terminal_reached {
                continue;
            }
            (current, _) = merge(&current, &update);
            self.store.save(&current).await?;
            if current.task.status.state.is_terminal() {
                terminal_reached = true;
            }
        }

        match handle.await {
            Ok(Ok(())) => {
                if !terminal_reached {
                    (current, _) = merge(
                        &current,
                        &TaskUpdate::Status(StatusUpdate {
                            state: TaskState::Completed,
                            message: None,
                        }),
                    );
                    self.store.save(&current).await?;
                }
                Ok(current.task)
            }
            Ok(Err(handler_message)) => {
                if !terminal_reached {
                    (current, _) = merge(
                        &current,
                        &TaskUpdate::Status(StatusUpdate {
                            state: TaskState::Failed,
                            message: Some(Message::agent_text(handler_message.clone())),
                        }),
                    );
                    self.store.save(&current).await?;
                }
                error!(task_id = %current.task.id, error = %handler_message, "handler failed");
                Err(A2AError::internal_error(handler_message).with_task_id(current.task.id))
            }
            Err(join_err) => {
                error!(error = %join_err, "handler task panicked");
                Err(A2AError::internal_error(format!("handler panicked: {join_err}"))
                    .with_task_id(current.task.id))
            }
        }
    }

    /// `tasks/sendSubscribe`: drive the handler, forwarding each merged
    /// update to the returned stream. Stops forwarding (and the handler
    /// is left to run detached) at the first status update that
    /// becomes terminal or quasi-terminal.
    pub async fn send_subscribe(
        &self,
        params: SendTaskParams,
    ) -> A2AResult<mpsc::UnboundedReceiver<EngineFrame>> {
        Self::validate(&params)?;
        let snapshot = self.load_or_create(&params).await?;
        // A cancel() against a previous, no-longer-running instance of
        // this id must not bleed into this fresh run.
        self.cancellations.lock().unwrap().remove(&params.id);
        let context = self.build_context(&snapshot, &params);

        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let emitter = UpdateEmitter { tx };
        let executor = self.executor.clone();
        let ctx_for_handler = context.clone();
        let handle = tokio::spawn(async move { executor.execute(ctx_for_handler, emitter).await });

        let store = self.store.clone();
        let cancellations = self.cancellations.clone();
        let task_id = params.id.clone();
        tokio::spawn(async move {
            // Ensures a cancellation flag raised mid-stream never outlives
            // this run, even if the loop below returns early.
            let _clear_on_drop = CancellationGuard { cancellations, task_id };

            let mut current = snapshot;
            let mut rx = rx;

            while let Some(update) = rx.recv().await {
                let touched_index;
                (current, touched_index) = merge(&current, &update);
                if let Err(e) = store.save(&current).await {
                    warn!(error = %e, "storage error mid-stream, ending stream without an extra frame");
                    return;
                }

                let frame = if let Some(index) = touched_index {
                    EngineFrame::Artifact {
                        task: current.task.clone(),
                        index,
                    }
                } else {
                    EngineFrame::Status {
                        task: current.task.clone(),
                        is_final: current.task.status.state.is_final_for_stream(),
                    }
                };

                let is_final = matches!(frame, EngineFrame::Status { is_final: true, .. });
                if out_tx.send(frame).is_err() {
                    return;
                }
                if is_final {
                    return;
                }
            }

            match handle.await {
                Ok(Ok(())) => {
                    if !current.task.status.state.is_final_for_stream() {
                        (current, _) = merge(
                            &current,
                            &TaskUpdate::Status(StatusUpdate {
                                state: TaskState::Completed,
                                message: None,
                            }),
                        );
                        if store.save(&current).await.is_ok() {
                            let _ = out_tx.send(EngineFrame::Status {
                                task: current.task,
                                is_final: true,
                            });
                        }
                    }
                }
                Ok(Err(handler_message)) => {
                    if !current.task.status.state.is_terminal() {
                        (current, _) = merge(
                            &current,
                            &TaskUpdate::Status(StatusUpdate {
                                state: TaskState::Failed,
                                message: Some(Message::agent_text(handler_message.clone())),
                            }),
                        );
                        if store.save(&current).await.is_ok() {
                            error!(task_id = %current.task.id, error = %handler_message, "handler failed mid-stream");
                            let _ = out_tx.send(EngineFrame::Status {
                                task: current.task,
                                is_final: true,
                            });
                        }
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "handler task panicked mid-stream");
                }
            }
        });

        Ok(out_rx)
    }

    /// `tasks/get`: load and return the task (history is never part of
    /// the response).
    pub async fn get(&self, task_id: &str) -> A2AResult<Task> {
        self.store
            .load(task_id)
            .await?
            .map(|snap| snap.task)
            .ok_or_else(|| A2AError::task_not_found(format!("no task with id {task_id:?}")))
    }

    /// `tasks/cancel`: no-op success on an already-terminal task;
    /// otherwise raises the cancellation flag (left for the running
    /// handler's own `send`/`send_subscribe` call to clear once its run
    /// ends, via `CancellationGuard`), forces `canceled`, and persists.
    pub async fn cancel(&self, task_id: &str) -> A2AResult<Task> {
        let snapshot = self
            .store
            .load(task_id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(format!("no task with id {task_id:?}")))?;

        if snapshot.task.status.state.is_terminal() {
            debug!(task_id = %task_id, "cancel of already-terminal task is a no-op");
            return Ok(snapshot.task);
        }

        self.cancellations
            .lock()
            .unwrap()
            .insert(task_id.to_string());

        let (next, _) = merge(
            &snapshot,
            &TaskUpdate::Status(StatusUpdate {
                state: TaskState::Canceled,
                message: Some(Message::agent_text("Task cancelled by request.")),
            }),
        );
        self.store.save(&next).await?;
        Ok(next.task)
    }
}
