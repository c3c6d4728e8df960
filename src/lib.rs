//! # a2a-task-server — an Agent-to-Agent (A2A) task protocol server
//!
//! A server runtime for the A2A task protocol: clients submit
//! long-running "tasks" consisting of multi-part messages, and a
//! user-supplied [`engine::AgentExecutor`] streams back status
//! transitions and artifacts. The server validates JSON-RPC envelopes,
//! persists task state and conversation history, drives the handler
//! as a producer of incremental updates, streams those updates to
//! subscribers over Server-Sent Events, and supports cooperative
//! cancellation.
//!
//! ## Architecture
//!
//! - [`store`] — Task Store: persists `(Task, TaskHistory)` pairs,
//!   in-memory and on-disk.
//! - [`error`] — Error Taxonomy: JSON-RPC error codes and messages.
//! - [`merge`] — Update Merger: the pure status/artifact merge
//!   algorithm.
//! - [`engine`] — Task Engine: load-or-create, handler iteration,
//!   cancellation.
//! - [`dispatch`] — JSON-RPC Dispatcher and axum router.
//! - [`sse`] — SSE Streamer: engine frames to wire events.
//! - [`auth`] — optional Auth Gate.
//! - [`config`] — environment-sourced server configuration.
//! - [`builders`] — ergonomic [`builders::AgentCardBuilder`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_task_server::builders::AgentCardBuilder;
//! use a2a_task_server::dispatch::{router, AppState};
//! use a2a_task_server::engine::{AgentExecutor, RequestContext, TaskEngine, UpdateEmitter};
//! use a2a_task_server::store::InMemoryTaskStore;
//! use a2a_task_server::types::{Message, StatusUpdate, TaskState, TaskUpdate};
//! use async_trait::async_trait;
//!
//! struct EchoAgent;
//!
//! #[async_trait]
//! impl AgentExecutor for EchoAgent {
//!     async fn execute(&self, ctx: RequestContext, emit: UpdateEmitter) -> Result<(), String> {
//!         let text = ctx.message.parts.iter().filter_map(|p| p.as_text()).collect::<Vec<_>>().join("\n");
//!         emit.emit(TaskUpdate::Status(StatusUpdate {
//!             state: TaskState::Completed,
//!             message: Some(Message::agent_text(format!("Echo: {text}"))),
//!         }));
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryTaskStore::new());
//!     let engine = TaskEngine::new(store, Arc::new(EchoAgent));
//!     let agent_card = AgentCardBuilder::new("Echo Agent").url("http://localhost:41241/").build()?;
//!     let state = Arc::new(AppState { engine, agent_card, auth_gate: None });
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:41241").await?;
//!     axum::serve(listener, router(state, None)).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod builders;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod merge;
pub mod sse;
pub mod store;
pub mod types;

/// Re-exports of the most commonly used types and traits.
pub mod prelude {
    pub use crate::builders::AgentCardBuilder;
    pub use crate::config::ServerConfig;
    pub use crate::dispatch::{router, AppState};
    pub use crate::engine::{AgentExecutor, RequestContext, TaskEngine, UpdateEmitter};
    pub use crate::error::{A2AError, A2AResult};
    pub use crate::store::{InMemoryTaskStore, TaskStore};
    pub use crate::types::{
        AgentCard, Artifact, Message, Part, Role, Task, TaskHistory, TaskState, TaskUpdate,
    };
}
