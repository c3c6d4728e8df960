//! Entry point: wires configuration, a task store, the agent
//! executor, the router, and serves over HTTP until a shutdown signal.

use std::sync::Arc;

use a2a_task_server::auth::{AuthGate, Ed25519Verifier};
use a2a_task_server::builders::AgentCardBuilder;
use a2a_task_server::config::{ServerConfig, StoreBackend};
use a2a_task_server::dispatch::{router, AppState};
use a2a_task_server::engine::TaskEngine;
use a2a_task_server::store::{DiskTaskStore, InMemoryTaskStore, TaskStore};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %e, "fatal startup failure");
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), String> {
    let store: Arc<dyn TaskStore> = match config.store {
        StoreBackend::Memory => Arc::new(InMemoryTaskStore::new()),
        StoreBackend::Disk => Arc::new(
            DiskTaskStore::new(&config.store_dir)
                .await
                .map_err(|e| format!("failed to open disk store at {:?}: {e}", config.store_dir))?,
        ),
    };

    // A real deployment supplies its own AgentExecutor; this binary
    // wires an echo agent purely so the service is runnable out of the
    // box for local smoke-testing.
    let executor = Arc::new(echo_agent::EchoAgent);
    let engine = TaskEngine::new(store, executor);

    let agent_card = AgentCardBuilder::new("A2A Task Server")
        .description("Reference A2A task protocol server")
        .version(env!("CARGO_PKG_VERSION"))
        .url(format!("http://{}:{}/", config.bind_addr, config.port))
        .streaming(true)
        .build()
        .map_err(|e| format!("failed to build agent card: {e}"))?;

    let auth_gate = if config.auth_enabled {
        Some(AuthGate::new(Box::new(Ed25519Verifier)))
    } else {
        None
    };

    let state = Arc::new(AppState {
        engine,
        agent_card,
        auth_gate,
    });

    let app = router(state, config.cors_allowed_origins.as_deref());

    let addr = std::net::SocketAddr::new(config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;

    info!(%addr, "a2a task server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server error: {e}"))?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

mod echo_agent {
    use a2a_task_server::engine::{AgentExecutor, RequestContext, UpdateEmitter};
    use a2a_task_server::types::{StatusUpdate, TaskState, TaskUpdate};
    use async_trait::async_trait;

    pub struct EchoAgent;

    #[async_trait]
    impl AgentExecutor for EchoAgent {
        async fn execute(&self, ctx: RequestContext, emit: UpdateEmitter) -> Result<(), String> {
            let text = ctx
                .message
                .parts
                .iter()
                .filter_map(|p| p.as_text())
                .collect::<Vec<_>>()
                .join("\n");

            emit.emit(TaskUpdate::Status(StatusUpdate {
                state: TaskState::Completed,
                message: Some(a2a_task_server::types::Message::agent_text(format!(
                    "Echo: {text}"
                ))),
            }));
            Ok(())
        }
    }
}
