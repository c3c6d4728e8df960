//! JSON-RPC dispatcher and HTTP wiring: envelope validation, method
//! routing to the four task operations, the well-known agent card
//! endpoint, and (optionally) the auth gate.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::auth::AuthGate;
use crate::engine::TaskEngine;
use crate::error::A2AError;
use crate::sse::frames_to_sse;
use crate::types::{
    AgentCard, CancelTaskParams, GetTaskParams, JsonRpcRequest, JsonRpcResponse, SendTaskParams,
};

pub struct AppState {
    pub engine: TaskEngine,
    pub agent_card: AgentCard,
    pub auth_gate: Option<AuthGate>,
}

/// `cors_allowed_origins`: `None` for the documented permissive
/// default, `Some(origins)` to restrict the CORS layer to exactly
/// those origins.
pub fn router(state: Arc<AppState>, cors_allowed_origins: Option<&[String]>) -> Router {
    Router::new()
        .route("/", post(handle_jsonrpc))
        .route("/.well-known/agent.json", get(agent_card))
        .layer(build_cors_layer(cors_allowed_origins))
        .with_state(state)
}

fn build_cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    match allowed_origins {
        None => CorsLayer::permissive(),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

async fn agent_card(State(state): State<Arc<AppState>>) -> Json<AgentCard> {
    Json(state.agent_card.clone())
}

fn error_response(id: Value, err: &A2AError) -> Response {
    let status = if err.code() == crate::error::AUTH_FAILED {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::OK
    };
    let body = JsonRpcResponse::error(id, err.code(), err.message().to_string(), err.data().cloned());
    (status, Json(body)).into_response()
}

async fn handle_jsonrpc(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    let raw = match body {
        Some(Json(v)) => v,
        None => {
            return error_response(Value::Null, &A2AError::parse_error("request body is not valid JSON"));
        }
    };

    let id = raw.get("id").cloned().unwrap_or(Value::Null);

    if let Some(gate) = &state.auth_gate {
        if let Err(err) = gate.check(&headers).await {
            return error_response(id, &err);
        }
    }

    match dispatch(&state, raw).await {
        Ok(DispatchOutcome::Unary(result)) => {
            Json(JsonRpcResponse::success(id, result)).into_response()
        }
        Ok(DispatchOutcome::Stream(rx)) => {
            Sse::new(frames_to_sse(id, rx))
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(err) => {
            error!(code = err.code(), message = %err.message(), task_id = err.task_id(), "request failed");
            error_response(id, &err)
        }
    }
}

enum DispatchOutcome {
    Unary(Value),
    Stream(tokio::sync::mpsc::UnboundedReceiver<crate::engine::EngineFrame>),
}

async fn dispatch(state: &AppState, raw: Value) -> Result<DispatchOutcome, A2AError> {
    let request: JsonRpcRequest = serde_json::from_value(raw)
        .map_err(|_| A2AError::invalid_request("malformed JSON-RPC envelope"))?;
    if request.jsonrpc != "2.0" {
        return Err(A2AError::invalid_request("jsonrpc must be \"2.0\""));
    }

    let params = request.params.unwrap_or(Value::Null);

    match request.method.as_str() {
        "tasks/send" => {
            let params: SendTaskParams = parse_params(params)?;
            let task = state.engine.send(params).await?;
            Ok(DispatchOutcome::Unary(serde_json::to_value(task)?))
        }
        "tasks/sendSubscribe" => {
            let params: SendTaskParams = parse_params(params)?;
            let rx = state.engine.send_subscribe(params).await?;
            Ok(DispatchOutcome::Stream(rx))
        }
        "tasks/get" => {
            let params: GetTaskParams = parse_params(params)?;
            let task = state.engine.get(&params.id).await?;
            Ok(DispatchOutcome::Unary(serde_json::to_value(task)?))
        }
        "tasks/cancel" => {
            let params: CancelTaskParams = parse_params(params)?;
            let task = state.engine.cancel(&params.id).await?;
            Ok(DispatchOutcome::Unary(serde_json::to_value(task)?))
        }
        other => Err(A2AError::method_not_found(format!("unknown method {other:?}"))),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, A2AError> {
    if params.is_null() {
        return Err(A2AError::invalid_params("params is required"));
    }
    serde_json::from_value(params).map_err(|e| A2AError::invalid_params(e.to_string()))
}
