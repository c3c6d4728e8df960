//! Error taxonomy for the A2A task protocol server.
//!
//! Mirrors the JSON-RPC 2.0 error model: every error carries a numeric
//! code, a human-readable message, optional structured `data`, and
//! (when the dispatcher knew one at the moment of raise) the id of the
//! task it occurred in, for log correlation.

use serde_json::Value;
use thiserror::Error;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const TASK_NOT_FOUND: i64 = -32001;
pub const TASK_NOT_CANCELABLE: i64 = -32002;
pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i64 = -32003;
pub const UNSUPPORTED_OPERATION: i64 = -32004;
pub const AUTH_FAILED: i64 = -32099;

/// A typed A2A error. Implements `std::error::Error` via `thiserror` so it
/// composes with `?` throughout the engine and store layers.
#[derive(Debug, Error)]
pub enum A2AError {
    #[error("parse error: {message}")]
    ParseError {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },

    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },

    #[error("method not found: {message}")]
    MethodNotFound {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },

    #[error("invalid params: {message}")]
    InvalidParams {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },

    #[error("internal error: {message}")]
    InternalError {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },

    #[error("task not found: {message}")]
    TaskNotFound {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },

    #[error("task not cancelable: {message}")]
    TaskNotCancelable {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },

    #[error("push notification not supported: {message}")]
    PushNotificationNotSupported {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },

    #[error("unsupported operation: {message}")]
    UnsupportedOperation {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },

    #[error("auth failed: {message}")]
    AuthFailed {
        message: String,
        data: Option<Value>,
        task_id: Option<String>,
    },
}

impl A2AError {
    pub fn code(&self) -> i64 {
        match self {
            A2AError::ParseError { .. } => PARSE_ERROR,
            A2AError::InvalidRequest { .. } => INVALID_REQUEST,
            A2AError::MethodNotFound { .. } => METHOD_NOT_FOUND,
            A2AError::InvalidParams { .. } => INVALID_PARAMS,
            A2AError::InternalError { .. } => INTERNAL_ERROR,
            A2AError::TaskNotFound { .. } => TASK_NOT_FOUND,
            A2AError::TaskNotCancelable { .. } => TASK_NOT_CANCELABLE,
            A2AError::PushNotificationNotSupported { .. } => PUSH_NOTIFICATION_NOT_SUPPORTED,
            A2AError::UnsupportedOperation { .. } => UNSUPPORTED_OPERATION,
            A2AError::AuthFailed { .. } => AUTH_FAILED,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            A2AError::ParseError { message, .. }
            | A2AError::InvalidRequest { message, .. }
            | A2AError::MethodNotFound { message, .. }
            | A2AError::InvalidParams { message, .. }
            | A2AError::InternalError { message, .. }
            | A2AError::TaskNotFound { message, .. }
            | A2AError::TaskNotCancelable { message, .. }
            | A2AError::PushNotificationNotSupported { message, .. }
            | A2AError::UnsupportedOperation { message, .. }
            | A2AError::AuthFailed { message, .. } => message,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            A2AError::ParseError { data, .. }
            | A2AError::InvalidRequest { data, .. }
            | A2AError::MethodNotFound { data, .. }
            | A2AError::InvalidParams { data, .. }
            | A2AError::InternalError { data, .. }
            | A2AError::TaskNotFound { data, .. }
            | A2AError::TaskNotCancelable { data, .. }
            | A2AError::PushNotificationNotSupported { data, .. }
            | A2AError::UnsupportedOperation { data, .. }
            | A2AError::AuthFailed { data, .. } => data.as_ref(),
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            A2AError::ParseError { task_id, .. }
            | A2AError::InvalidRequest { task_id, .. }
            | A2AError::MethodNotFound { task_id, .. }
            | A2AError::InvalidParams { task_id, .. }
            | A2AError::InternalError { task_id, .. }
            | A2AError::TaskNotFound { task_id, .. }
            | A2AError::TaskNotCancelable { task_id, .. }
            | A2AError::PushNotificationNotSupported { task_id, .. }
            | A2AError::UnsupportedOperation { task_id, .. }
            | A2AError::AuthFailed { task_id, .. } => task_id.as_deref(),
        }
    }

    /// Attach a task id to this error for log correlation, if it doesn't
    /// already carry one.
    pub fn with_task_id(mut self, id: impl Into<String>) -> Self {
        let slot = match &mut self {
            A2AError::ParseError { task_id, .. }
            | A2AError::InvalidRequest { task_id, .. }
            | A2AError::MethodNotFound { task_id, .. }
            | A2AError::InvalidParams { task_id, .. }
            | A2AError::InternalError { task_id, .. }
            | A2AError::TaskNotFound { task_id, .. }
            | A2AError::TaskNotCancelable { task_id, .. }
            | A2AError::PushNotificationNotSupported { task_id, .. }
            | A2AError::UnsupportedOperation { task_id, .. }
            | A2AError::AuthFailed { task_id, .. } => task_id,
        };
        if slot.is_none() {
            *slot = Some(id.into());
        }
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        A2AError::InvalidParams {
            message: message.into(),
            data: None,
            task_id: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        A2AError::InvalidRequest {
            message: message.into(),
            data: None,
            task_id: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        A2AError::ParseError {
            message: message.into(),
            data: None,
            task_id: None,
        }
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        A2AError::MethodNotFound {
            message: message.into(),
            data: None,
            task_id: None,
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        A2AError::InternalError {
            message: message.into(),
            data: None,
            task_id: None,
        }
    }

    pub fn task_not_found(message: impl Into<String>) -> Self {
        A2AError::TaskNotFound {
            message: message.into(),
            data: None,
            task_id: None,
        }
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        A2AError::AuthFailed {
            message: message.into(),
            data: None,
            task_id: None,
        }
    }
}

impl From<serde_json::Error> for A2AError {
    fn from(e: serde_json::Error) -> Self {
        A2AError::parse_error(e.to_string())
    }
}

impl From<std::io::Error> for A2AError {
    fn from(e: std::io::Error) -> Self {
        A2AError::internal_error(e.to_string())
    }
}

pub type A2AResult<T> = Result<T, A2AError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_spec_table() {
        assert_eq!(A2AError::parse_error("x").code(), PARSE_ERROR);
        assert_eq!(A2AError::invalid_request("x").code(), INVALID_REQUEST);
        assert_eq!(A2AError::method_not_found("x").code(), METHOD_NOT_FOUND);
        assert_eq!(A2AError::invalid_params("x").code(), INVALID_PARAMS);
        assert_eq!(A2AError::internal_error("x").code(), INTERNAL_ERROR);
        assert_eq!(A2AError::task_not_found("x").code(), TASK_NOT_FOUND);
        assert_eq!(A2AError::auth_failed("x").code(), AUTH_FAILED);
    }

    #[test]
    fn with_task_id_only_sets_once() {
        let err = A2AError::internal_error("boom").with_task_id("t1");
        assert_eq!(err.task_id(), Some("t1"));
        let err = err.with_task_id("t2");
        assert_eq!(err.task_id(), Some("t1"));
    }
}
