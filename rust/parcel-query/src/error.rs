use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("only SELECT statements may be executed")]
    SqlNotSelect { sql: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("query execution failed: {message}")]
    Execution { message: String, sql: String },

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) | ServiceError::SqlNotSelect { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ServiceError::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// SQL to echo back to the caller, when the failure happened after one was produced.
    pub fn sql(&self) -> Option<&str> {
        match self {
            ServiceError::SqlNotSelect { sql } | ServiceError::Execution { sql, .. } => {
                Some(sql.as_str())
            }
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            ServiceError::SqlNotSelect { .. } => Some("SQL_NOT_SELECT"),
            ServiceError::Execution { .. } => Some("EXECUTION_FAILED"),
            ServiceError::Timeout(_) => Some("REQUEST_TIMEOUT"),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, sql = self.sql(), "request failed");
        }

        let body = ErrorBody {
            error: self.to_string(),
            sql: self.sql(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
