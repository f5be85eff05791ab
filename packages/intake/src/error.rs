//! Intake error taxonomy and its HTTP mapping
//!
//! Every failure is converted into a JSON body of the form
//! `{ "error": string, "details"?: string, "status"?: number }` at the
//! handler boundary. Internal causes are logged, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the submit-form endpoint
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Invalid JSON body")]
    InvalidBody,

    #[error("Email is required")]
    EmailRequired,

    #[error("Comment too long (max {max} characters)")]
    CommentTooLong { max: usize, len: usize },

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Notion token is not configured (set NOTION_API)")]
    MissingToken,

    /// The record store answered with a non-2xx status
    #[error("Failed to save to Notion database")]
    Upstream { status: u16, details: String },

    #[error("Upstream timeout")]
    UpstreamTimeout,

    /// Unexpected failure; the cause is kept for logs only
    #[error("Server error")]
    Internal(String),
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntakeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody | Self::EmailRequired | Self::CommentTooLong { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::MissingToken | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the `outcome` dimension of the submissions counter
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidBody | Self::EmailRequired | Self::CommentTooLong { .. } => "invalid",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::MissingToken => "misconfigured",
            Self::Upstream { .. } => "rejected_upstream",
            Self::UpstreamTimeout => "timeout",
            Self::Internal(_) => "error",
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Upstream { status, details } => ErrorBody {
                error: self.to_string(),
                status: Some(*status),
                details: Some(details.clone()),
            },
            _ => ErrorBody {
                error: self.to_string(),
                status: None,
                details: None,
            },
        }
    }
}

impl From<StoreError> for IntakeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected { status, details } => Self::Upstream { status, details },
            StoreError::Timeout { .. } => Self::UpstreamTimeout,
            StoreError::Transport(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}
