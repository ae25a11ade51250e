//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Clients only ever see a bare status code. Internal failures are logged here,
//! once, with the operation and report id that produced them.

use std::fmt;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use scrawl_core::ReportId;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The report operation an error arose in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Create,
  Fetch,
  Update,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Operation::Create => "create",
      Operation::Fetch => "fetch",
      Operation::Update => "update",
    })
  }
}

/// An error returned by a report operation.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found")]
  NotFound,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("{op}: id generation failed: {source}")]
  Generation {
    op:     Operation,
    source: scrawl_core::Error,
  },

  #[error("{op} {id}: serialization failed: {source}")]
  Serialize {
    op:     Operation,
    id:     ReportId,
    source: scrawl_core::Error,
  },

  #[error("{op} {id}: store error: {source}")]
  Store {
    op:     Operation,
    id:     ReportId,
    source: BoxError,
  },

  #[error("{op} {id}: notification failed: {source}")]
  Notify {
    op:     Operation,
    id:     ReportId,
    source: BoxError,
  },
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    match &self {
      ApiError::NotFound => {}
      ApiError::BadRequest(reason) => tracing::debug!(%reason, "rejected request"),
      _ => tracing::error!(error = %self, "request failed"),
    }
    status.into_response()
  }
}
