//! Handlers for `/v1/reports` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/v1/reports` | Body: raw payload; returns 201 + stored report |
//! | `GET`   | `/v1/reports/:id` | 404 if not found |
//! | `PATCH` | `/v1/reports/:id` | Body: raw payload; replaces `data`; 404 if not found |

use std::sync::Arc;

use axum::{
  extract::{FromRequest, FromRequestParts, Path, Request, State},
  http::{HeaderValue, StatusCode, header, request::Parts},
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use scrawl_core::{ReportId, notify::Notifier, store::ReportStore};

use crate::{error::ApiError, handler::ReportHandler};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

// ─── Extraction ──────────────────────────────────────────────────────────────

/// The complete request body. Any failure to read it (including exceeding the
/// body limit) is a 400.
pub struct RawBody(pub Bytes);

impl<St> FromRequest<St> for RawBody
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
    Bytes::from_request(req, state)
      .await
      .map(RawBody)
      .map_err(|e| ApiError::BadRequest(e.body_text()))
  }
}

/// The `{id}` path segment. An id that cannot name a report (empty, or not
/// valid UTF-8 once percent-decoded) is a 404.
pub struct ReportPath(pub ReportId);

impl<St> FromRequestParts<St> for ReportPath
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
    let Path(raw) = Path::<String>::from_request_parts(parts, state)
      .await
      .map_err(|e| {
        tracing::debug!(reason = %e.body_text(), "unusable report id");
        ApiError::NotFound
      })?;
    ReportId::parse(raw).map(ReportPath).map_err(|_| ApiError::NotFound)
  }
}

/// Status first, then headers, then body, as one response value.
fn json_response(status: StatusCode, json: String) -> Response {
  (
    status,
    [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
    json,
  )
    .into_response()
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /v1/reports`: returns 201 + the stored report.
pub async fn create<S, N>(
  State(handler): State<Arc<ReportHandler<S, N>>>,
  RawBody(body): RawBody,
) -> Result<Response, ApiError>
where
  S: ReportStore,
  N: Notifier,
{
  let rendered = handler.create(&body).await?;
  Ok(json_response(StatusCode::CREATED, rendered.json))
}

// ─── Fetch ───────────────────────────────────────────────────────────────────

/// `GET /v1/reports/:id`
pub async fn fetch<S, N>(
  State(handler): State<Arc<ReportHandler<S, N>>>,
  ReportPath(id): ReportPath,
) -> Result<Response, ApiError>
where
  S: ReportStore,
  N: Notifier,
{
  let rendered = handler.fetch(&id).await?;
  Ok(json_response(StatusCode::OK, rendered.json))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PATCH /v1/reports/:id`. The body replaces the report's `data`.
pub async fn update<S, N>(
  State(handler): State<Arc<ReportHandler<S, N>>>,
  ReportPath(id): ReportPath,
  RawBody(body): RawBody,
) -> Result<Response, ApiError>
where
  S: ReportStore,
  N: Notifier,
{
  let rendered = handler.update(&id, &body).await?;
  Ok(json_response(StatusCode::OK, rendered.json))
}

// ─── Fallback ────────────────────────────────────────────────────────────────

/// Anything else under `/v1/`.
pub async fn not_found() -> ApiError { ApiError::NotFound }
