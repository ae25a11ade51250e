//! Error type for `scrawl-store-sql`.

use scrawl_core::ReportId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] scrawl_core::Error),

  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// An insert collided with an existing report id.
  #[error("report {0} already exists")]
  DuplicateKey(ReportId),
}

impl Error {
  pub fn is_duplicate_key(&self) -> bool { matches!(self, Self::DuplicateKey(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
