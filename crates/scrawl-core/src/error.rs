//! Error types for `scrawl-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("report id must not be empty")]
  EmptyId,

  #[error("id generation failed: {0}")]
  Generation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
