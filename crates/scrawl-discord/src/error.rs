//! Error type for `scrawl-discord`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("discord request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("discord rejected the message: status={status} body={body}")]
  Rejected { status: u16, body: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
