//! Report — the sole persistent entity.
//!
//! A report pairs a short opaque identifier and a creation timestamp with the
//! normalized payload a client submitted. Only `data` ever changes after the
//! report is created.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

// ─── Identifier ──────────────────────────────────────────────────────────────

/// The external identifier and primary key of a [`Report`]. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportId(String);

impl ReportId {
  /// Wrap `s` as an identifier, rejecting the empty string.
  pub fn parse(s: impl Into<String>) -> Result<Self> {
    let s = s.into();
    if s.is_empty() {
      return Err(Error::EmptyId);
    }
    Ok(Self(s))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ReportId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for ReportId {
  fn as_ref(&self) -> &str { &self.0 }
}

impl TryFrom<String> for ReportId {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(s) }
}

impl From<ReportId> for String {
  fn from(id: ReportId) -> Self { id.0 }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// A persisted record representing one submitted payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
  pub id:   ReportId,
  /// Creation time. Stamped once by [`Report::new`]; updates keep it.
  pub time: DateTime<Utc>,
  /// The normalized payload; replaced wholesale on update.
  pub data: Value,
}

impl Report {
  /// Build a freshly created report, stamping the creation time.
  pub fn new(id: ReportId, data: Value) -> Self {
    Self { id, time: Utc::now(), data }
  }

  /// Return a copy of this report with `data` replaced. `id` and `time` are
  /// carried over untouched.
  pub fn with_data(self, data: Value) -> Self { Self { data, ..self } }

  /// Canonical JSON form, as returned to clients and forwarded to notifiers.
  pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }
}
