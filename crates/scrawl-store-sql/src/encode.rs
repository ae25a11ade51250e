//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQL columns.
//!
//! Timestamps are stored as RFC 3339 strings with nanosecond precision, so a
//! decoded value is identical to the one that was encoded. `data` is stored
//! as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use scrawl_core::{Report, ReportId};
use serde_json::Value;
use sqlx::{Row, any::AnyRow};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Data ────────────────────────────────────────────────────────────────────

pub fn encode_data(data: &Value) -> Result<String> { Ok(serde_json::to_string(data)?) }

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A `reports` row exactly as read from the database.
pub struct RawReport {
  pub id:   String,
  pub time: String,
  pub data: String,
}

impl RawReport {
  pub fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error> {
    Ok(Self {
      id:   row.try_get("id")?,
      time: row.try_get("time")?,
      data: row.try_get("data")?,
    })
  }

  pub fn into_report(self) -> Result<Report> {
    Ok(Report {
      id:   ReportId::parse(self.id)?,
      time: decode_dt(&self.time)?,
      data: serde_json::from_str(&self.data)?,
    })
  }
}
