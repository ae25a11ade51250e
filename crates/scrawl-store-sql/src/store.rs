//! [`SqlStore`] — the pooled SQL implementation of [`ReportStore`].

use std::time::Duration;

use scrawl_core::{Report, ReportId, store::ReportStore};
use serde_json::Value;
use sqlx::{
  AnyPool,
  any::{AnyPoolOptions, install_default_drivers},
};

use crate::{
  Error, Result,
  encode::{RawReport, encode_data, encode_dt},
  schema::SCHEMA,
};

const INITIAL_RETRY_DELAY_SECS: u64 = 2;
const MAX_RETRY_DELAY_SECS: u64 = 30;

// ─── Settings ────────────────────────────────────────────────────────────────

/// Bounds for the connection pool and the startup connection loop.
#[derive(Debug, Clone)]
pub struct PoolSettings {
  pub max_connections:  u32,
  pub acquire_timeout:  Duration,
  /// How many times to try reaching the database before giving up.
  pub connect_attempts: u32,
}

impl Default for PoolSettings {
  fn default() -> Self {
    Self {
      max_connections:  10,
      acquire_timeout:  Duration::from_secs(30),
      connect_attempts: 10,
    }
  }
}

/// Delay before retry number `attempt` (1-based): 2s, 4s, 8s, 16s, then 30s.
pub(crate) fn backoff(attempt: u32) -> Duration {
  let shift = attempt.saturating_sub(1).min(16);
  Duration::from_secs((INITIAL_RETRY_DELAY_SECS << shift).min(MAX_RETRY_DELAY_SECS))
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A report store backed by a bounded SQL connection pool.
///
/// Cloning is cheap, the inner pool is reference-counted. Each operation
/// holds a pooled connection for a single statement only.
#[derive(Clone)]
pub struct SqlStore {
  pool: AnyPool,
}

impl SqlStore {
  /// Connect to `url`, retrying with exponential backoff, then run schema
  /// initialisation.
  pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self> {
    install_default_drivers();

    let mut attempt = 1;
    let pool = loop {
      let result = AnyPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(url)
        .await;

      match result {
        Ok(pool) => break pool,
        Err(e) if attempt < settings.connect_attempts => {
          let delay = backoff(attempt);
          tracing::warn!(
            attempt,
            max_attempts = settings.connect_attempts,
            error = %e,
            "database connection failed, retrying in {}s",
            delay.as_secs()
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(e) => return Err(e.into()),
      }
    };
    tracing::info!(attempt, "database connection pool established");

    let store = Self { pool };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory SQLite store for tests.
  ///
  /// The pool is pinned to one connection that never expires, since every
  /// SQLite in-memory connection is its own database.
  pub async fn open_in_memory() -> Result<Self> {
    install_default_drivers();

    let pool = AnyPoolOptions::new()
      .max_connections(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .connect("sqlite::memory:")
      .await?;
    let store = Self { pool };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    sqlx::query(SCHEMA).execute(&self.pool).await?;
    Ok(())
  }

  /// Wait for in-flight operations to finish and close every connection.
  pub async fn close(&self) { self.pool.close().await }
}

// ─── ReportStore impl ────────────────────────────────────────────────────────

impl ReportStore for SqlStore {
  type Error = Error;

  async fn insert(&self, report: &Report) -> Result<()> {
    let time = encode_dt(report.time);
    let data = encode_data(&report.data)?;

    let result = sqlx::query("INSERT INTO reports (id, time, data) VALUES ($1, $2, $3)")
      .bind(report.id.as_str())
      .bind(time)
      .bind(data)
      .execute(&self.pool)
      .await;

    match result {
      Ok(_) => Ok(()),
      Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
        Err(Error::DuplicateKey(report.id.clone()))
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn find_by_id(&self, id: &ReportId) -> Result<Option<Report>> {
    let raw = sqlx::query("SELECT id, time, data FROM reports WHERE id = $1")
      .bind(id.as_str())
      .fetch_optional(&self.pool)
      .await?
      .map(|row| RawReport::from_row(&row))
      .transpose()?;

    raw.map(RawReport::into_report).transpose()
  }

  async fn replace_data(&self, id: &ReportId, data: &Value) -> Result<Option<Report>> {
    let data = encode_data(data)?;

    let raw = sqlx::query("UPDATE reports SET data = $1 WHERE id = $2 RETURNING id, time, data")
      .bind(data)
      .bind(id.as_str())
      .fetch_optional(&self.pool)
      .await?
      .map(|row| RawReport::from_row(&row))
      .transpose()?;

    raw.map(RawReport::into_report).transpose()
  }
}
