//! The `ReportStore` trait.
//!
//! Implemented by storage backends (e.g. `scrawl-store-sql`). The API layer
//! depends on this abstraction, not on any concrete backend.

use std::future::Future;

use serde_json::Value;

use crate::report::{Report, ReportId};

/// Persistence for reports, keyed by [`ReportId`].
///
/// Every operation touches exactly one row; there are no range queries and no
/// cross-report transactions.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ReportStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a newly created report. Fails if a report with the same id
  /// already exists.
  fn insert<'a>(
    &'a self,
    report: &'a Report,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Retrieve a report by id. Returns `None` if not found.
  fn find_by_id<'a>(
    &'a self,
    id: &'a ReportId,
  ) -> impl Future<Output = Result<Option<Report>, Self::Error>> + Send + 'a;

  /// Replace the `data` of an existing report and return the stored result.
  /// `id` and `time` are left untouched. Returns `None` if no report has this
  /// id.
  fn replace_data<'a>(
    &'a self,
    id: &'a ReportId,
    data: &'a Value,
  ) -> impl Future<Output = Result<Option<Report>, Self::Error>> + Send + 'a;
}
