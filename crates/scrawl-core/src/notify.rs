//! Outbound notification of newly created reports.

use std::future::Future;

use serde::Deserialize;

/// Forwards the canonical JSON of a newly created report to an external
/// channel.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn notify<'a>(
    &'a self,
    report_json: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// What a failed notification means for the report being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
  /// The failure aborts creation; nothing is stored.
  #[default]
  Required,
  /// The failure is logged and creation proceeds.
  BestEffort,
}

impl NotifyPolicy {
  pub fn from_required(required: bool) -> Self {
    if required { Self::Required } else { Self::BestEffort }
  }
}
