//! [`ReportHandler`] — the report lifecycle, independent of HTTP routing.
//!
//! Each operation runs its steps strictly in order and makes at most one store
//! round trip for lookup and one for the write. Collaborators are injected at
//! construction, so tests can swap in fakes.

use std::sync::Arc;

use scrawl_core::{
  Report, ReportId,
  id::{IdGenerator, NanoidGenerator},
  normalize::{JsonNormalizer, Normalizer},
  notify::{Notifier, NotifyPolicy},
  store::ReportStore,
};

use crate::error::{ApiError, Operation};

/// A report together with the canonical JSON that was sent for it.
#[derive(Debug, Clone)]
pub struct Rendered {
  pub report: Report,
  pub json:   String,
}

/// Executes Create, Fetch and Update against a store, an id generator, a
/// payload normalizer and an optional notifier.
pub struct ReportHandler<S, N> {
  store:      Arc<S>,
  ids:        Arc<dyn IdGenerator>,
  normalizer: Arc<dyn Normalizer>,
  notifier:   Option<Arc<N>>,
  policy:     NotifyPolicy,
}

impl<S, N> ReportHandler<S, N>
where
  S: ReportStore,
  N: Notifier,
{
  /// A handler with default ids, JSON normalization and no notifier.
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      ids: Arc::new(NanoidGenerator::default()),
      normalizer: Arc::new(JsonNormalizer),
      notifier: None,
      policy: NotifyPolicy::default(),
    }
  }

  pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
    self.ids = ids;
    self
  }

  pub fn with_normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
    self.normalizer = normalizer;
    self
  }

  /// Forward every created report to `notifier`; `policy` decides whether a
  /// failed delivery aborts the creation.
  pub fn with_notifier(mut self, notifier: Arc<N>, policy: NotifyPolicy) -> Self {
    self.notifier = Some(notifier);
    self.policy = policy;
    self
  }

  // ── Create ──────────────────────────────────────────────────────────────

  /// Generate an id, normalize `body`, notify, then insert.
  ///
  /// Under [`NotifyPolicy::Required`] a failed notification returns before
  /// anything is stored.
  pub async fn create(&self, body: &[u8]) -> Result<Rendered, ApiError> {
    let op = Operation::Create;

    let id = self
      .ids
      .generate()
      .map_err(|source| ApiError::Generation { op, source })?;
    let report = Report::new(id, self.normalizer.normalize(body));
    let json = render_json(op, &report)?;

    if let Some(notifier) = &self.notifier
      && let Err(e) = notifier.notify(&json).await
    {
      match self.policy {
        NotifyPolicy::Required => {
          return Err(ApiError::Notify { op, id: report.id, source: Box::new(e) });
        }
        NotifyPolicy::BestEffort => {
          tracing::warn!(report_id = %report.id, error = %e, "notification failed, keeping report");
        }
      }
    }

    self
      .store
      .insert(&report)
      .await
      .map_err(|e| store_error(op, &report.id, e))?;

    tracing::info!(report_id = %report.id, bytes = body.len(), "report created");
    Ok(Rendered { report, json })
  }

  // ── Fetch ───────────────────────────────────────────────────────────────

  pub async fn fetch(&self, id: &ReportId) -> Result<Rendered, ApiError> {
    let op = Operation::Fetch;

    let report = self
      .store
      .find_by_id(id)
      .await
      .map_err(|e| store_error(op, id, e))?
      .ok_or(ApiError::NotFound)?;

    let json = render_json(op, &report)?;
    Ok(Rendered { report, json })
  }

  // ── Update ──────────────────────────────────────────────────────────────

  /// Replace the data of an existing report with the normalized `body`.
  ///
  /// Concurrent updates of one report are last-writer-wins.
  pub async fn update(&self, id: &ReportId, body: &[u8]) -> Result<Rendered, ApiError> {
    let op = Operation::Update;

    let existing = self
      .store
      .find_by_id(id)
      .await
      .map_err(|e| store_error(op, id, e))?
      .ok_or(ApiError::NotFound)?;

    let data = self.normalizer.normalize(body);
    let report = self
      .store
      .replace_data(&existing.id, &data)
      .await
      .map_err(|e| store_error(op, id, e))?
      .ok_or(ApiError::NotFound)?;

    tracing::info!(report_id = %report.id, bytes = body.len(), "report updated");
    let json = render_json(op, &report)?;
    Ok(Rendered { report, json })
  }
}

fn render_json(op: Operation, report: &Report) -> Result<String, ApiError> {
  report
    .to_json()
    .map_err(|source| ApiError::Serialize { op, id: report.id.clone(), source })
}

fn store_error<E>(op: Operation, id: &ReportId, e: E) -> ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  ApiError::Store { op, id: id.clone(), source: Box::new(e) }
}
