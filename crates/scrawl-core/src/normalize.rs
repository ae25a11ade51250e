//! Payload normalization — raw request bytes to the stored `data` value.
//!
//! Every normalizer accepts any byte sequence (including empty input), is
//! deterministic, and is idempotent: feeding the canonical JSON of a
//! normalized value back in yields the same value.

use std::{collections::HashSet, sync::Arc};

use serde::Deserialize;
use serde_json::Value;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Converts a raw submitted payload into the canonical `data` of a report.
pub trait Normalizer: Send + Sync {
  fn normalize(&self, raw: &[u8]) -> Value;
}

/// Selects a [`Normalizer`] by name in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizerKind {
  #[default]
  Json,
  Lines,
}

impl NormalizerKind {
  pub fn build(self) -> Arc<dyn Normalizer> {
    match self {
      NormalizerKind::Json => Arc::new(JsonNormalizer),
      NormalizerKind::Lines => Arc::new(LineListNormalizer),
    }
  }
}

fn strip_bom(raw: &[u8]) -> &[u8] { raw.strip_prefix(BOM).unwrap_or(raw) }

// ─── JSON ────────────────────────────────────────────────────────────────────

/// Keeps well-formed JSON as-is and stores anything else as tidied text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonNormalizer;

impl Normalizer for JsonNormalizer {
  fn normalize(&self, raw: &[u8]) -> Value {
    let raw = strip_bom(raw);
    match serde_json::from_slice::<Value>(raw) {
      Ok(value) => value,
      Err(_) => Value::String(tidy_text(&String::from_utf8_lossy(raw))),
    }
  }
}

/// Fold line endings to `\n`, drop trailing whitespace on every line and
/// surrounding whitespace overall.
fn tidy_text(text: &str) -> String {
  let unified = text.replace("\r\n", "\n").replace('\r', "\n");
  unified
    .split('\n')
    .map(str::trim_end)
    .collect::<Vec<_>>()
    .join("\n")
    .trim()
    .to_owned()
}

// ─── Line lists ──────────────────────────────────────────────────────────────

/// Turns a pasted list (one entry per line) into a JSON array of distinct,
/// trimmed, non-empty entries in first-seen order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineListNormalizer;

impl Normalizer for LineListNormalizer {
  fn normalize(&self, raw: &[u8]) -> Value {
    let raw = strip_bom(raw);
    let entries: Vec<String> = match serde_json::from_slice::<Vec<String>>(raw) {
      Ok(entries) => entries,
      Err(_) => String::from_utf8_lossy(raw)
        .split(['\n', '\r'])
        .map(str::to_owned)
        .collect(),
    };

    let mut seen = HashSet::new();
    let list = entries
      .iter()
      .map(|e| e.trim())
      .filter(|e| !e.is_empty())
      .filter(|e| seen.insert(e.to_string()))
      .map(|e| Value::String(e.to_owned()))
      .collect();
    Value::Array(list)
  }
}
