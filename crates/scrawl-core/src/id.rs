//! Identifier generation for new reports.

use nanoid::alphabet::SAFE;
use rand_core::{OsRng, RngCore};

use crate::{Error, Result, report::ReportId};

/// Length of identifiers produced by [`NanoidGenerator::default`].
pub const ID_LEN: usize = 10;

/// Produces fresh, unique report identifiers.
pub trait IdGenerator: Send + Sync {
  fn generate(&self) -> Result<ReportId>;
}

/// Random, URL-safe identifiers drawn from the 64-symbol `[A-Za-z0-9_-]`
/// alphabet.
///
/// At the default length of 10 symbols there are 2^60 possible ids.
#[derive(Debug, Clone, Copy)]
pub struct NanoidGenerator {
  len: usize,
}

impl NanoidGenerator {
  pub fn new(len: usize) -> Self { Self { len } }
}

impl Default for NanoidGenerator {
  fn default() -> Self { Self::new(ID_LEN) }
}

impl IdGenerator for NanoidGenerator {
  fn generate(&self) -> Result<ReportId> {
    ReportId::parse(draw(&SAFE, self.len)?)
  }
}

/// Draw `len` symbols from `alphabet` using the OS entropy source.
///
/// Random bytes are masked down to the next power of two above the alphabet
/// size and out-of-range values are discarded, so every symbol is equally
/// likely. A failing entropy source is an error, never a panic.
fn draw(alphabet: &[char], len: usize) -> Result<String> {
  if len == 0 {
    return Err(Error::Generation("id length must be at least 1".into()));
  }
  if alphabet.is_empty() {
    return Err(Error::Generation("alphabet must not be empty".into()));
  }
  let mask = alphabet.len().next_power_of_two() - 1;
  let step = (8 * len / 5).max(1);
  let mut bytes = vec![0u8; step];
  let mut id = String::with_capacity(len);
  let mut drawn = 0;

  loop {
    OsRng
      .try_fill_bytes(&mut bytes)
      .map_err(|e| Error::Generation(format!("entropy source failed: {e}")))?;
    for &byte in &bytes {
      if let Some(&symbol) = alphabet.get(byte as usize & mask) {
        id.push(symbol);
        drawn += 1;
        if drawn == len {
          return Ok(id);
        }
      }
    }
  }
}
