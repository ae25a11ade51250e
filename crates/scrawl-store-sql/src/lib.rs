//! SQL backend for the scrawl report store.
//!
//! Wraps a bounded [`sqlx`] connection pool. The driver is picked from the
//! connection string at runtime: `postgres://…` in production, `sqlite:…`
//! for tests and single-node installs.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{PoolSettings, SqlStore};
