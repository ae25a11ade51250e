//! Core types and trait definitions for the scrawl report service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store, notifier and API crates all depend on it.

pub mod error;
pub mod id;
pub mod normalize;
pub mod notify;
pub mod report;
pub mod store;

pub use error::{Error, Result};
pub use report::{Report, ReportId};
