//! Core types and algorithms for the WAStD curation store.
//!
//! This crate is free of HTTP and database dependencies.
//! It owns the QA state machine, the tag-based identity closure, the nest
//! success figures and the survey reconciliation plan; storage backends
//! implement [`store::RecordStore`] on top of it.

pub mod encounter;
pub mod error;
pub mod geo;
pub mod identity;
pub mod nest;
pub mod observation;
pub mod qa;
pub mod store;
pub mod survey;

pub use error::{Error, Result};
