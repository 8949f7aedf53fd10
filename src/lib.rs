//! Zoonotic-disease record loader backed by SQLite.
//!
//! # Intention
//!
//! - Load the zoonotic-disease CSV into a SQLite table, replacing what was there.
//! - Offer a small storage accessor for whole-table reads and single-column
//!   updates and deletes keyed on one column.
//!
//! # Architectural Boundaries
//!
//! - `sqlite` owns every statement sent to the database.
//! - `csv_source` only turns files into record sets.
//! - `pipeline` sequences the demonstration run and never touches SQL.

pub mod csv_source;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod sqlite;

pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, StepStatus};
pub use record::{RecordSet, Row, Value};
pub use sqlite::{Database, InsertOutcome, SqliteConfig, WriteOutcome};
