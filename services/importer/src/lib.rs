//! Admission cutoff importer
//!
//! Decodes spreadsheets whose columns encode institution -> program ->
//! category -> quota -> rank vertically, and merges the flattened records
//! into a store without ever duplicating a natural key.

pub mod classify;
pub mod config;
pub mod error;
pub mod filename;
pub mod header;
pub mod hierarchy;
pub mod import;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod resolve;
pub mod sheet;
pub mod store;

pub use config::{Config, ImportRules};
pub use error::{ImportError, StoreError};
pub use import::{BatchReport, FileOutcome, ImportSummary, Importer};
pub use merge::{DedupReport, MergeEngine};
pub use model::{CandidateRecord, CutoffRecord, ImportContext, NaturalKey};
pub use store::{MemoryStore, PgStore, Store};
