use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a [`crate::store::Store`] implementation
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection or pool loss; aborts the remaining work of a run
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A single statement failed; the current record is dropped
    #[error("store query failed: {0}")]
    Query(String),

    /// A transactional batch did not touch the rows it planned to
    #[error("store integrity check failed: {0}")]
    Integrity(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("failed to read csv {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{path} has no sheets")]
    NoSheets { path: PathBuf },
}

/// Why a file (or the whole run) stopped
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unrecognized filename: {0}")]
    UnrecognizedFilename(String),

    #[error(transparent)]
    Unreadable(#[from] SheetError),

    /// Records committed before the failure stay; `partial` counts them
    #[error("{error}")]
    StoreUnavailable {
        error: StoreError,
        partial: crate::import::ImportSummary,
    },
}

impl ImportError {
    /// Fatal-to-file errors skip the file; everything else stops the batch
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, ImportError::StoreUnavailable { .. })
    }

    /// Work done before a fatal-to-run error stopped the file
    pub fn partial_summary(&self) -> Option<&crate::import::ImportSummary> {
        match self {
            ImportError::StoreUnavailable { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("typo rule {from:?} -> {to:?} would re-trigger rule {other:?}")]
    UnstableTypo {
        from: String,
        to: String,
        other: String,
    },

    #[error("failed to read rules file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse rules file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{name} env var invalid: {value:?}")]
    Env { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("empty {0} name")]
    EmptyName(crate::model::EntityKind),

    #[error(transparent)]
    Store(#[from] StoreError),
}
