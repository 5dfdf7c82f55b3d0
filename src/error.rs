use std::path::PathBuf;

use thiserror::Error;

use crate::tree::RunReport;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal run errors. Per-file decrypt failures are not fatal and are
/// collected in [`crate::tree::RunReport`] instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("missing required input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("required tool `{tool}` is not available: {reason}")]
    Environment { tool: String, reason: String },

    #[error("key unwrap failed: {0:#}")]
    Kms(#[source] anyhow::Error),

    #[error("interrupted by signal")]
    Interrupted,

    /// Erasing the key failed. When this happens at the end of a run,
    /// `report` still carries what the run got through.
    #[error("secure erase of {} failed: {source}", path.display())]
    Erase {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        report: Option<RunReport>,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
