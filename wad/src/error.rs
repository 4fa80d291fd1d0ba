use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WadError>;

/// Everything that can stop a load, save or commit from completing.
///
/// Recoverable problems found while loading (bad directory entries, stray
/// namespace markers) are not errors, they are collected on the `Wad` as
/// [`crate::FailedReadEntry`] and [`crate::NamespaceWarning`].
#[derive(Debug, Error)]
pub enum WadError {
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("bad WAD header: {0}")]
    BadHeader(String),

    #[error("bad WAD directory: {0}")]
    BadDirectory(String),

    #[error("{0:?} was opened read-only")]
    ReadOnly(PathBuf),

    #[error("WAD has no file path to save to")]
    NoPath,

    #[error("WAD is too large for the format ({0} bytes)")]
    TooLarge(u64),

    #[error("atomic writer for {0:?} is not open")]
    NotOpen(PathBuf),

    #[error("failed writing after several attempts: {0:?}")]
    Collision(PathBuf),

    #[error("could not move {target:?} aside to {backup:?}: {source}")]
    Backup {
        target: PathBuf,
        backup: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not replace {target:?} with {pending:?}: {source}")]
    Replace {
        target: PathBuf,
        pending: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WadError::Io {
            path: path.into(),
            source,
        }
    }
}
