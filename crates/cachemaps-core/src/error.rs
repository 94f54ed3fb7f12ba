//! Error types shared across the tile pipeline and the offline map cache.
//!
//! None of these abort the host: the downloader and the validity cache log
//! them and surface the failure as a missing file or an invalid source.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::api::FetchError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Geocode cannot be used as a directory name: {0:?}")]
    InvalidGeocode(String),

    #[error("Failed to create map directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write map file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Tile queue stayed full for {0:?}, job dropped")]
    Timeout(std::time::Duration),

    #[error("Tile worker has stopped")]
    Closed,
}

#[derive(Error, Debug)]
pub enum MapFileError {
    #[error("Only file URIs can be opened: {0}")]
    UnsupportedUri(String),

    #[error("Failed to read map file: {0}")]
    Io(#[from] io::Error),

    #[error("Not a mapsforge map file")]
    BadMagic,

    #[error("Header size {0} out of range")]
    InvalidHeaderSize(u32),

    #[error("Unsupported map file version {0}")]
    UnsupportedVersion(u32),

    #[error("Header declares {declared} bytes but file has {actual}")]
    FileSizeMismatch { declared: u64, actual: u64 },

    #[error("Invalid bounding box")]
    InvalidBoundingBox,

    #[error("Unsupported projection {0:?}")]
    UnsupportedProjection(String),

    #[error("Invalid header string: {0}")]
    InvalidString(String),

    #[error("Invalid zoom interval configuration: {0}")]
    InvalidZoomIntervals(String),
}

/// Failure to produce one level of a subject's maps.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DownloadError {
    /// Whether the remaining levels of the same subject are pointless.
    pub fn aborts_subject(&self) -> bool {
        matches!(
            self,
            DownloadError::Store(StoreError::CreateDir { .. } | StoreError::InvalidGeocode(_))
        )
    }
}
