use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::TILE_LEVELS;

/// Smallest response accepted as a real map image.
///
/// The static map service answers areas without imagery with a small
/// placeholder graphic instead of an error. Real tiles at the sizes we
/// request start around 6 KB. This is provider specific and needs
/// recalibrating if the endpoint changes.
pub const MIN_TILE_BYTES: u64 = 6000;

/// Filename prefix shared by every level.
const MAP_FILE_PREFIX: &str = "map_";

/// Suffix of the uniquely named files a download is written to.
const TEMP_SUFFIX: &str = ".tmp";

/// Result of writing a downloaded map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Stored with this many bytes.
    Stored(u64),
    /// The service sent a placeholder; nothing kept on disk.
    TooSmall(u64),
}

pub struct MapFileStore {
    root: PathBuf,
}

impl MapFileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn subject_dir(&self, geocode: &str) -> Result<PathBuf, StoreError> {
        let usable = !geocode.is_empty()
            && geocode != "."
            && geocode != ".."
            && !geocode.contains(['/', '\\']);
        if !usable {
            return Err(StoreError::InvalidGeocode(geocode.to_string()));
        }
        Ok(self.root.join(geocode))
    }

    fn file_name(prefix: &str, level: u8) -> String {
        format!("{}{}{}", MAP_FILE_PREFIX, prefix, level)
    }

    /// Path of one level's map, optionally creating the subject directory.
    ///
    /// Blocks on the filesystem. Async callers use `prepare_path`.
    pub fn resolve_path(
        &self,
        geocode: &str,
        prefix: &str,
        level: u8,
        create_dirs: bool,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.subject_dir(geocode)?;
        if create_dirs {
            std::fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(dir.join(Self::file_name(prefix, level)))
    }

    /// Path of one level's map, creating the subject directory.
    pub async fn prepare_path(
        &self,
        geocode: &str,
        prefix: &str,
        level: u8,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.subject_dir(geocode)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        Ok(dir.join(Self::file_name(prefix, level)))
    }

    /// Write a downloaded map to `path`.
    ///
    /// Each call streams into its own temporary file next to `path` and
    /// renames it into place, so readers never see a partial map and
    /// concurrent writers of the same level never share a file. A body under
    /// `MIN_TILE_BYTES` removes the temporary file and any older map at
    /// `path`. The temporary file is also removed if the write is abandoned.
    pub async fn write<R>(&self, path: &Path, mut body: R) -> Result<WriteOutcome, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let io_error = |source: io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let (file, temp) = create_temp_file(path).map_err(io_error)?;
        let mut file = tokio::fs::File::from_std(file);
        let written = async {
            let written = tokio::io::copy(&mut body, &mut file).await?;
            file.flush().await?;
            Ok::<u64, io::Error>(written)
        }
        .await
        .map_err(io_error)?;
        drop(file);

        if written < MIN_TILE_BYTES {
            debug!(path = %path.display(), bytes = written, "Map below size threshold, discarding");
            drop(temp);
            remove_if_present(path).await;
            return Ok(WriteOutcome::TooSmall(written));
        }

        temp.persist(path).map_err(|e| io_error(e.error))?;
        Ok(WriteOutcome::Stored(written))
    }

    /// Delete every level for a subject. Returns how many maps were removed.
    pub fn delete_all(&self, geocode: &str, prefix: &str) -> usize {
        let mut removed = 0;
        for level in TILE_LEVELS {
            let path = match self.resolve_path(geocode, prefix, level.level, false) {
                Ok(path) => path,
                Err(e) => {
                    warn!(geocode = geocode, error = %e, "Cannot resolve maps to delete");
                    return removed;
                }
            };

            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete map"),
            }
        }
        if let Ok(dir) = self.subject_dir(geocode) {
            remove_temp_files(&dir, prefix);
        }
        debug!(geocode = geocode, prefix = prefix, removed = removed, "Deleted maps");
        removed
    }

    /// Whether any level exists for a subject.
    pub fn exists_any(&self, geocode: &str, prefix: &str) -> bool {
        TILE_LEVELS.iter().any(|level| {
            self.resolve_path(geocode, prefix, level.level, false)
                .map(|path| path.is_file())
                .unwrap_or(false)
        })
    }
}

/// Prefix of the temporary files written for the map at `file_name`.
fn temp_prefix(file_name: &str) -> String {
    format!(".{}.", file_name)
}

/// Open a uniquely named temporary file beside `path`.
fn create_temp_file(path: &Path) -> io::Result<(std::fs::File, TempPath)> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "map path has no directory"))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "map path has no file name"))?;
    let prefix = temp_prefix(file_name);

    let temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    Ok(temp.into_parts())
}

/// Remove leftovers of interrupted downloads for one subject's levels.
fn remove_temp_files(dir: &Path, prefix: &str) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let prefixes: Vec<String> = TILE_LEVELS
        .iter()
        .map(|level| temp_prefix(&MapFileStore::file_name(prefix, level.level)))
        .collect();

    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.ends_with(TEMP_SUFFIX) && prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove partial map");
            }
        }
    }
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove map file"),
    }
}

// ============================================================================
// Tests
// ============================================================================
