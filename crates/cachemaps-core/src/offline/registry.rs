use std::io;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::{debug, warn};

use crate::utils::display_name_from_file_name;

/// Extension of mapsforge map files.
pub const MAP_FILE_EXTENSION: &str = "map";

/// A map file found in the offline maps folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineMapCandidate {
    pub display_name: String,
    pub uri: Url,
}

/// Lists map files in the managed offline maps folder.
pub struct OfflineMapRegistry {
    dir: PathBuf,
}

impl OfflineMapRegistry {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map files in the folder, ordered by file name.
    ///
    /// Says nothing about whether the files can be opened.
    pub fn list_candidates(&self) -> Vec<OfflineMapCandidate> {
        let dir = match self.dir.canonicalize() {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "No offline maps folder");
                return Vec::new();
            }
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cannot resolve offline maps folder");
                return Vec::new();
            }
        };

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot list offline maps folder");
                return Vec::new();
            }
        };

        let mut maps: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_map_file(path))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                Some((name, path))
            })
            .collect();
        maps.sort_by(|a, b| a.0.cmp(&b.0));

        let candidates: Vec<OfflineMapCandidate> = maps
            .into_iter()
            .filter_map(|(name, path)| match Url::from_file_path(&path) {
                Ok(uri) => Some(OfflineMapCandidate {
                    display_name: display_name_from_file_name(&name),
                    uri,
                }),
                Err(()) => {
                    warn!(path = %path.display(), "Cannot build URI for map file");
                    None
                }
            })
            .collect();

        debug!(dir = %dir.display(), count = candidates.len(), "Listed offline maps");
        candidates
    }
}

fn is_map_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MAP_FILE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lists_map_files_sorted() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["rhine-valley.map", "alps.map", "notes.txt", "BAVARIA.MAP"] {
            std::fs::write(temp_dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(temp_dir.path().join("folder.map")).unwrap();

        let registry = OfflineMapRegistry::new(temp_dir.path().to_path_buf());
        let candidates = registry.list_candidates();

        let names: Vec<&str> = candidates.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, vec!["BAVARIA", "Alps", "Rhine Valley"]);
        assert!(candidates.iter().all(|c| c.uri.scheme() == "file"));
        assert!(candidates[2].uri.path().ends_with("/rhine-valley.map"));
    }

    #[test]
    fn test_missing_folder_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let registry = OfflineMapRegistry::new(temp_dir.path().join("nope"));
        assert!(registry.list_candidates().is_empty());
    }
}
