use dashmap::DashMap;
use reqwest::Url;
use tracing::{debug, info};

use super::header::{MapFileInfo, MapHeaderReader, MapsforgeHeaderReader};
use crate::error::MapFileError;

/// Attribution reported for a valid map that declares none.
pub const NO_ATTRIBUTION: &str = "No attribution provided";

/// Cached outcome of opening a map file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid { attribution: String },
    Invalid,
}

/// Answer to `MapValidityCache::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapValidity {
    pub valid: bool,
    pub attribution: Option<String>,
}

impl From<&Verdict> for MapValidity {
    fn from(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Valid { attribution } => MapValidity {
                valid: true,
                attribution: Some(attribution.clone()),
            },
            Verdict::Invalid => MapValidity {
                valid: false,
                attribution: None,
            },
        }
    }
}

/// URI-keyed memo of which map files open and what they credit.
///
/// Verdicts never expire on their own. Construct one per process and share
/// it behind an `Arc`.
pub struct MapValidityCache {
    reader: Box<dyn MapHeaderReader>,
    verdicts: DashMap<Url, Verdict>,
}

impl Default for MapValidityCache {
    fn default() -> Self {
        Self::with_reader(MapsforgeHeaderReader)
    }
}

impl MapValidityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reader(reader: impl MapHeaderReader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            verdicts: DashMap::new(),
        }
    }

    /// Validity and attribution of a map, parsing it only on a cache miss.
    pub fn validate(&self, uri: &Url) -> MapValidity {
        if let Some(verdict) = self.verdicts.get(uri) {
            return MapValidity::from(verdict.value());
        }

        let verdict = match self.reader.read_header(uri) {
            Ok(info) => {
                let attribution = info.attribution().unwrap_or(NO_ATTRIBUTION).to_string();
                debug!(uri = %uri, attribution = %attribution, "Offline map is valid");
                Verdict::Valid { attribution }
            }
            Err(e) => {
                info!(uri = %uri, error = %e, "Offline map rejected");
                Verdict::Invalid
            }
        };

        // A concurrent validation may have won; keep its verdict.
        let entry = self.verdicts.entry(uri.clone()).or_insert(verdict);
        MapValidity::from(entry.value())
    }

    /// Forget the verdict for a map so the next `validate` parses it again.
    ///
    /// Returns whether a verdict was cached.
    pub fn invalidate(&self, uri: &Url) -> bool {
        let removed = self.verdicts.remove(uri).is_some();
        if removed {
            debug!(uri = %uri, "Offline map verdict invalidated");
        }
        removed
    }

    /// Open a map for use, bypassing the cache.
    pub fn open(&self, uri: &Url) -> Result<MapFileInfo, MapFileError> {
        self.reader.read_header(uri)
    }

    /// The cached verdict, without parsing.
    pub fn verdict(&self, uri: &Url) -> Option<Verdict> {
        self.verdicts.get(uri).map(|v| v.value().clone())
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
