use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::header::MapFileInfo;
use super::registry::{OfflineMapCandidate, OfflineMapRegistry};
use super::validity::MapValidityCache;

/// Name under which the combined source is offered.
pub const COMPOSITE_SOURCE_NAME: &str = "All offline maps";

/// A map file that opened for rendering.
#[derive(Debug, Clone)]
pub struct OpenedMap {
    pub candidate: OfflineMapCandidate,
    pub info: MapFileInfo,
}

/// The maps a source hands to the renderer, in member order.
#[derive(Debug, Clone, Default)]
pub struct MapLayer {
    pub maps: Vec<OpenedMap>,
}

impl MapLayer {
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn display_names(&self) -> Vec<&str> {
        self.maps
            .iter()
            .map(|m| m.candidate.display_name.as_str())
            .collect()
    }
}

/// Re-open a member. A member that no longer opens loses its cached verdict.
fn open_member(cache: &MapValidityCache, candidate: &OfflineMapCandidate) -> Option<OpenedMap> {
    match cache.open(&candidate.uri) {
        Ok(info) => Some(OpenedMap {
            candidate: candidate.clone(),
            info,
        }),
        Err(e) => {
            warn!(
                map = %candidate.display_name,
                uri = %candidate.uri,
                error = %e,
                "Offline map failed to open, dropping it from the layer"
            );
            cache.invalidate(&candidate.uri);
            None
        }
    }
}

/// One map file offered on its own.
pub struct SingleMapSource {
    member: OfflineMapCandidate,
    cache: Arc<MapValidityCache>,
}

impl SingleMapSource {
    pub fn new(member: OfflineMapCandidate, cache: Arc<MapValidityCache>) -> Self {
        Self { member, cache }
    }

    pub fn name(&self) -> &str {
        &self.member.display_name
    }

    pub fn member(&self) -> &OfflineMapCandidate {
        &self.member
    }

    pub fn is_available(&self) -> bool {
        self.cache.validate(&self.member.uri).valid
    }

    pub fn attribution(&self) -> Option<String> {
        self.cache.validate(&self.member.uri).attribution
    }

    pub fn open_layers(&self) -> MapLayer {
        MapLayer {
            maps: open_member(&self.cache, &self.member).into_iter().collect(),
        }
    }
}

/// All offline maps rendered together as one source.
///
/// Availability and attribution are recomputed from the validity cache on
/// every call, so an invalidated member shows up immediately.
pub struct CompositeMapSource {
    members: Vec<OfflineMapCandidate>,
    cache: Arc<MapValidityCache>,
}

impl CompositeMapSource {
    pub fn new(members: Vec<OfflineMapCandidate>, cache: Arc<MapValidityCache>) -> Self {
        Self { members, cache }
    }

    pub fn name(&self) -> &str {
        COMPOSITE_SOURCE_NAME
    }

    pub fn members(&self) -> &[OfflineMapCandidate] {
        &self.members
    }

    /// True only while every member still validates.
    pub fn is_available(&self) -> bool {
        self.members
            .iter()
            .all(|m| self.cache.validate(&m.uri).valid)
    }

    /// One `"<name>: <attribution>"` line per member that still validates.
    ///
    /// A member whose verdict flipped to invalid is left out, so the text
    /// shrinks while `is_available()` reports false.
    pub fn attribution(&self) -> String {
        self.members
            .iter()
            .filter_map(|m| {
                let attribution = self.cache.validate(&m.uri).attribution?;
                Some(format!("{}: {}", m.display_name, attribution))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn open_layers(&self) -> MapLayer {
        let maps: Vec<OpenedMap> = self
            .members
            .iter()
            .filter_map(|m| open_member(&self.cache, m))
            .collect();
        debug!(
            opened = maps.len(),
            members = self.members.len(),
            "Opened composite offline map"
        );
        MapLayer { maps }
    }
}

/// A selectable offline map source.
pub enum OfflineMapSource {
    Single(SingleMapSource),
    Composite(CompositeMapSource),
}

impl OfflineMapSource {
    pub fn name(&self) -> &str {
        match self {
            OfflineMapSource::Single(s) => s.name(),
            OfflineMapSource::Composite(c) => c.name(),
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            OfflineMapSource::Single(s) => s.is_available(),
            OfflineMapSource::Composite(c) => c.is_available(),
        }
    }

    pub fn attribution(&self) -> Option<String> {
        match self {
            OfflineMapSource::Single(s) => s.attribution(),
            OfflineMapSource::Composite(c) => Some(c.attribution()),
        }
    }

    pub fn open_layers(&self) -> MapLayer {
        match self {
            OfflineMapSource::Single(s) => s.open_layers(),
            OfflineMapSource::Composite(c) => c.open_layers(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, OfflineMapSource::Composite(_))
    }
}

/// The offline sources currently on offer, rebuilt after each rescan.
pub struct OfflineMapCatalog {
    registry: OfflineMapRegistry,
    cache: Arc<MapValidityCache>,
    sources: RwLock<Vec<Arc<OfflineMapSource>>>,
}

impl OfflineMapCatalog {
    pub fn new(registry: OfflineMapRegistry, cache: Arc<MapValidityCache>) -> Self {
        Self {
            registry,
            cache,
            sources: RwLock::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &OfflineMapRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<MapValidityCache> {
        &self.cache
    }

    /// Rescan the folder and replace the source list.
    ///
    /// Every valid map becomes a single source. When more than one is valid
    /// they are also offered together as a composite, listed last.
    pub fn refresh(&self) -> Vec<Arc<OfflineMapSource>> {
        let candidates = self.registry.list_candidates();
        let total = candidates.len();

        let valid: Vec<OfflineMapCandidate> = candidates
            .into_iter()
            .filter(|c| self.cache.validate(&c.uri).valid)
            .collect();

        let mut sources: Vec<Arc<OfflineMapSource>> = valid
            .iter()
            .cloned()
            .map(|c| {
                Arc::new(OfflineMapSource::Single(SingleMapSource::new(
                    c,
                    Arc::clone(&self.cache),
                )))
            })
            .collect();

        if valid.len() > 1 {
            sources.push(Arc::new(OfflineMapSource::Composite(CompositeMapSource::new(
                valid,
                Arc::clone(&self.cache),
            ))));
        }

        info!(
            found = total,
            sources = sources.len(),
            dir = %self.registry.dir().display(),
            "Offline map sources refreshed"
        );

        *self.sources.write() = sources.clone();
        sources
    }

    /// The sources built by the last `refresh`.
    pub fn sources(&self) -> Vec<Arc<OfflineMapSource>> {
        self.sources.read().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::test_support::{write_map, MapFixture};
    use crate::offline::NO_ATTRIBUTION;
    use tempfile::TempDir;

    fn catalog(dir: &TempDir) -> OfflineMapCatalog {
        OfflineMapCatalog::new(
            OfflineMapRegistry::new(dir.path().to_path_buf()),
            Arc::new(MapValidityCache::new()),
        )
    }

    fn composite(sources: &[Arc<OfflineMapSource>]) -> &CompositeMapSource {
        sources
            .iter()
            .find_map(|s| match s.as_ref() {
                OfflineMapSource::Composite(c) => Some(c),
                OfflineMapSource::Single(_) => None,
            })
            .expect("composite source")
    }

    #[test]
    fn test_composite_attribution() {
        let temp_dir = TempDir::new().unwrap();
        write_map(temp_dir.path(), "alps.map", &MapFixture {
            comment: Some("Alps data"),
            ..Default::default()
        });
        write_map(temp_dir.path(), "rhine-valley.map", &MapFixture::default());
        let catalog = catalog(&temp_dir);

        let sources = catalog.refresh();

        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Alps", "Rhine Valley", COMPOSITE_SOURCE_NAME]);

        let combined = composite(&sources);
        assert!(combined.is_available());
        assert_eq!(
            combined.attribution(),
            format!("Alps: Alps data\nRhine Valley: {}", NO_ATTRIBUTION)
        );
    }

    #[test]
    fn test_composite_availability_follows_invalidation() {
        let temp_dir = TempDir::new().unwrap();
        write_map(temp_dir.path(), "alps.map", &MapFixture::default());
        write_map(temp_dir.path(), "rhine-valley.map", &MapFixture::default());
        let catalog = catalog(&temp_dir);
        let sources = catalog.refresh();
        let combined = composite(&sources);
        let alps = combined.members()[0].uri.clone();
        assert!(combined.is_available());

        std::fs::write(alps.to_file_path().unwrap(), b"corrupted").unwrap();
        // Still the cached verdict
        assert!(combined.is_available());

        catalog.cache().invalidate(&alps);
        assert!(!combined.is_available());
        assert_eq!(combined.attribution(), format!("Rhine Valley: {}", NO_ATTRIBUTION));
    }

    #[test]
    fn test_open_layers_drops_missing_member() {
        let temp_dir = TempDir::new().unwrap();
        write_map(temp_dir.path(), "alps.map", &MapFixture::default());
        write_map(temp_dir.path(), "rhine-valley.map", &MapFixture::default());
        let catalog = catalog(&temp_dir);
        let sources = catalog.refresh();
        let combined = composite(&sources);
        let alps = combined.members()[0].uri.clone();
        assert_eq!(combined.open_layers().len(), 2);

        std::fs::remove_file(alps.to_file_path().unwrap()).unwrap();
        let layer = combined.open_layers();

        assert_eq!(layer.display_names(), vec!["Rhine Valley"]);
        assert!(catalog.cache().verdict(&alps).is_none());
        assert!(!combined.is_available());
    }

    #[test]
    fn test_single_valid_map_has_no_composite() {
        let temp_dir = TempDir::new().unwrap();
        write_map(temp_dir.path(), "alps.map", &MapFixture {
            created_by: Some("mapsforge-map-writer"),
            ..Default::default()
        });
        std::fs::write(temp_dir.path().join("broken.map"), b"nope").unwrap();
        let catalog = catalog(&temp_dir);

        let sources = catalog.refresh();

        assert_eq!(sources.len(), 1);
        assert!(!sources[0].is_composite());
        assert_eq!(sources[0].name(), "Alps");
        assert!(sources[0].is_available());
        assert_eq!(
            sources[0].attribution().as_deref(),
            Some("mapsforge-map-writer")
        );
        assert_eq!(sources[0].open_layers().len(), 1);
    }

    #[test]
    fn test_refresh_replaces_previous_sources() {
        let temp_dir = TempDir::new().unwrap();
        write_map(temp_dir.path(), "alps.map", &MapFixture::default());
        let catalog = catalog(&temp_dir);
        assert!(catalog.sources().is_empty());

        catalog.refresh();
        assert_eq!(catalog.sources().len(), 1);

        write_map(temp_dir.path(), "bavaria.map", &MapFixture::default());
        catalog.refresh();
        let names: Vec<String> = catalog
            .sources()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["Alps", "Bavaria", COMPOSITE_SOURCE_NAME]);
    }
}
