//! Static map prefetching for caches and waypoints.
//!
//! This module provides the `StaticMapDownloader`, which turns a subject into
//! the five fixed `TileRequest`s and downloads them into the `MapFileStore`,
//! either inline or as one background job on the `TileFetchScheduler`.
//!
//! Failures never reach the caller as errors. A level that cannot be
//! downloaded is logged and left absent; only a subject whose directory
//! cannot be created stops early.

pub mod markers;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::TileFetcher;
use crate::error::{DownloadError, QueueError};
use crate::fetch::{TileFetchScheduler, TileJob};
use crate::models::{Coordinates, DisplaySize, Geocache, Marker, Subject, TileRequest, TILE_LEVELS};
use crate::store::{MapFileStore, WriteOutcome};

pub use markers::{MarkerIcons, DEFAULT_MARKER_BASE_URL};

/// How long a background batch may wait for queue space.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(20);

/// Per-level results for one subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub stored: usize,
    /// Levels the service had no imagery for.
    pub unavailable: usize,
    pub failed: usize,
    /// Set when the subject's directory could not be used.
    pub aborted: bool,
}

impl BatchSummary {
    /// Record one level. Returns false when the rest of the batch should stop.
    fn record(&mut self, request: &TileRequest, result: Result<WriteOutcome, DownloadError>) -> bool {
        let level = request.level.level;
        match result {
            Ok(WriteOutcome::Stored(bytes)) => {
                debug!(geocode = %request.geocode, prefix = %request.prefix, level = level, bytes = bytes, "Stored static map");
                self.stored += 1;
            }
            Ok(WriteOutcome::TooSmall(bytes)) => {
                debug!(geocode = %request.geocode, prefix = %request.prefix, level = level, bytes = bytes, "No imagery for level");
                self.unavailable += 1;
            }
            Err(e) if e.aborts_subject() => {
                warn!(geocode = %request.geocode, error = %e, "Cannot store static maps, skipping subject");
                self.aborted = true;
                return false;
            }
            Err(e) => {
                warn!(geocode = %request.geocode, prefix = %request.prefix, level = level, error = %e, "Static map download failed");
                self.failed += 1;
            }
        }
        true
    }
}

/// What `ensure_maps_for` did with a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Subject has no usable coordinates or the display is too small.
    Skipped,
    /// Downloaded inline.
    Downloaded(BatchSummary),
    /// Handed to the background worker.
    Queued,
    /// The background queue did not accept the batch.
    Dropped(QueueError),
}

pub struct StaticMapDownloader<F> {
    fetcher: Arc<F>,
    store: Arc<MapFileStore>,
    scheduler: Arc<TileFetchScheduler>,
    icons: MarkerIcons,
    submit_timeout: Duration,
}

impl<F: TileFetcher + 'static> StaticMapDownloader<F> {
    pub fn new(
        fetcher: Arc<F>,
        store: Arc<MapFileStore>,
        scheduler: Arc<TileFetchScheduler>,
        icons: MarkerIcons,
    ) -> Self {
        Self {
            fetcher,
            store,
            scheduler,
            icons,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn store(&self) -> &MapFileStore {
        &self.store
    }

    /// The five requests for a subject, closest zoom first.
    ///
    /// Empty when the subject has no usable coordinates.
    pub fn build_requests(&self, subject: Subject<'_>, display: DisplaySize) -> Vec<TileRequest> {
        let Some(center) = subject.coords() else {
            return Vec::new();
        };

        let edge = display.tile_edge();
        if edge == 0 {
            let DisplaySize { width, height } = display;
            debug!(subject = %subject, width = width, height = height, "Display too small for static maps");
            return Vec::new();
        }

        let markers = self.markers_for(subject, center);
        let geocode = subject.geocode().to_string();
        let prefix = subject.file_prefix();

        TILE_LEVELS
            .iter()
            .map(|level| TileRequest {
                geocode: geocode.clone(),
                prefix: prefix.clone(),
                level: *level,
                center,
                edge,
                markers: markers.clone(),
            })
            .collect()
    }

    fn markers_for(&self, subject: Subject<'_>, center: Coordinates) -> Vec<Marker> {
        match subject {
            Subject::Cache(cache) => {
                let mut markers = vec![Marker {
                    icon_url: self.icons.cache_icon(cache),
                    coords: center,
                }];
                markers.extend(cache.located_waypoints().map(|(wp, coords)| Marker {
                    icon_url: self.icons.waypoint_icon(wp),
                    coords,
                }));
                markers
            }
            Subject::Waypoint(wp) => vec![Marker {
                icon_url: self.icons.waypoint_icon(wp),
                coords: center,
            }],
        }
    }

    /// Make sure the static maps for a subject are on disk.
    ///
    /// With `wait_for_result` every level is downloaded before returning.
    /// Otherwise all levels go to the background worker as a single job.
    pub async fn ensure_maps_for(
        &self,
        subject: Subject<'_>,
        display: DisplaySize,
        wait_for_result: bool,
    ) -> EnsureOutcome {
        let requests = self.build_requests(subject, display);
        if requests.is_empty() {
            return EnsureOutcome::Skipped;
        }

        if wait_for_result {
            let mut summary = BatchSummary::default();
            for request in &requests {
                let result = self
                    .scheduler
                    .run_inline(download_level(self.fetcher.as_ref(), &self.store, request))
                    .await;
                if !summary.record(request, result) {
                    break;
                }
            }
            info!(subject = %subject, stored = summary.stored, failed = summary.failed, "Static maps downloaded");
            return EnsureOutcome::Downloaded(summary);
        }

        let fetcher = Arc::clone(&self.fetcher);
        let store = Arc::clone(&self.store);
        let label = subject.to_string();
        let job: TileJob = Box::pin(async move {
            let summary = download_batch(fetcher.as_ref(), &store, &requests).await;
            debug!(subject = %label, stored = summary.stored, failed = summary.failed, "Background static maps done");
            Ok(())
        });

        match self.scheduler.submit(job, self.submit_timeout).await {
            Ok(()) => EnsureOutcome::Queued,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Static map batch dropped");
                EnsureOutcome::Dropped(e)
            }
        }
    }

    /// Ensure maps for a cache and each of its waypoints.
    pub async fn ensure_maps_for_cache(
        &self,
        cache: &Geocache,
        display: DisplaySize,
        wait_for_result: bool,
    ) -> Vec<EnsureOutcome> {
        let mut outcomes = Vec::with_capacity(cache.waypoints.len() + 1);
        outcomes.push(
            self.ensure_maps_for(Subject::Cache(cache), display, wait_for_result)
                .await,
        );
        for wp in &cache.waypoints {
            outcomes.push(
                self.ensure_maps_for(Subject::Waypoint(wp), display, wait_for_result)
                    .await,
            );
        }
        outcomes
    }

    /// Delete a subject's maps. Returns how many files were removed.
    pub fn remove_for(&self, subject: Subject<'_>) -> usize {
        self.store.delete_all(subject.geocode(), &subject.file_prefix())
    }

    /// Delete the maps of a cache and all its waypoints.
    pub fn remove_for_cache(&self, cache: &Geocache) -> usize {
        let mut removed = self.remove_for(Subject::Cache(cache));
        for wp in &cache.waypoints {
            removed += self.remove_for(Subject::Waypoint(wp));
        }
        removed
    }

    /// Whether at least one level exists for a subject.
    pub fn exists_for(&self, subject: Subject<'_>) -> bool {
        self.store.exists_any(subject.geocode(), &subject.file_prefix())
    }
}

async fn download_level<F: TileFetcher>(
    fetcher: &F,
    store: &MapFileStore,
    request: &TileRequest,
) -> Result<WriteOutcome, DownloadError> {
    let path = store
        .prepare_path(&request.geocode, &request.prefix, request.level.level)
        .await?;
    let body = fetcher.fetch(request).await?;
    Ok(store.write(&path, body.as_slice()).await?)
}

async fn download_batch<F: TileFetcher>(
    fetcher: &F,
    store: &MapFileStore,
    requests: &[TileRequest],
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for request in requests {
        let result = download_level(fetcher, store, request).await;
        if !summary.record(request, result) {
            break;
        }
    }
    summary
}

// ============================================================================
// Tests
// ============================================================================
