//! cachemaps core - offline map acquisition for a geocaching app.
//!
//! Two halves share this crate:
//! - the static tile pipeline: `StaticMapDownloader` builds a fixed ladder of
//!   map requests per cache or waypoint, `TileFetchScheduler` runs them one at
//!   a time and `MapFileStore` keeps the results on disk
//! - the offline vector maps: `OfflineMapRegistry` lists `.map` files,
//!   `MapValidityCache` remembers which of them open and `OfflineMapCatalog`
//!   turns them into selectable sources, including a composite of all of them
//!
//! Services are constructed explicitly and shared by `Arc`.

pub mod api;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod models;
pub mod offline;
pub mod store;
pub mod utils;

pub use api::{FetchError, HttpTileClient, TileFetcher};
pub use config::Config;
pub use downloader::{BatchSummary, EnsureOutcome, MarkerIcons, StaticMapDownloader};
pub use error::{DownloadError, MapFileError, QueueError, StoreError};
pub use fetch::TileFetchScheduler;
pub use models::{DisplaySize, Geocache, Subject, Waypoint};
pub use offline::{
    MapValidityCache, OfflineMapCatalog, OfflineMapRegistry, OfflineMapSource,
};
pub use store::MapFileStore;
