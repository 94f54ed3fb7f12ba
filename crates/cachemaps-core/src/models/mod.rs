//! Data models for map acquisition.
//!
//! This module contains the minimal slice of the geocaching domain needed to
//! build tile requests:
//!
//! - `Geocache`, `Waypoint`: the points tiles are fetched for
//! - `Subject`: either of the two, as seen by the downloader
//! - `TileLevel`, `TileRequest`, `Marker`: the fixed zoom ladder and the
//!   immutable request built for each level

pub mod subject;
pub mod tile;

pub use subject::{CacheStatus, Coordinates, Geocache, Subject, Waypoint};
pub use tile::{DisplaySize, MapType, Marker, TileLevel, TileRequest, TILE_LEVELS};
