//! On-disk storage for downloaded static maps.
//!
//! This module provides the `MapFileStore` which places each map at a
//! deterministic path derived from the subject:
//!
//! ```text
//! {data_dir}/{geocode}/map_{prefix}{level}
//! ```
//!
//! The prefix is empty for a cache and `wp{id}_` for one of its waypoints.
//! A file's presence is the only state kept; its content is trusted once it
//! passes the minimum size check at write time.

pub mod files;

pub use files::{MapFileStore, WriteOutcome, MIN_TILE_BYTES};
