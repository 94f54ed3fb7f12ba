//! Static map HTTP access.
//!
//! This module provides the `TileFetcher` contract the downloader depends on
//! and `HttpTileClient`, its reqwest implementation against a static map
//! image endpoint.
//!
//! One GET is issued per tile. There is no retry: a level that fails is
//! simply absent until the next time maps are requested.

pub mod client;
pub mod error;

use std::future::Future;

use crate::models::TileRequest;

pub use client::HttpTileClient;
pub use error::FetchError;

/// Source of static map images.
pub trait TileFetcher: Send + Sync {
    /// Download the image for one tile request.
    fn fetch(
        &self,
        request: &TileRequest,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}
