//! Offline vector maps.
//!
//! This module provides:
//! - `OfflineMapRegistry`: lists the `.map` files in the managed folder
//! - `MapValidityCache`: remembers which of them open and what their
//!   attribution is, until told otherwise
//! - `OfflineMapSource`, `CompositeMapSource`: what the map screen offers,
//!   rebuilt by `OfflineMapCatalog::refresh` after every rescan
//!
//! Map files are identified by URI. A file edited in place under the same
//! name keeps its old verdict until something calls `invalidate`.

pub mod header;
pub mod registry;
pub mod source;
pub mod validity;

pub use header::{MapFileInfo, MapHeaderReader, MapsforgeHeaderReader};
pub use registry::{OfflineMapCandidate, OfflineMapRegistry};
pub use source::{
    CompositeMapSource, MapLayer, OfflineMapCatalog, OfflineMapSource, OpenedMap,
    SingleMapSource, COMPOSITE_SOURCE_NAME,
};
pub use validity::{MapValidity, MapValidityCache, Verdict, NO_ATTRIBUTION};
