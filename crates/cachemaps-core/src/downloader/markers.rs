//! Marker icon URLs for static map requests.

use crate::models::{Geocache, Waypoint};

/// Default location of the marker icon set.
pub const DEFAULT_MARKER_BASE_URL: &str = "https://static.cachemaps.app/markers/";

/// Icon key used for waypoints of unknown type.
const FALLBACK_WAYPOINT_TYPE: &str = "waypoint";

/// Builds marker icon URLs from a base path.
#[derive(Debug, Clone)]
pub struct MarkerIcons {
    base_url: String,
}

impl Default for MarkerIcons {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_BASE_URL)
    }
}

impl MarkerIcons {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url }
    }

    /// `marker_cache_<type>[_found|_disabled].png`
    pub fn cache_icon(&self, cache: &Geocache) -> String {
        format!(
            "{}marker_cache_{}{}.png",
            self.base_url,
            icon_key(&cache.cache_type, "unknown"),
            cache.status().icon_suffix()
        )
    }

    /// `marker_waypoint_<type>.png`
    pub fn waypoint_icon(&self, waypoint: &Waypoint) -> String {
        let key = waypoint
            .waypoint_type
            .as_deref()
            .unwrap_or(FALLBACK_WAYPOINT_TYPE);
        format!(
            "{}marker_waypoint_{}.png",
            self.base_url,
            icon_key(key, FALLBACK_WAYPOINT_TYPE)
        )
    }
}

/// Lowercase, URL-safe form of a type key.
fn icon_key(raw: &str, fallback: &str) -> String {
    let key: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() {
        fallback.to_string()
    } else {
        key
    }
}
