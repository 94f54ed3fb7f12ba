use std::fmt;

use serde::{Deserialize, Serialize};

/// WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components finite and inside the WGS84 range.
    pub fn is_usable(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Formats as `lat,lon` with six fractional digits, the form used in
/// static map queries.
impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Marker state of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Found,
    Disabled,
    Normal,
}

impl CacheStatus {
    /// Icon filename suffix for this status.
    pub fn icon_suffix(&self) -> &'static str {
        match self {
            CacheStatus::Found => "_found",
            CacheStatus::Disabled => "_disabled",
            CacheStatus::Normal => "",
        }
    }
}

/// A geocache: the primary point of a map subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geocache {
    pub geocode: String,
    #[serde(default)]
    pub name: String,
    /// Type key such as `traditional` or `multi`.
    #[serde(default = "default_cache_type")]
    pub cache_type: String,
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub disabled: bool,
    pub coords: Option<Coordinates>,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

fn default_cache_type() -> String {
    "unknown".to_string()
}

impl Geocache {
    /// Found wins over disabled.
    pub fn status(&self) -> CacheStatus {
        if self.found {
            CacheStatus::Found
        } else if self.disabled {
            CacheStatus::Disabled
        } else {
            CacheStatus::Normal
        }
    }

    /// Waypoints that can be drawn as markers.
    pub fn located_waypoints(&self) -> impl Iterator<Item = (&Waypoint, Coordinates)> + '_ {
        self.waypoints
            .iter()
            .filter_map(|wp| wp.usable_coords().map(|coords| (wp, coords)))
    }

    pub fn usable_coords(&self) -> Option<Coordinates> {
        self.coords.filter(Coordinates::is_usable)
    }

    /// Point every waypoint without a parent geocode at this cache.
    pub fn link_waypoints(&mut self) {
        for wp in &mut self.waypoints {
            if wp.geocode.is_empty() {
                wp.geocode = self.geocode.clone();
            }
        }
    }
}

/// A waypoint belonging to a geocache: a secondary map subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: i64,
    /// Geocode of the owning cache. Filled in from the parent when loading
    /// a cache document that omits it.
    #[serde(default)]
    pub geocode: String,
    #[serde(default)]
    pub name: String,
    /// Type key such as `parking` or `stage`; `None` when unknown.
    pub waypoint_type: Option<String>,
    pub coords: Option<Coordinates>,
}

impl Waypoint {
    pub fn usable_coords(&self) -> Option<Coordinates> {
        self.coords.filter(Coordinates::is_usable)
    }
}

/// The point a set of static maps is fetched for.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Cache(&'a Geocache),
    Waypoint(&'a Waypoint),
}

impl<'a> Subject<'a> {
    /// Geocode of the directory the subject's maps live in.
    pub fn geocode(&self) -> &'a str {
        match self {
            Subject::Cache(cache) => &cache.geocode,
            Subject::Waypoint(wp) => &wp.geocode,
        }
    }

    /// Filename prefix distinguishing a waypoint's maps from its cache's.
    pub fn file_prefix(&self) -> String {
        match self {
            Subject::Cache(_) => String::new(),
            Subject::Waypoint(wp) => format!("wp{}_", wp.id),
        }
    }

    pub fn coords(&self) -> Option<Coordinates> {
        match self {
            Subject::Cache(cache) => cache.usable_coords(),
            Subject::Waypoint(wp) => wp.usable_coords(),
        }
    }

    pub fn display_name(&self) -> &'a str {
        match self {
            Subject::Cache(cache) => &cache.name,
            Subject::Waypoint(wp) => &wp.name,
        }
    }
}

impl fmt::Display for Subject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Cache(cache) => write!(f, "{}", cache.geocode),
            Subject::Waypoint(wp) => write!(f, "{}/wp{}", wp.geocode, wp.id),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
