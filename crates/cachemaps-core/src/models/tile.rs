//! The static map zoom ladder and the request built for each rung.

use std::fmt;

use super::Coordinates;

/// Pixels trimmed from the longer display edge to size a square tile.
const EDGE_MARGIN_PX: u32 = 25;

/// Imagery style of a static map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapType {
    Satellite,
    Roadmap,
}

impl MapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::Satellite => "satellite",
            MapType::Roadmap => "roadmap",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rung of the fixed zoom ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLevel {
    pub level: u8,
    pub zoom: u8,
    pub map_type: MapType,
}

/// Every subject gets exactly these five maps, closest first.
pub const TILE_LEVELS: [TileLevel; 5] = [
    TileLevel { level: 1, zoom: 20, map_type: MapType::Satellite },
    TileLevel { level: 2, zoom: 18, map_type: MapType::Satellite },
    TileLevel { level: 3, zoom: 16, map_type: MapType::Roadmap },
    TileLevel { level: 4, zoom: 14, map_type: MapType::Roadmap },
    TileLevel { level: 5, zoom: 11, map_type: MapType::Roadmap },
];

impl TileLevel {
    pub fn for_level(level: u8) -> Option<TileLevel> {
        TILE_LEVELS.iter().copied().find(|l| l.level == level)
    }
}

/// Size of the screen the maps will be shown on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Edge of the square tile requested for every level.
    pub fn tile_edge(&self) -> u32 {
        self.width.max(self.height).saturating_sub(EDGE_MARGIN_PX)
    }
}

/// A map pin: icon URL plus position.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub icon_url: String,
    pub coords: Coordinates,
}

/// Formats as the static map `markers` parameter value.
impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "icon:{}|{}", self.icon_url, self.coords)
    }
}

/// Everything needed to fetch and store one static map.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub geocode: String,
    pub prefix: String,
    pub level: TileLevel,
    pub center: Coordinates,
    pub edge: u32,
    /// Subject marker first, then any waypoint markers.
    pub markers: Vec<Marker>,
}

impl TileRequest {
    pub fn zoom(&self) -> u8 {
        self.level.zoom
    }

    pub fn map_type(&self) -> MapType {
        self.level.map_type
    }

    /// `WxH` value for the size parameter.
    pub fn size_param(&self) -> String {
        format!("{}x{}", self.edge, self.edge)
    }

    /// Query parameters for the static map endpoint, in request order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("center", self.center.to_string()),
            ("zoom", self.zoom().to_string()),
            ("size", self.size_param()),
            ("maptype", self.map_type().to_string()),
        ];
        pairs.extend(self.markers.iter().map(|m| ("markers", m.to_string())));
        pairs.push(("sensor", "false".to_string()));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_is_fixed() {
        let pairs: Vec<(u8, u8, MapType)> = TILE_LEVELS
            .iter()
            .map(|l| (l.level, l.zoom, l.map_type))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (1, 20, MapType::Satellite),
                (2, 18, MapType::Satellite),
                (3, 16, MapType::Roadmap),
                (4, 14, MapType::Roadmap),
                (5, 11, MapType::Roadmap),
            ]
        );
        assert_eq!(TileLevel::for_level(3).map(|l| l.zoom), Some(16));
        assert!(TileLevel::for_level(6).is_none());
    }

    #[test]
    fn test_tile_edge() {
        assert_eq!(DisplaySize::new(480, 800).tile_edge(), 775);
        assert_eq!(DisplaySize::new(1024, 600).tile_edge(), 999);
        assert_eq!(DisplaySize::new(10, 20).tile_edge(), 0);
    }

    #[test]
    fn test_query_pairs() {
        let request = TileRequest {
            geocode: "GC1".to_string(),
            prefix: String::new(),
            level: TILE_LEVELS[2],
            center: Coordinates::new(1.5, 2.5),
            edge: 300,
            markers: vec![Marker {
                icon_url: "https://example.org/m.png".to_string(),
                coords: Coordinates::new(1.5, 2.5),
            }],
        };
        let pairs = request.query_pairs();
        assert_eq!(pairs[0], ("center", "1.500000,2.500000".to_string()));
        assert_eq!(pairs[1], ("zoom", "16".to_string()));
        assert_eq!(pairs[2], ("size", "300x300".to_string()));
        assert_eq!(pairs[3], ("maptype", "roadmap".to_string()));
        assert_eq!(
            pairs[4],
            (
                "markers",
                "icon:https://example.org/m.png|1.500000,2.500000".to_string()
            )
        );
        assert_eq!(pairs.last(), Some(&("sensor", "false".to_string())));
    }
}
