//! Mapsforge binary map file header.
//!
//! Only the header is read. It is enough to decide whether a file is a map
//! we can open and to find the attribution the map writer embedded.
//!
//! ```text
//! magic "mapsforge binary OSM"   20 bytes
//! header size                    u32, bytes following this field
//! file version                   u32, 3..=5
//! file size                      u64
//! creation date                  i64, ms since epoch
//! bounding box                   4 x i32 microdegrees
//! tile size                      u16
//! projection                     string
//! flags                          u8
//! [start position, start zoom, languages, comment, created by]
//! POI tags, way tags             u16 count + strings
//! zoom intervals                 u8 count + 19 bytes each
//! ```
//!
//! Integers are big-endian; strings are UTF-8 prefixed with a VBE-U length.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::ops::RangeInclusive;

use byteorder::{BigEndian, ReadBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Url;

use crate::error::MapFileError;
use crate::models::Coordinates;

pub const MAGIC: &[u8; 20] = b"mapsforge binary OSM";

const HEADER_SIZE_RANGE: RangeInclusive<u32> = 70..=1_000_000;
const SUPPORTED_VERSIONS: RangeInclusive<u32> = 3..=5;
const PROJECTION: &str = "Mercator";

const FLAG_DEBUG: u8 = 0x80;
const FLAG_START_POSITION: u8 = 0x40;
const FLAG_START_ZOOM: u8 = 0x20;
const FLAG_LANGUAGES: u8 = 0x10;
const FLAG_COMMENT: u8 = 0x08;
const FLAG_CREATED_BY: u8 = 0x04;

const MICRODEGREES: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    fn from_microdegrees(min_lat: i32, min_lon: i32, max_lat: i32, max_lon: i32) -> Result<Self, MapFileError> {
        let bbox = Self {
            min_latitude: min_lat as f64 / MICRODEGREES,
            min_longitude: min_lon as f64 / MICRODEGREES,
            max_latitude: max_lat as f64 / MICRODEGREES,
            max_longitude: max_lon as f64 / MICRODEGREES,
        };
        let in_range = (-90.0..=90.0).contains(&bbox.min_latitude)
            && (-90.0..=90.0).contains(&bbox.max_latitude)
            && (-180.0..=180.0).contains(&bbox.min_longitude)
            && (-180.0..=180.0).contains(&bbox.max_longitude);
        if !in_range || bbox.min_latitude > bbox.max_latitude || bbox.min_longitude > bbox.max_longitude {
            return Err(MapFileError::InvalidBoundingBox);
        }
        Ok(bbox)
    }

    pub fn contains(&self, coords: Coordinates) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&coords.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&coords.longitude)
    }
}

/// One sub-file of the map, covering a range of zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomInterval {
    pub base_zoom: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub start: u64,
    pub size: u64,
}

/// Everything the header says about a map file.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFileInfo {
    pub file_version: u32,
    pub file_size: u64,
    pub created: Option<DateTime<Utc>>,
    pub bounding_box: BoundingBox,
    pub tile_size: u16,
    pub projection: String,
    pub debug: bool,
    pub start_position: Option<Coordinates>,
    pub start_zoom: Option<u8>,
    pub languages: Option<String>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub poi_tags: Vec<String>,
    pub way_tags: Vec<String>,
    pub zoom_intervals: Vec<ZoomInterval>,
}

impl MapFileInfo {
    /// Declared credit text: the comment, else the creating tool.
    pub fn attribution(&self) -> Option<&str> {
        [self.comment.as_deref(), self.created_by.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Opens a map by URI and reads its header.
pub trait MapHeaderReader: Send + Sync {
    fn read_header(&self, uri: &Url) -> Result<MapFileInfo, MapFileError>;
}

/// Reads mapsforge headers from `file://` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapsforgeHeaderReader;

impl MapHeaderReader for MapsforgeHeaderReader {
    fn read_header(&self, uri: &Url) -> Result<MapFileInfo, MapFileError> {
        if uri.scheme() != "file" {
            return Err(MapFileError::UnsupportedUri(uri.to_string()));
        }
        let path = uri
            .to_file_path()
            .map_err(|_| MapFileError::UnsupportedUri(uri.to_string()))?;

        let file = File::open(&path)?;
        let actual_size = file.metadata()?.len();
        parse_header(BufReader::new(file), actual_size)
    }
}

/// Parse a header from the start of a map file of `actual_size` bytes.
pub fn parse_header<R: Read>(mut reader: R, actual_size: u64) -> Result<MapFileInfo, MapFileError> {
    let mut magic = [0u8; 20];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(MapFileError::BadMagic);
    }

    let header_size = reader.read_u32::<BigEndian>()?;
    if !HEADER_SIZE_RANGE.contains(&header_size) {
        return Err(MapFileError::InvalidHeaderSize(header_size));
    }

    let mut header = vec![0u8; header_size as usize];
    reader.read_exact(&mut header)?;
    let mut cur = Cursor::new(header.as_slice());

    let file_version = cur.read_u32::<BigEndian>()?;
    if !SUPPORTED_VERSIONS.contains(&file_version) {
        return Err(MapFileError::UnsupportedVersion(file_version));
    }

    let file_size = cur.read_u64::<BigEndian>()?;
    if file_size != actual_size {
        return Err(MapFileError::FileSizeMismatch {
            declared: file_size,
            actual: actual_size,
        });
    }

    let created_ms = cur.read_i64::<BigEndian>()?;
    let created = if created_ms > 0 {
        Utc.timestamp_millis_opt(created_ms).single()
    } else {
        None
    };

    let min_lat = cur.read_i32::<BigEndian>()?;
    let min_lon = cur.read_i32::<BigEndian>()?;
    let max_lat = cur.read_i32::<BigEndian>()?;
    let max_lon = cur.read_i32::<BigEndian>()?;
    let bounding_box = BoundingBox::from_microdegrees(min_lat, min_lon, max_lat, max_lon)?;

    let tile_size = cur.read_u16::<BigEndian>()?;

    let projection = read_string(&mut cur)?;
    if projection != PROJECTION {
        return Err(MapFileError::UnsupportedProjection(projection));
    }

    let flags = cur.read_u8()?;
    let start_position = if flags & FLAG_START_POSITION != 0 {
        let lat = cur.read_i32::<BigEndian>()?;
        let lon = cur.read_i32::<BigEndian>()?;
        Some(Coordinates::new(lat as f64 / MICRODEGREES, lon as f64 / MICRODEGREES))
    } else {
        None
    };
    let start_zoom = optional(flags, FLAG_START_ZOOM, || Ok(cur.read_u8()?))?;
    let languages = optional(flags, FLAG_LANGUAGES, || read_string(&mut cur))?;
    let comment = optional(flags, FLAG_COMMENT, || read_string(&mut cur))?;
    let created_by = optional(flags, FLAG_CREATED_BY, || read_string(&mut cur))?;

    let poi_tags = read_tags(&mut cur)?;
    let way_tags = read_tags(&mut cur)?;
    let zoom_intervals = read_zoom_intervals(&mut cur, file_size)?;

    Ok(MapFileInfo {
        file_version,
        file_size,
        created,
        bounding_box,
        tile_size,
        projection,
        debug: flags & FLAG_DEBUG != 0,
        start_position,
        start_zoom,
        languages,
        comment,
        created_by,
        poi_tags,
        way_tags,
        zoom_intervals,
    })
}

fn optional<T>(
    flags: u8,
    flag: u8,
    read: impl FnOnce() -> Result<T, MapFileError>,
) -> Result<Option<T>, MapFileError> {
    if flags & flag != 0 {
        read().map(Some)
    } else {
        Ok(None)
    }
}

/// Variable-byte unsigned integer: 7 bits per byte, low group first,
/// high bit set on every byte but the last.
fn read_vbe_u(cur: &mut Cursor<&[u8]>) -> Result<u32, MapFileError> {
    let mut value: u32 = 0;
    for shift in (0..35).step_by(7) {
        let byte = cur.read_u8()?;
        value |= ((byte & 0x7f) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(MapFileError::InvalidString("length prefix too long".to_string()))
}

fn read_string(cur: &mut Cursor<&[u8]>) -> Result<String, MapFileError> {
    let len = read_vbe_u(cur)? as u64;
    let remaining = cur.get_ref().len() as u64 - cur.position();
    if len > remaining {
        return Err(MapFileError::InvalidString(format!(
            "length {} exceeds header ({} bytes left)",
            len, remaining
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    cur.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| MapFileError::InvalidString(e.to_string()))
}

fn read_tags(cur: &mut Cursor<&[u8]>) -> Result<Vec<String>, MapFileError> {
    let count = cur.read_u16::<BigEndian>()?;
    (0..count).map(|_| read_string(cur)).collect()
}

fn read_zoom_intervals(cur: &mut Cursor<&[u8]>, file_size: u64) -> Result<Vec<ZoomInterval>, MapFileError> {
    let count = cur.read_u8()?;
    if count == 0 {
        return Err(MapFileError::InvalidZoomIntervals("no zoom intervals".to_string()));
    }

    let mut intervals = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let interval = ZoomInterval {
            base_zoom: cur.read_u8()?,
            min_zoom: cur.read_u8()?,
            max_zoom: cur.read_u8()?,
            start: cur.read_u64::<BigEndian>()?,
            size: cur.read_u64::<BigEndian>()?,
        };
        if interval.min_zoom > interval.base_zoom || interval.base_zoom > interval.max_zoom {
            return Err(MapFileError::InvalidZoomIntervals(format!(
                "base zoom {} outside {}..={}",
                interval.base_zoom, interval.min_zoom, interval.max_zoom
            )));
        }
        let end = interval.start.checked_add(interval.size);
        if end.map_or(true, |end| end > file_size) {
            return Err(MapFileError::InvalidZoomIntervals(format!(
                "sub-file at {} (+{}) past end of file",
                interval.start, interval.size
            )));
        }
        intervals.push(interval);
    }
    Ok(intervals)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::test_support::{map_bytes, write_map, MapFixture};
    use tempfile::TempDir;

    fn parse(bytes: &[u8]) -> Result<MapFileInfo, MapFileError> {
        parse_header(bytes, bytes.len() as u64)
    }

    #[test]
    fn test_parse_full_header() {
        let bytes = map_bytes(&MapFixture {
            comment: Some("Alps data"),
            created_by: Some("map-writer 0.21"),
            start_position: Some((47_500_000, 11_250_000)),
            start_zoom: Some(12),
            languages: Some("de,en"),
            ..Default::default()
        });

        let info = parse(&bytes).unwrap();

        assert_eq!(info.file_version, 4);
        assert_eq!(info.file_size, bytes.len() as u64);
        assert_eq!(info.tile_size, 256);
        assert_eq!(info.projection, "Mercator");
        assert_eq!(info.bounding_box.min_latitude, 47.0);
        assert_eq!(info.bounding_box.max_longitude, 12.0);
        assert_eq!(info.start_position, Some(Coordinates::new(47.5, 11.25)));
        assert_eq!(info.start_zoom, Some(12));
        assert_eq!(info.languages.as_deref(), Some("de,en"));
        assert_eq!(info.poi_tags, vec!["amenity=cafe".to_string()]);
        assert_eq!(info.way_tags, vec!["highway=path".to_string()]);
        assert_eq!(info.zoom_intervals.len(), 1);
        assert!(info.created.is_some());
        assert!(!info.debug);
        assert_eq!(info.attribution(), Some("Alps data"));
    }

    #[test]
    fn test_attribution_falls_back_to_created_by() {
        let bytes = map_bytes(&MapFixture {
            comment: Some("  "),
            created_by: Some("map-writer 0.21"),
            ..Default::default()
        });
        assert_eq!(parse(&bytes).unwrap().attribution(), Some("map-writer 0.21"));

        let bytes = map_bytes(&MapFixture::default());
        assert_eq!(parse(&bytes).unwrap().attribution(), None);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = map_bytes(&MapFixture::default());
        bytes[0] = b'M';
        assert!(matches!(parse(&bytes), Err(MapFileError::BadMagic)));
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let bytes = map_bytes(&MapFixture {
            version: 2,
            ..Default::default()
        });
        assert!(matches!(parse(&bytes), Err(MapFileError::UnsupportedVersion(2))));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let bytes = map_bytes(&MapFixture::default());
        let declared = bytes.len() as u64;
        let truncated = &bytes[..bytes.len() - 10];

        assert!(matches!(
            parse_header(truncated, truncated.len() as u64),
            Err(MapFileError::Io(_))
        ));
        // Complete header but the rest of the file is gone
        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            parse(&padded),
            Err(MapFileError::FileSizeMismatch { declared: d, .. }) if d == declared
        ));
    }

    #[test]
    fn test_vbe_lengths() {
        let data = [0x05u8];
        assert_eq!(read_vbe_u(&mut Cursor::new(&data[..])).unwrap(), 5);
        let data = [0x80u8 | 0x2c, 0x02];
        assert_eq!(read_vbe_u(&mut Cursor::new(&data[..])).unwrap(), 300);
        let data = [0xffu8; 6];
        assert!(read_vbe_u(&mut Cursor::new(&data[..])).is_err());
    }

    #[test]
    fn test_reader_opens_file_uri() {
        let temp_dir = TempDir::new().unwrap();
        let uri = write_map(temp_dir.path(), "alps.map", &MapFixture {
            comment: Some("Alps data"),
            ..Default::default()
        });

        let info = MapsforgeHeaderReader.read_header(&uri).unwrap();
        assert_eq!(info.comment.as_deref(), Some("Alps data"));

        let missing = Url::from_file_path(temp_dir.path().join("gone.map")).unwrap();
        assert!(matches!(
            MapsforgeHeaderReader.read_header(&missing),
            Err(MapFileError::Io(_))
        ));

        let remote = Url::parse("https://example.org/alps.map").unwrap();
        assert!(matches!(
            MapsforgeHeaderReader.read_header(&remote),
            Err(MapFileError::UnsupportedUri(_))
        ));
    }
}
