//! reqwest-backed static map client.

use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{debug, trace, warn};

use super::{FetchError, TileFetcher};
use crate::models::TileRequest;

/// Default static map image endpoint.
pub const DEFAULT_STATIC_MAP_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";

/// HTTP request timeout in seconds.
/// Static maps are small; 30s tolerates a weak field connection.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Static map client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTileClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpTileClient {
    /// Create a client for `endpoint`, optionally signing requests with `api_key`.
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FetchError::InvalidRequest(format!("bad endpoint {endpoint}: {e}")))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Full URL for a tile request.
    pub fn tile_url(&self, request: &TileRequest) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in request.query_pairs() {
                query.append_pair(name, &value);
            }
            if let Some(ref key) = self.api_key {
                query.append_pair("key", key);
            }
        }
        url
    }
}

impl TileFetcher for HttpTileClient {
    async fn fetch(&self, request: &TileRequest) -> Result<Vec<u8>, FetchError> {
        let url = self.tile_url(request);
        trace!(geocode = %request.geocode, level = request.level.level, "Static map GET starting");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(
                geocode = %request.geocode,
                level = request.level.level,
                error = %e,
                is_timeout = e.is_timeout(),
                "Static map request failed"
            );
            FetchError::Network(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        debug!(
            geocode = %request.geocode,
            level = request.level.level,
            bytes = bytes.len(),
            "Static map received"
        );
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, Marker, TILE_LEVELS};

    fn request() -> TileRequest {
        TileRequest {
            geocode: "GC42".to_string(),
            prefix: String::new(),
            level: TILE_LEVELS[0],
            center: Coordinates::new(48.1, 11.5),
            edge: 455,
            markers: vec![
                Marker {
                    icon_url: "https://icons.example.org/marker_cache_traditional.png".to_string(),
                    coords: Coordinates::new(48.1, 11.5),
                },
                Marker {
                    icon_url: "https://icons.example.org/marker_waypoint_parking.png".to_string(),
                    coords: Coordinates::new(48.2, 11.6),
                },
            ],
        }
    }

    #[test]
    fn test_tile_url_parameters() {
        let client = HttpTileClient::new(
            DEFAULT_STATIC_MAP_URL,
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let url = client.tile_url(&request());
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("zoom".to_string(), "20".to_string())));
        assert!(pairs.contains(&("maptype".to_string(), "satellite".to_string())));
        assert!(pairs.contains(&("size".to_string(), "455x455".to_string())));
        assert!(pairs.contains(&("sensor".to_string(), "false".to_string())));
        assert!(pairs.contains(&("key".to_string(), "secret".to_string())));
        assert_eq!(pairs.iter().filter(|(k, _)| k == "markers").count(), 2);
    }

    #[test]
    fn test_bad_endpoint_is_rejected() {
        let result = HttpTileClient::new("not a url", None, Duration::from_secs(5));
        assert!(matches!(result, Err(FetchError::InvalidRequest(_))));
    }
}
