use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::geo::{Coordinates, GeocodeError, Geocoder};

/// One search hit from a Nominatim-style endpoint. Coordinates arrive as
/// decimal strings.
#[derive(Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// Thin client for a Nominatim-compatible geocoding endpoint.
pub struct HttpGeocoder {
    client: Client,
    base_url: Url,
}

impl HttpGeocoder {
    /// Create a geocoder client. The user agent is mandatory: public
    /// Nominatim instances reject anonymous clients.
    pub fn new(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> std::result::Result<Self, GeocodeError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GeocodeError(format!("invalid base URL {base_url}: {e}")))?;

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| GeocodeError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, city: &str) -> std::result::Result<Option<Coordinates>, GeocodeError> {
        let url = self
            .base_url
            .join("search")
            .map_err(|e| GeocodeError(e.to_string()))?;

        let hits: Vec<SearchHit> = self
            .client
            .get(url)
            .query(&[("q", city), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| GeocodeError(format!("{city}: {e}")))?
            .error_for_status()
            .map_err(|e| GeocodeError(format!("{city}: {e}")))?
            .json()
            .await
            .map_err(|e| GeocodeError(format!("{city}: malformed response: {e}")))?;

        let Some(hit) = hits.first() else {
            return Ok(None);
        };

        let latitude: f64 = hit
            .lat
            .parse()
            .map_err(|_| GeocodeError(format!("{city}: bad latitude {:?}", hit.lat)))?;
        let longitude: f64 = hit
            .lon
            .parse()
            .map_err(|_| GeocodeError(format!("{city}: bad longitude {:?}", hit.lon)))?;

        Ok(Some((latitude, longitude)))
    }
}
