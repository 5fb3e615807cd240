use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::app::ports::GeocoderPort;
use crate::config::GeocoderConfig;
use crate::error::{ImportError, Result};

/// HTTP geocoding client against a Nominatim-style search endpoint.
pub struct HttpGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    lat: String,
    lon: String,
}

impl HttpGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let user_agent = std::env::var("GEOCODER_USER_AGENT")
            .unwrap_or_else(|_| "registry-importer/0.1".to_string());
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl GeocoderPort for HttpGeocoder {
    async fn geocode(&self, address: &str, region: &str) -> Result<Option<(f64, f64)>> {
        let query = format!("{}, {}", address, region);
        debug!("Geocoding query: {}", query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ImportError::Geocoder(format!(
                "geocoder returned status {}",
                response.status()
            )));
        }

        let results: Vec<GeocodeResult> = response.json().await?;
        let Some(first) = results.first() else {
            return Ok(None);
        };

        let lat = first
            .lat
            .parse::<f64>()
            .map_err(|e| ImportError::Geocoder(format!("invalid latitude in response: {}", e)))?;
        let lon = first
            .lon
            .parse::<f64>()
            .map_err(|e| ImportError::Geocoder(format!("invalid longitude in response: {}", e)))?;
        Ok(Some((lat, lon)))
    }
}
