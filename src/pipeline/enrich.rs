use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::app::ports::GeocoderPort;

/// Best-effort geocoding for rows that carry an address but no usable
/// coordinates. Failure is never fatal to a row; it proceeds to commit with
/// null coordinates.
pub struct Enricher {
    geocoder: Arc<dyn GeocoderPort>,
    /// Fixed inter-call delay; sequential calls are sufficient for this
    /// workload's volume.
    delay: Duration,
    /// Bounded per-call timeout.
    timeout: Duration,
}

impl Enricher {
    pub fn new(geocoder: Arc<dyn GeocoderPort>, delay: Duration, timeout: Duration) -> Self {
        Self {
            geocoder,
            delay,
            timeout,
        }
    }

    /// Whether a row qualifies for enrichment: coordinates missing, zero,
    /// or out of range.
    pub fn needs_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> bool {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => {
                (lat == 0.0 && lon == 0.0)
                    || !(-90.0..=90.0).contains(&lat)
                    || !(-180.0..=180.0).contains(&lon)
            }
            _ => true,
        }
    }

    /// Resolve coordinates for an address. `None` covers NotFound, timeout
    /// and geocoder errors alike; the caller commits the row either way.
    pub async fn enrich(&self, address: &str, region: &str) -> Option<(f64, f64)> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let call = self.geocoder.geocode(address, region);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Some((lat, lon)))) => {
                debug!("Geocoded '{}' -> ({}, {})", address, lat, lon);
                Some((lat, lon))
            }
            Ok(Ok(None)) => {
                debug!("Geocoder found no match for '{}'", address);
                None
            }
            Ok(Err(e)) => {
                warn!("Geocoding failed for '{}': {}", address, e);
                None
            }
            Err(_) => {
                warn!(
                    "Geocoding timed out after {:?} for '{}'",
                    self.timeout, address
                );
                None
            }
        }
    }
}
