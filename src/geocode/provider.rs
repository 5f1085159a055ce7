use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::geocode::{Coordinates, Geocoder};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 12;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 6;

/// Nominatim-compatible forward geocoder. The only contract with the
/// provider is "coordinates for a string, tolerate failure".
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: impl Into<String>, user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .expect("failed to build geocoder HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> Result<Coordinates> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .with_context(|| format!("failed geocoding request: {place}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed reading geocoder response: {place}"))?;
        if !status.is_success() {
            let preview: String = body.chars().take(180).collect();
            return Err(anyhow!("geocoder returned {status} for {place}: {preview}"));
        }
        let hits: Vec<NominatimHit> = serde_json::from_str(&body)
            .with_context(|| format!("invalid geocoder JSON for {place}"))?;
        parse_first_hit(&hits, place)
    }
}

fn parse_first_hit(hits: &[NominatimHit], place: &str) -> Result<Coordinates> {
    let hit = hits
        .first()
        .ok_or_else(|| anyhow!("no geocoding result for {place}"))?;
    let lat = hit
        .lat
        .trim()
        .parse::<f64>()
        .with_context(|| format!("unparseable latitude for {place}: {}", hit.lat))?;
    let lng = hit
        .lon
        .trim()
        .parse::<f64>()
        .with_context(|| format!("unparseable longitude for {place}: {}", hit.lon))?;
    Ok(Coordinates { lat, lng })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_hit_lat_lon_strings() {
        let hits = vec![
            NominatimHit {
                lat: "32.7767".to_string(),
                lon: "-96.7970".to_string(),
            },
            NominatimHit {
                lat: "0".to_string(),
                lon: "0".to_string(),
            },
        ];
        let coords = parse_first_hit(&hits, "dallas, tx").unwrap();
        assert_eq!(coords.lat, 32.7767);
        assert_eq!(coords.lng, -96.7970);
    }

    #[test]
    fn empty_result_set_is_an_error() {
        assert!(parse_first_hit(&[], "nowhere").is_err());
    }

    #[test]
    fn garbage_coordinates_are_an_error() {
        let hits = vec![NominatimHit {
            lat: "north-ish".to_string(),
            lon: "-96.7".to_string(),
        }];
        assert!(parse_first_hit(&hits, "dallas, tx").is_err());
    }
}
