pub mod cache;
pub mod provider;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cache::GeocodeCache;
pub use provider::NominatimGeocoder;
pub use store::{CoordinateStore, MemoryStore, SqliteStore};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CachedCoordinates {
    pub coords: Coordinates,
    pub cached_at: DateTime<Utc>,
}

/// Canonical form of a place string: lowercase, trimmed, internal
/// whitespace collapsed. Cache keys and route grouping both use this,
/// so "Dallas, TX" and " dallas,  tx " are one place.
pub fn normalize_place(place: &str) -> String {
    place
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, place: &str) -> Result<Coordinates>;
}
