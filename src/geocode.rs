use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::parser::normalize::normalize;
use crate::parser::{Location, Prosecution};

const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

pub trait Geocoder {
    /// Coordinates for an address, `None` when nothing matched.
    async fn geocode(&self, address: &str) -> Result<Option<Location>>;
}

/// Google Maps Geocoding API client.
pub struct GoogleGeocoder {
    client: Client,
    api_key: Option<String>,
}

impl GoogleGeocoder {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        if api_key.is_none() {
            warn!("MORPH_GOOGLE_API_KEY not set; geocoding requests will likely be denied");
        }
        Self { client, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Location>> {
        let mut query = vec![("address", address)];
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }

        let response: GeocodeResponse = self
            .client
            .get(GEOCODE_URL)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Unreadable geocoding response")?;

        parse_response(response)
    }
}

fn parse_response(response: GeocodeResponse) -> Result<Option<Location>> {
    match response.status.as_str() {
        "OK" => Ok(response.results.into_iter().next().map(|r| r.geometry.location)),
        "ZERO_RESULTS" => Ok(None),
        other => bail!(
            "Geocoding failed: {} {}",
            other,
            response.error_message.unwrap_or_default()
        ),
    }
}

/// Per-run address lookup cache. Misses and failures are cached too, so an
/// address is sent to the geocoder at most once per run.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: HashMap<String, Option<Location>>,
    hits: usize,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn locate<G: Geocoder>(&mut self, geocoder: &G, address: &str) -> Option<Location> {
        if let Some(location) = self.entries.get(address) {
            info!("Geocoding [cache hit] {}", address);
            self.hits += 1;
            return *location;
        }

        info!("Geocoding {}", address);
        let location = match geocoder.geocode(address).await {
            Ok(location) => {
                if location.is_none() {
                    warn!("No geocoding result for {}", address);
                }
                location
            }
            Err(e) => {
                warn!("Geocoding {} failed: {:#}", address, e);
                None
            }
        };
        self.entries.insert(address.to_string(), location);
        location
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Distinct addresses looked up so far.
    pub fn addresses(&self) -> usize {
        self.entries.len()
    }
}

/// Attach coordinates to each record in order, one lookup at a time.
pub async fn geocode_all<G: Geocoder>(
    records: &mut [Prosecution],
    geocoder: &G,
    cache: &mut GeocodeCache,
    pb: &ProgressBar,
) {
    for record in records.iter_mut() {
        let address = normalize(record.address());
        record.location = cache.locate(geocoder, &address).await;
        pb.inc(1);
    }
}
