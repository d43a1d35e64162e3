//! Reverse geocoding: resolves a coordinate to place tags.
//!
//! The classifier is the only consumer. Callers must treat every error as
//! "no place evidence"; nothing downstream depends on the geocoder being up.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::geo::GeoPoint;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder returned status {status}")]
    Status { status: u16 },

    #[error("no place found at {lat},{lng}")]
    NotFound { lat: f64, lng: f64 },
}

/// Address components relevant to neighbourhood classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressTags {
    pub village: Option<String>,
    pub hamlet: Option<String>,
    pub suburb: Option<String>,
    pub neighbourhood: Option<String>,
    pub town: Option<String>,
    pub city: Option<String>,
    pub city_district: Option<String>,
}

impl AddressTags {
    /// The most specific populated address key, used when the geocoder does not
    /// report a place type itself.
    pub fn most_specific_type(&self) -> Option<&'static str> {
        [
            ("hamlet", &self.hamlet),
            ("village", &self.village),
            ("neighbourhood", &self.neighbourhood),
            ("suburb", &self.suburb),
            ("city_district", &self.city_district),
            ("town", &self.town),
            ("city", &self.city),
        ]
        .into_iter()
        .find(|(_, v)| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
        .map(|(k, _)| k)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceTags {
    pub label: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub place_type: Option<String>,
    pub address: AddressTags,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn resolve(&self, point: GeoPoint) -> Result<PlaceTags, GeocodeError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Nominatim
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    addresstype: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    village: Option<String>,
    hamlet: Option<String>,
    suburb: Option<String>,
    neighbourhood: Option<String>,
    town: Option<String>,
    city: Option<String>,
    city_district: Option<String>,
    country_code: Option<String>,
}

impl NominatimResponse {
    fn into_place_tags(self) -> PlaceTags {
        let a = self.address;
        let address = AddressTags {
            village: a.village,
            hamlet: a.hamlet,
            suburb: a.suburb,
            neighbourhood: a.neighbourhood,
            town: a.town,
            city: a.city,
            city_district: a.city_district,
        };
        let place_type = self
            .addresstype
            .or_else(|| address.most_specific_type().map(str::to_string));
        let city = address
            .city
            .clone()
            .or_else(|| address.town.clone())
            .or_else(|| address.village.clone());
        PlaceTags {
            label: self.display_name,
            city,
            country_code: a.country_code.map(|c| c.to_uppercase()),
            place_type,
            address,
        }
    }
}

/// Nominatim-compatible reverse geocoder over HTTP.
#[derive(Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(base_url: String, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn resolve(&self, point: GeoPoint) -> Result<PlaceTags, GeocodeError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", point.lat.to_string()),
                ("lon", point.lng.to_string()),
                ("format", "jsonv2".to_string()),
                ("zoom", "16".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        let body: NominatimResponse = response.json().await?;
        if body.error.is_some() {
            return Err(GeocodeError::NotFound {
                lat: point.lat,
                lng: point.lng,
            });
        }

        let tags = body.into_place_tags();
        debug!(
            "Reverse geocoded {},{} → {:?}",
            point.lat, point.lng, tags.place_type
        );
        Ok(tags)
    }
}
