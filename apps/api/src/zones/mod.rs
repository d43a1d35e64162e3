//! Neighbourhood zones and their classification.

pub mod classifier;
pub mod handlers;
pub mod scoring;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Village,
    Suburb,
    CityCenter,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Village, Zone::Suburb, Zone::CityCenter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Village => "village",
            Zone::Suburb => "suburb",
            Zone::CityCenter => "city_center",
        }
    }

    pub fn descriptor(&self) -> ZoneDescriptor {
        let (title, description, icon, accent_color) = match self {
            Zone::Village => (
                "Village",
                "Farm produce, garden help and machinery from neighbours",
                "🌾",
                "#4CAF50",
            ),
            Zone::Suburb => (
                "Suburb",
                "A mix of local services, family goods and weekend fairs",
                "🏡",
                "#FF9800",
            ),
            Zone::CityCenter => (
                "City center",
                "Shops, beauty, bloggers and what is trending around you",
                "🏙️",
                "#3F51B5",
            ),
        };
        ZoneDescriptor {
            id: *self,
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            accent_color: accent_color.to_string(),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("unknown zone '{0}' (expected village, suburb or city_center)")]
pub struct UnknownZone(pub String);

impl FromStr for Zone {
    type Err = UnknownZone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "village" => Ok(Zone::Village),
            "suburb" => Ok(Zone::Suburb),
            "city_center" => Ok(Zone::CityCenter),
            other => Err(UnknownZone(other.to_string())),
        }
    }
}

/// Static display metadata for a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDescriptor {
    pub id: Zone,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub accent_color: String,
}

/// Accumulated evidence per zone.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoneScores {
    pub village: f64,
    pub suburb: f64,
    pub city_center: f64,
}

impl ZoneScores {
    pub fn total(&self) -> f64 {
        self.village + self.suburb + self.city_center
    }

    pub fn get(&self, zone: Zone) -> f64 {
        match zone {
            Zone::Village => self.village,
            Zone::Suburb => self.suburb,
            Zone::CityCenter => self.city_center,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSource {
    Classifier,
    Manual,
    Fallback,
}

/// Signals that fed a classification, kept for the debug endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDiagnostics {
    pub geohash: Option<String>,
    pub place_type: Option<String>,
    pub place_label: Option<String>,
    pub city: Option<String>,
    pub total_ads: u64,
    pub farmer_ads: u64,
    pub service_ads: u64,
    pub beauty_ads: u64,
    pub farmer_ratio: f64,
    pub service_ratio: f64,
    pub beauty_ratio: f64,
    pub density_per_km2: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneClassification {
    pub zone: Zone,
    pub confidence: f64,
    pub scores: ZoneScores,
    pub source: ZoneSource,
    pub diagnostics: ZoneDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_round_trips_through_str() {
        for zone in Zone::ALL {
            assert_eq!(zone.as_str().parse::<Zone>().unwrap(), zone);
        }
    }

    #[test]
    fn test_unknown_zone_names_the_value() {
        let err = "downtown".parse::<Zone>().unwrap_err();
        assert_eq!(err, UnknownZone("downtown".to_string()));
        assert!(err.to_string().contains("downtown"));
    }

    #[test]
    fn test_zone_is_not_coerced() {
        assert!("City_Center".parse::<Zone>().is_err());
        assert!("city".parse::<Zone>().is_err());
    }

    #[test]
    fn test_zone_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(Zone::CityCenter).unwrap(),
            serde_json::json!("city_center")
        );
    }
}
