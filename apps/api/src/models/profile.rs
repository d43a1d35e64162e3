use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SellerRole {
    Shop,
    Blogger,
    Farmer,
}

impl SellerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellerRole::Shop => "shop",
            SellerRole::Blogger => "blogger",
            SellerRole::Farmer => "farmer",
        }
    }
}

impl FromStr for SellerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shop" => Ok(SellerRole::Shop),
            "blogger" => Ok(SellerRole::Blogger),
            "farmer" => Ok(SellerRole::Farmer),
            other => Err(format!("unknown seller role '{other}'")),
        }
    }
}

/// Public seller profile surfaced by the shops and bloggers blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SellerProfile {
    pub id: Uuid,
    pub display_name: String,
    pub role: SellerRole,
    pub avatar_url: Option<String>,
    pub location: Option<GeoPoint>,
    pub active_ads_count: i64,
    pub rating: Option<f64>,
}

/// Aggregated search-log entry: how often a term was searched nearby.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DemandTerm {
    pub query: String,
    pub count: i64,
}

/// A seasonal fair or market event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fair {
    pub id: Uuid,
    pub title: String,
    pub city: Option<String>,
    pub location: Option<GeoPoint>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub cover_url: Option<String>,
}

impl Fair {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at <= self.ends_at
    }
}
