use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    Draft,
    Active,
    Sold,
    Archived,
}

impl FromStr for AdStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(AdStatus::Draft),
            "active" => Ok(AdStatus::Active),
            "sold" => Ok(AdStatus::Sold),
            "archived" => Ok(AdStatus::Archived),
            other => Err(format!("unknown ad status '{other}'")),
        }
    }
}

/// A classified ad as read from the store. The feed never mutates ads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: String,
    pub photos: Vec<String>,
    pub category_id: String,
    pub location: Option<GeoPoint>,
    pub is_farmer_ad: bool,
    pub is_free_giveaway: bool,
    pub created_at: DateTime<Utc>,
    pub views: i64,
    pub status: AdStatus,
}

/// An ad annotated with its distance from the requesting location.
/// `distanceKm` is omitted entirely when no distance could be computed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NearbyAd {
    #[serde(flatten)]
    pub ad: Ad,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// Ordering requested by the caller for non-distance phases.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdSort {
    #[default]
    Newest,
    Popular,
    PriceAsc,
}

impl AdSort {
    pub fn compare(&self, a: &Ad, b: &Ad) -> std::cmp::Ordering {
        match self {
            AdSort::Newest => b.created_at.cmp(&a.created_at),
            AdSort::Popular => b
                .views
                .cmp(&a.views)
                .then_with(|| b.created_at.cmp(&a.created_at)),
            AdSort::PriceAsc => {
                let pa = a.price.unwrap_or(f64::MAX);
                let pb = b.price.unwrap_or(f64::MAX);
                pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
            }
        }
    }
}

/// Structured category-style constraint on ads. Every populated field must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdFilter {
    /// Any-of match on category id. Empty means any category.
    pub category_ids: Vec<String>,
    pub is_farmer_ad: Option<bool>,
    pub is_free_giveaway: Option<bool>,
}

/// Full ad predicate: the category constraint AND the keyword constraint.
/// Only active ads are ever matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdQuery {
    pub filter: AdFilter,
    /// Case-insensitive OR-match against title and description. Empty means any.
    pub keywords: Vec<String>,
}

impl AdQuery {
    pub fn categories(ids: &[&str]) -> Self {
        Self {
            filter: AdFilter {
                category_ids: ids.iter().map(|s| s.to_string()).collect(),
                ..AdFilter::default()
            },
            keywords: Vec::new(),
        }
    }

    pub fn farmer() -> Self {
        Self {
            filter: AdFilter {
                is_farmer_ad: Some(true),
                ..AdFilter::default()
            },
            keywords: Vec::new(),
        }
    }

    pub fn matches(&self, ad: &Ad) -> bool {
        if ad.status != AdStatus::Active {
            return false;
        }
        let f = &self.filter;
        if !f.category_ids.is_empty() && !f.category_ids.iter().any(|c| *c == ad.category_id) {
            return false;
        }
        if f.is_farmer_ad.is_some_and(|v| v != ad.is_farmer_ad) {
            return false;
        }
        if f.is_free_giveaway.is_some_and(|v| v != ad.is_free_giveaway) {
            return false;
        }
        if self.keywords.is_empty() {
            return true;
        }
        let title = ad.title.to_lowercase();
        let description = ad.description.as_deref().unwrap_or("").to_lowercase();
        self.keywords.iter().any(|kw| {
            let kw = kw.to_lowercase();
            title.contains(&kw) || description.contains(&kw)
        })
    }
}
