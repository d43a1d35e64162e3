//! Weighted-evidence scoring for zone classification.
//!
//! Pure functions over already-fetched signals; the classifier owns all I/O.

use std::f64::consts::PI;

use crate::geocoding::PlaceTags;
use crate::zones::{Zone, ZoneScores};

/// Radius of the ad-density sample around the user.
pub const DENSITY_RADIUS_KM: f64 = 5.0;

pub const SERVICE_CATEGORIES: [&str; 3] = ["uslugi", "remont", "cleaning"];
pub const BEAUTY_CATEGORIES: [&str; 3] = ["beauty", "barber", "manicure"];

/// Confidence reported when no evidence was found at all.
pub const NO_EVIDENCE_CONFIDENCE: f64 = 0.33;

/// Active-ad counts within [`DENSITY_RADIUS_KM`] of the user.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DensitySignals {
    pub total_ads: u64,
    pub farmer_ads: u64,
    pub service_ads: u64,
    pub beauty_ads: u64,
}

impl DensitySignals {
    fn ratio(&self, part: u64) -> f64 {
        if self.total_ads == 0 {
            0.0
        } else {
            part as f64 / self.total_ads as f64
        }
    }

    pub fn farmer_ratio(&self) -> f64 {
        self.ratio(self.farmer_ads)
    }

    pub fn service_ratio(&self) -> f64 {
        self.ratio(self.service_ads)
    }

    pub fn beauty_ratio(&self) -> f64 {
        self.ratio(self.beauty_ads)
    }

    /// Active ads per km² over the sample disc.
    pub fn density_per_km2(&self) -> f64 {
        self.total_ads as f64 / (PI * DENSITY_RADIUS_KM * DENSITY_RADIUS_KM)
    }
}

fn present(tag: &Option<String>) -> bool {
    tag.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Awards points for explicit address tags, then a second, smaller bonus for
/// the resolved place type.
pub fn score_place_tags(tags: &PlaceTags, scores: &mut ZoneScores) {
    let a = &tags.address;
    let has_village = present(&a.village) || present(&a.hamlet);
    let has_suburb = present(&a.suburb) || present(&a.neighbourhood);
    let has_city = present(&a.city);

    if has_village {
        scores.village += 40.0;
    }
    if has_city && !has_suburb {
        scores.city_center += 30.0;
    }
    // A suburb of a city leans both ways.
    if has_suburb {
        scores.suburb += 25.0;
        scores.city_center += 15.0;
    }

    match tags.place_type.as_deref() {
        Some("village") | Some("hamlet") => scores.village += 30.0,
        Some("suburb") | Some("neighbourhood") => scores.suburb += 30.0,
        Some("city") | Some("city_district") => scores.city_center += 30.0,
        Some("town") => {
            scores.suburb += 15.0;
            scores.city_center += 15.0;
        }
        _ => {}
    }
}

pub fn score_density(signals: &DensitySignals, scores: &mut ZoneScores) {
    let density = signals.density_per_km2();
    if density > 50.0 {
        scores.city_center += 20.0;
    } else if density > 10.0 {
        scores.suburb += 15.0;
        scores.city_center += 5.0;
    } else if density < 5.0 {
        scores.village += 15.0;
    }

    let farmer = signals.farmer_ratio();
    if farmer > 0.30 {
        scores.village += 25.0;
    } else if farmer > 0.15 {
        scores.suburb += 10.0;
        scores.village += 10.0;
    }

    let beauty = signals.beauty_ratio();
    if beauty > 0.10 {
        scores.city_center += 20.0;
    } else if beauty > 0.05 {
        scores.suburb += 10.0;
        scores.city_center += 5.0;
    }

    if signals.service_ratio() > 0.25 {
        scores.suburb += 15.0;
        scores.city_center += 10.0;
    }
}

/// Picks the winning zone. Village wins ties with suburb and city; city wins
/// ties with suburb. Confidence is the winner's share of all evidence, rounded
/// to two decimals.
pub fn pick_zone(scores: &ZoneScores) -> (Zone, f64) {
    let zone = if scores.village >= scores.suburb && scores.village >= scores.city_center {
        Zone::Village
    } else if scores.city_center >= scores.suburb {
        Zone::CityCenter
    } else {
        Zone::Suburb
    };

    let total = scores.total();
    let confidence = if total > 0.0 {
        ((scores.get(zone) / total) * 100.0).round() / 100.0
    } else {
        NO_EVIDENCE_CONFIDENCE
    };

    (zone, confidence.clamp(0.0, 1.0))
}
