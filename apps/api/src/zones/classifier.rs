//! GeoZoneClassifier: infers village / suburb / city_center for a location.
//!
//! Combines reverse-geocoded place tags with local ad-density signals (see
//! `zones::scoring`). Results are cached per geohash-5 bucket for 30 minutes.
//! Any upstream failure degrades to a suburb/0.5 fallback instead of an error:
//! the zone only picks a feed layout.

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::GeoCache;
use crate::clock::Clock;
use crate::geo::GeoPoint;
use crate::geocoding::{GeocodeError, PlaceTags, ReverseGeocoder};
use crate::models::ad::AdQuery;
use crate::store::{MarketStore, StoreError};
use crate::zones::scoring::{
    pick_zone, score_density, score_place_tags, DensitySignals, BEAUTY_CATEGORIES,
    DENSITY_RADIUS_KM, SERVICE_CATEGORIES,
};
use crate::zones::{Zone, ZoneClassification, ZoneDiagnostics, ZoneScores, ZoneSource};

pub const CACHE_TTL_MINUTES: i64 = 30;
pub const CACHE_MAX_ENTRIES: usize = 1000;
pub const GEOHASH_PRECISION: usize = 5;

const FALLBACK_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Error)]
enum SignalError {
    #[error("reverse geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("density aggregation failed: {0}")]
    Store(#[from] StoreError),
}

pub struct GeoZoneClassifier {
    geocoder: Arc<dyn ReverseGeocoder>,
    store: Arc<dyn MarketStore>,
    cache: GeoCache<ZoneClassification>,
}

impl GeoZoneClassifier {
    pub fn new(
        geocoder: Arc<dyn ReverseGeocoder>,
        store: Arc<dyn MarketStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            geocoder,
            store,
            cache: GeoCache::new(
                Duration::minutes(CACHE_TTL_MINUTES),
                CACHE_MAX_ENTRIES,
                clock,
            ),
        }
    }

    /// Classifies the neighbourhood around `point`. Never fails.
    pub async fn classify(&self, point: GeoPoint) -> ZoneClassification {
        let key = point.geohash(GEOHASH_PRECISION);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Zone cache hit for {key}");
            return hit;
        }

        match self.compute(point, &key).await {
            Ok(classification) => {
                self.cache.insert(key, classification.clone());
                classification
            }
            Err(e) => {
                warn!(
                    "Zone classification failed at {},{}: {e}; using fallback",
                    point.lat, point.lng
                );
                fallback(&key, &e.to_string())
            }
        }
    }

    /// Debug override: skips scoring and the cache entirely.
    pub fn force_zone(&self, zone: Zone) -> ZoneClassification {
        forced(zone)
    }

    async fn compute(&self, point: GeoPoint, key: &str) -> Result<ZoneClassification, SignalError> {
        let (tags, signals) = tokio::try_join!(
            async { Ok::<PlaceTags, SignalError>(self.geocoder.resolve(point).await?) },
            async { Ok::<DensitySignals, SignalError>(self.density(point).await?) },
        )?;

        let mut scores = ZoneScores::default();
        score_place_tags(&tags, &mut scores);
        score_density(&signals, &mut scores);
        let (zone, confidence) = pick_zone(&scores);

        debug!(
            "Classified {key} as {zone} ({confidence}) scores={:?}",
            scores
        );

        Ok(ZoneClassification {
            zone,
            confidence,
            scores,
            source: ZoneSource::Classifier,
            diagnostics: ZoneDiagnostics {
                geohash: Some(key.to_string()),
                place_type: tags.place_type,
                place_label: tags.label,
                city: tags.city,
                total_ads: signals.total_ads,
                farmer_ads: signals.farmer_ads,
                service_ads: signals.service_ads,
                beauty_ads: signals.beauty_ads,
                farmer_ratio: signals.farmer_ratio(),
                service_ratio: signals.service_ratio(),
                beauty_ratio: signals.beauty_ratio(),
                density_per_km2: signals.density_per_km2(),
                error: None,
            },
        })
    }

    /// Runs the four density counts concurrently.
    async fn density(&self, point: GeoPoint) -> Result<DensitySignals, StoreError> {
        let all = AdQuery::default();
        let farmer = AdQuery::farmer();
        let services = AdQuery::categories(&SERVICE_CATEGORIES);
        let beauty = AdQuery::categories(&BEAUTY_CATEGORIES);
        let store = self.store.as_ref();

        let (total_ads, farmer_ads, service_ads, beauty_ads) = tokio::try_join!(
            store.count_ads_near(&all, point, DENSITY_RADIUS_KM),
            store.count_ads_near(&farmer, point, DENSITY_RADIUS_KM),
            store.count_ads_near(&services, point, DENSITY_RADIUS_KM),
            store.count_ads_near(&beauty, point, DENSITY_RADIUS_KM),
        )?;

        Ok(DensitySignals {
            total_ads,
            farmer_ads,
            service_ads,
            beauty_ads,
        })
    }
}

pub fn forced(zone: Zone) -> ZoneClassification {
    ZoneClassification {
        zone,
        confidence: 1.0,
        scores: ZoneScores::default(),
        source: ZoneSource::Manual,
        diagnostics: ZoneDiagnostics::default(),
    }
}

fn fallback(key: &str, error: &str) -> ZoneClassification {
    ZoneClassification {
        zone: Zone::Suburb,
        confidence: FALLBACK_CONFIDENCE,
        scores: ZoneScores::default(),
        source: ZoneSource::Fallback,
        diagnostics: ZoneDiagnostics {
            geohash: Some(key.to_string()),
            error: Some(error.to_string()),
            ..ZoneDiagnostics::default()
        },
    }
}
