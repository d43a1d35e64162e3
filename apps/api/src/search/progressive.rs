//! Progressive-radius ad search.
//!
//! Widens a nearest-first geo query through fixed radius steps until enough ads
//! are found, then pads from an unbounded query if the neighbourhood is sparse.
//! Steps run sequentially so dense areas stop after one or two queries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::geo::{haversine_km, round_km, GeoPoint};
use crate::models::ad::{AdQuery, AdSort, NearbyAd};
use crate::store::{MarketStore, StoreError};

pub const DEFAULT_RADIUS_STEPS_KM: [f64; 7] = [0.3, 0.5, 1.0, 5.0, 10.0, 20.0, 50.0];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiusSearchOptions {
    pub min_items: usize,
    pub max_items: usize,
    pub sort: AdSort,
    /// Increasing radii in km.
    pub radius_steps: Vec<f64>,
}

impl Default for RadiusSearchOptions {
    fn default() -> Self {
        Self {
            min_items: 6,
            max_items: 30,
            sort: AdSort::Newest,
            radius_steps: DEFAULT_RADIUS_STEPS_KM.to_vec(),
        }
    }
}

/// Fetches up to `max_items` ads matching `query`, nearest first.
///
/// Algorithm:
/// 1. For each radius step, query nearest-first within that radius, skipping ads
///    already collected. Stop as soon as `min_items` (or `max_items`) is reached.
/// 2. If still short of `min_items`, pad from a global query in caller's sort order,
///    computing haversine distance for padding ads that carry a location.
/// 3. Re-sort ascending by distance (unknown distance last) and truncate.
///
/// With no usable `center` the geo phase is skipped and the result is exactly
/// [`fetch_ads_global`].
pub async fn fetch_ads_progressive_radius(
    store: &dyn MarketStore,
    center: Option<GeoPoint>,
    query: &AdQuery,
    options: &RadiusSearchOptions,
) -> Result<Vec<NearbyAd>, StoreError> {
    let Some(center) = center else {
        return fetch_ads_global(store, query, options.sort, options.max_items).await;
    };
    if options.max_items == 0 {
        return Ok(Vec::new());
    }

    let mut steps = options.radius_steps.clone();
    steps.retain(|r| r.is_finite() && *r > 0.0);
    steps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut collected: Vec<NearbyAd> = Vec::new();

    for radius in steps {
        let remaining = options.max_items - collected.len();
        let hits = store
            .find_ads_near(query, center, radius, &seen, remaining)
            .await?;

        let mut batch: Vec<NearbyAd> = hits
            .into_iter()
            .filter(|(ad, _)| seen.insert(ad.id))
            .map(|(ad, d)| NearbyAd {
                ad,
                distance_km: Some(round_km(d)),
            })
            .collect();
        batch.sort_by(|a, b| compare_nearby(a, b, options.sort));
        collected.extend(batch);

        debug!(
            "Radius step {radius}km → {} ads collected (min {}, max {})",
            collected.len(),
            options.min_items,
            options.max_items
        );

        if collected.len() >= options.min_items || collected.len() >= options.max_items {
            break;
        }
    }

    if collected.len() < options.min_items {
        let remaining = options.max_items - collected.len();
        let padding = store
            .find_ads(query, options.sort, &seen, remaining)
            .await?;
        debug!("Global fallback padded {} ads", padding.len());
        collected.extend(padding.into_iter().filter(|ad| seen.insert(ad.id)).map(|ad| {
            let distance_km = ad
                .location
                .map(|loc| round_km(haversine_km(&center, &loc)));
            NearbyAd { ad, distance_km }
        }));
    }

    // Stable sort: equal distances keep their per-step caller ordering.
    collected.sort_by(|a, b| compare_distance(a.distance_km, b.distance_km));
    collected.truncate(options.max_items);
    Ok(collected)
}

/// Non-geo query in caller's sort order. No distance is attached.
pub async fn fetch_ads_global(
    store: &dyn MarketStore,
    query: &AdQuery,
    sort: AdSort,
    max_items: usize,
) -> Result<Vec<NearbyAd>, StoreError> {
    if max_items == 0 {
        return Ok(Vec::new());
    }
    let ads = store.find_ads(query, sort, &HashSet::new(), max_items).await?;
    Ok(ads
        .into_iter()
        .map(|ad| NearbyAd {
            ad,
            distance_km: None,
        })
        .collect())
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_nearby(a: &NearbyAd, b: &NearbyAd, sort: AdSort) -> std::cmp::Ordering {
    compare_distance(a.distance_km, b.distance_km).then_with(|| sort.compare(&a.ad, &b.ad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ad::fixtures::ad;
    use crate::store::InMemoryStore;

    const CENTER: GeoPoint = GeoPoint { lat: 53.9, lng: 27.5 };

    /// A point roughly `km` north of the test center.
    fn north(km: f64) -> GeoPoint {
        GeoPoint {
            lat: CENTER.lat + km / 111.2,
            lng: CENTER.lng,
        }
    }

    fn options(min: usize, max: usize, steps: &[f64]) -> RadiusSearchOptions {
        RadiusSearchOptions {
            min_items: min,
            max_items: max,
            sort: AdSort::Newest,
            radius_steps: steps.to_vec(),
        }
    }

    fn seed(store: &InMemoryStore, distances: &[f64]) {
        for (i, d) in distances.iter().enumerate() {
            store.insert_ad(ad(&format!("ad-{i}"), Some(north(*d))));
        }
    }

    #[tokio::test]
    async fn test_stops_at_first_step_reaching_min_items() {
        let store = InMemoryStore::new();
        // 2 ads within 0.3km, 5 more between 0.5km and 1km
        seed(&store, &[0.1, 0.2, 0.6, 0.7, 0.8, 0.9, 0.95]);

        let result = fetch_ads_progressive_radius(
            &store,
            Some(CENTER),
            &AdQuery::default(),
            &options(6, 30, &[0.3, 0.5, 1.0]),
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 7);
        assert_eq!(store.near_query_radii(), vec![0.3, 0.5, 1.0]);
        assert_eq!(store.global_query_count(), 0);
        let distances: Vec<f64> = result.iter().map(|a| a.distance_km.unwrap()).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]), "{distances:?}");
    }

    #[tokio::test]
    async fn test_dense_area_issues_single_query() {
        let store = InMemoryStore::new();
        seed(&store, &[0.05, 0.1, 0.15, 0.2, 0.25, 0.28]);

        fetch_ads_progressive_radius(
            &store,
            Some(CENTER),
            &AdQuery::default(),
            &RadiusSearchOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(store.near_query_radii(), vec![0.3]);
    }

    #[tokio::test]
    async fn test_earlier_steps_precede_later_steps() {
        let store = InMemoryStore::new();
        seed(&store, &[4.0, 0.2, 0.9, 0.4]);

        let result = fetch_ads_progressive_radius(
            &store,
            Some(CENTER),
            &AdQuery::default(),
            &options(10, 30, &[0.3, 0.5, 1.0, 5.0]),
        )
        .await
        .unwrap();

        let titles: Vec<&str> = result.iter().map(|a| a.ad.title.as_str()).collect();
        assert_eq!(titles, vec!["ad-1", "ad-3", "ad-2", "ad-0"]);
    }

    #[tokio::test]
    async fn test_sparse_area_falls_back_to_global_without_duplicates() {
        let store = InMemoryStore::new();
        seed(&store, &[0.2, 80.0, 150.0]);
        store.insert_ad(ad("no-location", None));

        let result = fetch_ads_progressive_radius(
            &store,
            Some(CENTER),
            &AdQuery::default(),
            &options(6, 10, &[0.3, 0.5, 1.0]),
        )
        .await
        .unwrap();

        // min(maxItems, total matching) = 4
        assert_eq!(result.len(), 4);
        let ids: HashSet<Uuid> = result.iter().map(|a| a.ad.id).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(store.global_query_count(), 1);

        // padding ads with a location get haversine distance; others sort last
        assert_eq!(result[0].ad.title, "ad-0");
        assert!((result[1].distance_km.unwrap() - 80.0).abs() < 1.0);
        assert_eq!(result[3].ad.title, "no-location");
        assert!(result[3].distance_km.is_none());
    }

    #[tokio::test]
    async fn test_fallback_respects_max_items() {
        let store = InMemoryStore::new();
        seed(&store, &[100.0, 110.0, 120.0, 130.0]);

        let result = fetch_ads_progressive_radius(
            &store,
            Some(CENTER),
            &AdQuery::default(),
            &options(6, 2, &[1.0]),
        )
        .await
        .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_non_finite_location_equals_global_fetch() {
        let store = InMemoryStore::new();
        seed(&store, &[0.1, 0.2, 3.0]);

        let center = GeoPoint::new(f64::NAN, f64::NAN);
        let progressive = fetch_ads_progressive_radius(
            &store,
            center,
            &AdQuery::default(),
            &RadiusSearchOptions::default(),
        )
        .await
        .unwrap();
        let global = fetch_ads_global(&store, &AdQuery::default(), AdSort::Newest, 30)
            .await
            .unwrap();

        assert_eq!(progressive, global);
        assert!(progressive.iter().all(|a| a.distance_km.is_none()));
        assert!(store.near_query_radii().is_empty());
    }

    #[tokio::test]
    async fn test_filter_applies_in_every_phase() {
        let store = InMemoryStore::new();
        let mut farmer = ad("milk", Some(north(0.1)));
        farmer.is_farmer_ad = true;
        store.insert_ad(farmer);
        let mut far_farmer = ad("eggs", Some(north(300.0)));
        far_farmer.is_farmer_ad = true;
        store.insert_ad(far_farmer);
        store.insert_ad(ad("phone", Some(north(0.2))));

        let result = fetch_ads_progressive_radius(
            &store,
            Some(CENTER),
            &AdQuery::farmer(),
            &options(6, 30, &[0.3, 1.0]),
        )
        .await
        .unwrap();

        let titles: Vec<&str> = result.iter().map(|a| a.ad.title.as_str()).collect();
        assert_eq!(titles, vec!["milk", "eggs"]);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = InMemoryStore::new();
        store.fail_ad_queries(true);
        let result = fetch_ads_progressive_radius(
            &store,
            Some(CENTER),
            &AdQuery::default(),
            &RadiusSearchOptions::default(),
        )
        .await;
        assert!(result.is_err());
    }
}
