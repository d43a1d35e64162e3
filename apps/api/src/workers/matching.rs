//! Scored worker ↔ order matching.
//!
//! One bounded geo query per call (no progressive widening: an empty result is
//! acceptable here), then a weighted score per candidate with tiered distance
//! and availability components.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::geo::round_km;
use crate::models::worker::{OrderStatus, Worker, WorkerOrder};
use crate::store::{MarketStore, StoreError, WorkerOrderQuery, WorkerQuery};

pub const DEFAULT_MATCH_LIMIT: usize = 20;
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;

const W_DISTANCE: f64 = 0.25;
const W_RATING: f64 = 0.25;
const W_EXPERIENCE: f64 = 0.15;
const W_RESPONSE_RATE: f64 = 0.15;
const W_COMPLETED: f64 = 0.10;
const W_AVAILABILITY: f64 = 0.10;

const VERIFIED_MULTIPLIER: f64 = 1.1;
const PRO_MULTIPLIER: f64 = 1.05;

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub limit: usize,
    pub max_distance_km: f64,
    pub min_rating: Option<f64>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_MATCH_LIMIT,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            min_rating: None,
        }
    }
}

/// Per-component scores, each in [0, 1], before weighting.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchBreakdown {
    pub distance: f64,
    pub rating: f64,
    pub experience: f64,
    pub response_rate: f64,
    pub completed_orders: f64,
    pub availability: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchScore {
    pub score: f64,
    pub breakdown: MatchBreakdown,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMatch {
    pub worker: Worker,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub score: f64,
    pub breakdown: MatchBreakdown,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderMatch {
    pub order: WorkerOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub score: f64,
}

/// Tiered distance score. Missing distance (either side unlocated) is neutral.
pub fn distance_score(distance_km: Option<f64>) -> f64 {
    match distance_km {
        None => 0.5,
        Some(d) if d <= 5.0 => 1.0,
        Some(d) if d <= 10.0 => 0.9,
        Some(d) if d <= 20.0 => 0.7,
        Some(d) if d <= 30.0 => 0.5,
        Some(d) if d <= 50.0 => 0.3,
        Some(_) => 0.1,
    }
}

/// Tiered score on hours since the worker was last active.
pub fn availability_score(last_active_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(at) = last_active_at else {
        return 0.2;
    };
    let hours = (now - at).num_minutes() as f64 / 60.0;
    if hours < 1.0 {
        1.0
    } else if hours < 24.0 {
        0.8
    } else if hours < 72.0 {
        0.5
    } else {
        0.2
    }
}

fn unit(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// How well `worker` fits one order, in [0, 1].
///
/// `distance_km` is the worker ↔ order distance when both are located.
pub fn calculate_match_score(
    worker: &Worker,
    distance_km: Option<f64>,
    now: DateTime<Utc>,
) -> MatchScore {
    let breakdown = MatchBreakdown {
        distance: distance_score(distance_km),
        rating: unit(worker.rating / 5.0),
        experience: unit(worker.experience_years / 10.0),
        response_rate: unit(worker.response_rate / 100.0),
        completed_orders: unit(worker.completed_orders_count as f64 / 50.0),
        availability: availability_score(worker.last_active_at, now),
    };

    let mut score = W_DISTANCE * breakdown.distance
        + W_RATING * breakdown.rating
        + W_EXPERIENCE * breakdown.experience
        + W_RESPONSE_RATE * breakdown.response_rate
        + W_COMPLETED * breakdown.completed_orders
        + W_AVAILABILITY * breakdown.availability;

    if worker.is_verified {
        score *= VERIFIED_MULTIPLIER;
    }
    if worker.is_pro {
        score *= PRO_MULTIPLIER;
    }

    MatchScore {
        score: unit(score),
        breakdown,
    }
}

pub struct WorkerMatchingService {
    store: Arc<dyn MarketStore>,
    clock: Arc<dyn Clock>,
}

impl WorkerMatchingService {
    pub fn new(store: Arc<dyn MarketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Active workers in the order's category within `max_distance_km`, best
    /// fit first. Workers who already responded to the order are skipped.
    pub async fn find_matching_workers(
        &self,
        order: &WorkerOrder,
        options: MatchOptions,
    ) -> Result<Vec<WorkerMatch>, StoreError> {
        let responded = self.store.responded_worker_ids(order.id).await?;
        let candidates = self
            .store
            .find_workers(&WorkerQuery {
                center: order.location,
                radius_km: order.location.map(|_| options.max_distance_km),
                category: Some(order.category.clone()),
                min_rating: options.min_rating,
                exclude_ids: responded,
            })
            .await?;

        let now = self.clock.now();
        let mut matches: Vec<WorkerMatch> = candidates
            .into_iter()
            .map(|(worker, distance_km)| {
                let MatchScore { score, breakdown } =
                    calculate_match_score(&worker, distance_km, now);
                WorkerMatch {
                    worker,
                    distance_km: distance_km.map(round_km),
                    score,
                    breakdown,
                }
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(options.limit);

        debug!(
            "Matched {} workers for order {} ({})",
            matches.len(),
            order.id,
            order.category
        );
        Ok(matches)
    }

    /// Open orders in the worker's categories near the worker, scored with the
    /// same formula from the worker's side. Orders already responded to are skipped.
    pub async fn recommend_orders_for_worker(
        &self,
        worker: &Worker,
        options: MatchOptions,
    ) -> Result<Vec<OrderMatch>, StoreError> {
        if worker.categories.is_empty() {
            return Ok(Vec::new());
        }

        let responded = self.store.responded_order_ids(worker.id).await?;
        let orders = self
            .store
            .find_worker_orders(&WorkerOrderQuery {
                center: worker.location,
                radius_km: worker.location.map(|_| options.max_distance_km),
                categories: worker.categories.clone(),
                urgency: None,
                statuses: vec![OrderStatus::Open],
            })
            .await?;

        let now = self.clock.now();
        let mut recommended: Vec<OrderMatch> = orders
            .into_iter()
            .filter(|(order, _)| !responded.contains(&order.id))
            .map(|(order, distance_km)| OrderMatch {
                score: calculate_match_score(worker, distance_km, now).score,
                distance_km: distance_km.map(round_km),
                order,
            })
            .collect();

        // Same worker on every row, so distance and freshness decide.
        recommended.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.order.created_at.cmp(&a.order.created_at))
        });
        recommended.truncate(options.limit);
        Ok(recommended)
    }

    pub async fn recommend_orders_for_worker_id(
        &self,
        worker_id: Uuid,
        options: MatchOptions,
    ) -> Result<Option<Vec<OrderMatch>>, StoreError> {
        match self.store.get_worker(worker_id).await? {
            Some(worker) => Ok(Some(self.recommend_orders_for_worker(&worker, options).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::geo::GeoPoint;
    use crate::models::worker::fixtures::{order, worker};
    use crate::store::InMemoryStore;
    use chrono::{Duration, TimeZone};

    const ORDER_AT: GeoPoint = GeoPoint { lat: 53.9, lng: 27.5 };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
    }

    fn north(km: f64) -> GeoPoint {
        GeoPoint {
            lat: ORDER_AT.lat + km / 111.2,
            lng: ORDER_AT.lng,
        }
    }

    fn perfect_worker() -> Worker {
        Worker {
            rating: 5.0,
            experience_years: 25.0,
            response_rate: 100.0,
            completed_orders_count: 500,
            last_active_at: Some(now()),
            is_verified: true,
            is_pro: true,
            ..worker("plumbing", Some(ORDER_AT))
        }
    }

    fn service(store: Arc<InMemoryStore>) -> WorkerMatchingService {
        WorkerMatchingService::new(store, Arc::new(ManualClock::new(now())))
    }

    #[test]
    fn test_distance_tiers() {
        assert_eq!(distance_score(Some(0.0)), 1.0);
        assert_eq!(distance_score(Some(5.0)), 1.0);
        assert_eq!(distance_score(Some(7.5)), 0.9);
        assert_eq!(distance_score(Some(20.0)), 0.7);
        assert_eq!(distance_score(Some(30.0)), 0.5);
        assert_eq!(distance_score(Some(50.0)), 0.3);
        assert_eq!(distance_score(Some(50.1)), 0.1);
        assert_eq!(distance_score(None), 0.5);
    }

    #[test]
    fn test_availability_tiers() {
        let at = now();
        assert_eq!(availability_score(Some(at - Duration::minutes(30)), at), 1.0);
        assert_eq!(availability_score(Some(at - Duration::hours(5)), at), 0.8);
        assert_eq!(availability_score(Some(at - Duration::hours(48)), at), 0.5);
        assert_eq!(availability_score(Some(at - Duration::days(10)), at), 0.2);
        assert_eq!(availability_score(None, at), 0.2);
    }

    #[test]
    fn test_weighted_formula() {
        let w = Worker {
            rating: 4.0,
            experience_years: 5.0,
            response_rate: 80.0,
            completed_orders_count: 25,
            last_active_at: Some(now() - Duration::hours(2)),
            ..worker("plumbing", None)
        };
        let m = calculate_match_score(&w, Some(8.0), now());
        // 0.25*0.9 + 0.25*0.8 + 0.15*0.5 + 0.15*0.8 + 0.10*0.5 + 0.10*0.8
        assert!((m.score - 0.75).abs() < 1e-9);
        assert_eq!(m.breakdown.distance, 0.9);
    }

    #[test]
    fn test_multipliers_capped_at_one() {
        let m = calculate_match_score(&perfect_worker(), Some(1.0), now());
        assert_eq!(m.score, 1.0);

        let verified = Worker {
            is_pro: false,
            ..worker("plumbing", None)
        };
        let plain = calculate_match_score(&verified, None, now()).score;
        let boosted = calculate_match_score(
            &Worker {
                is_verified: true,
                ..verified.clone()
            },
            None,
            now(),
        )
        .score;
        assert!((boosted - plain * 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_match_score_bounded_for_out_of_range_inputs() {
        let extremes = [
            Worker {
                rating: -3.0,
                experience_years: -1.0,
                response_rate: -50.0,
                completed_orders_count: -4,
                ..worker("x", None)
            },
            Worker {
                rating: f64::NAN,
                response_rate: f64::INFINITY,
                is_verified: true,
                is_pro: true,
                ..worker("x", None)
            },
            perfect_worker(),
        ];
        for w in &extremes {
            for d in [None, Some(0.0), Some(1000.0)] {
                let s = calculate_match_score(w, d, now()).score;
                assert!((0.0..=1.0).contains(&s), "score {s} out of bounds");
            }
        }
    }

    #[tokio::test]
    async fn test_find_matching_workers_filters_and_orders() {
        let store = Arc::new(InMemoryStore::new());
        let near = Worker {
            rating: 4.5,
            ..worker("plumbing", Some(north(2.0)))
        };
        let far = Worker {
            rating: 4.5,
            ..worker("plumbing", Some(north(40.0)))
        };
        let out_of_range = worker("plumbing", Some(north(80.0)));
        let wrong_category = worker("cleaning", Some(north(1.0)));
        let inactive = Worker {
            is_active: false,
            ..worker("plumbing", Some(north(1.0)))
        };
        let responded = worker("plumbing", Some(north(1.0)));
        for w in [&near, &far, &out_of_range, &wrong_category, &inactive, &responded] {
            store.insert_worker(w.clone());
        }
        let o = order("plumbing", Some(ORDER_AT));
        store.insert_order(o.clone());
        store.invite(o.id, responded.id, Some(12.0));

        let matches = service(store)
            .find_matching_workers(&o, MatchOptions::default())
            .await
            .unwrap();
        let ids: Vec<Uuid> = matches.iter().map(|m| m.worker.id).collect();
        assert_eq!(ids, vec![near.id, far.id]);
        assert!(matches[0].score > matches[1].score);
        assert_eq!(matches[0].distance_km, Some(2.0));
    }

    #[tokio::test]
    async fn test_min_rating_and_limit() {
        let store = Arc::new(InMemoryStore::new());
        for rating in [2.0, 3.5, 4.0, 4.8] {
            store.insert_worker(Worker {
                rating,
                ..worker("plumbing", Some(north(1.0)))
            });
        }
        let o = order("plumbing", Some(ORDER_AT));
        let matches = service(store)
            .find_matching_workers(
                &o,
                MatchOptions {
                    limit: 2,
                    min_rating: Some(3.5),
                    ..MatchOptions::default()
                },
            )
            .await
            .unwrap();
        let ratings: Vec<f64> = matches.iter().map(|m| m.worker.rating).collect();
        assert_eq!(ratings, vec![4.8, 4.0]);
    }

    #[tokio::test]
    async fn test_unlocated_order_matches_without_radius() {
        let store = Arc::new(InMemoryStore::new());
        let w = worker("plumbing", Some(north(300.0)));
        store.insert_worker(w.clone());

        let matches = service(store)
            .find_matching_workers(&order("plumbing", None), MatchOptions::default())
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].breakdown.distance, 0.5);
        assert_eq!(matches[0].distance_km, None);
    }

    #[tokio::test]
    async fn test_recommend_orders_for_worker() {
        let store = Arc::new(InMemoryStore::new());
        let w = worker("plumbing", Some(ORDER_AT));
        store.insert_worker(w.clone());

        let close = order("plumbing", Some(north(3.0)));
        let distant = order("plumbing", Some(north(25.0)));
        let closed = WorkerOrder {
            status: OrderStatus::Completed,
            ..order("plumbing", Some(north(1.0)))
        };
        let other = order("cleaning", Some(north(1.0)));
        let answered = order("plumbing", Some(north(1.0)));
        for o in [&close, &distant, &closed, &other, &answered] {
            store.insert_order(o.clone());
        }
        store.invite(answered.id, w.id, Some(5.0));

        let svc = service(store);
        let recs = svc
            .recommend_orders_for_worker_id(w.id, MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        let ids: Vec<Uuid> = recs.iter().map(|r| r.order.id).collect();
        assert_eq!(ids, vec![close.id, distant.id]);

        let missing = svc
            .recommend_orders_for_worker_id(Uuid::new_v4(), MatchOptions::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
