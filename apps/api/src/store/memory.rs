//! In-process [`MarketStore`] over plain vectors.
//!
//! Test double mirroring the Postgres backend's semantics.
//! Records which geo radii were queried and can be told to fail, so callers'
//! degradation paths are observable.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{MarketStore, StoreError, WorkerOrderQuery, WorkerQuery, MAX_SCAN};
use crate::geo::{haversine_km, GeoPoint};
use crate::models::ad::{Ad, AdQuery, AdSort};
use crate::models::profile::{DemandTerm, Fair, SellerProfile, SellerRole};
use crate::models::worker::{
    OrderStatus, Worker, WorkerActivity, WorkerOrder, WorkerStats,
};

/// A raw search-log record, aggregated into [`DemandTerm`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchLogEntry {
    pub query: String,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Invitation {
    pub order_id: Uuid,
    pub worker_id: Uuid,
    pub response_minutes: Option<f64>,
}

#[derive(Default)]
struct Data {
    ads: Vec<Ad>,
    profiles: Vec<SellerProfile>,
    search_log: Vec<SearchLogEntry>,
    fairs: Vec<Fair>,
    workers: Vec<Worker>,
    orders: Vec<WorkerOrder>,
    assignments: HashMap<Uuid, Uuid>, // order_id → worker_id
    invitations: Vec<Invitation>,
    reviews: Vec<(Uuid, f64)>,
}

#[derive(Default)]
pub struct InMemoryStore {
    data: RwLock<Data>,
    near_radii: Mutex<Vec<f64>>,
    global_queries: AtomicUsize,
    fail_ads: AtomicBool,
    fail_counts: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_ad(&self, ad: Ad) {
        self.write().ads.push(ad);
    }

    pub fn insert_profile(&self, profile: SellerProfile) {
        self.write().profiles.push(profile);
    }

    pub fn log_search(&self, entry: SearchLogEntry) {
        self.write().search_log.push(entry);
    }

    pub fn insert_fair(&self, fair: Fair) {
        self.write().fairs.push(fair);
    }

    pub fn insert_worker(&self, worker: Worker) {
        self.write().workers.push(worker);
    }

    pub fn insert_order(&self, order: WorkerOrder) {
        self.write().orders.push(order);
    }

    pub fn assign_order(&self, order_id: Uuid, worker_id: Uuid) {
        self.write().assignments.insert(order_id, worker_id);
    }

    /// Records that `worker_id` was invited to `order_id`; `Some` minutes means they responded.
    pub fn invite(&self, order_id: Uuid, worker_id: Uuid, response_minutes: Option<f64>) {
        self.write().invitations.push(Invitation {
            order_id,
            worker_id,
            response_minutes,
        });
    }

    pub fn add_review(&self, worker_id: Uuid, rating: f64) {
        self.write().reviews.push((worker_id, rating));
    }

    /// Radii of every geo-bounded ad query issued so far, in order.
    pub fn near_query_radii(&self) -> Vec<f64> {
        self.near_radii
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn global_query_count(&self) -> usize {
        self.global_queries.load(Ordering::SeqCst)
    }

    /// Makes every ad fetch fail as if the pool timed out.
    pub fn fail_ad_queries(&self, fail: bool) {
        self.fail_ads.store(fail, Ordering::SeqCst);
    }

    /// Makes density counts fail as if the pool timed out.
    pub fn fail_count_queries(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Data> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Data> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }

    fn check_ads(&self) -> Result<(), StoreError> {
        if self.fail_ads.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn distance_from(center: Option<GeoPoint>, location: Option<GeoPoint>) -> Option<f64> {
    match (center, location) {
        (Some(c), Some(l)) => Some(haversine_km(&c, &l)),
        _ => None,
    }
}

fn within(distance: Option<f64>, radius_km: Option<f64>) -> bool {
    match radius_km {
        Some(r) => distance.is_some_and(|d| d <= r),
        None => true,
    }
}

fn by_distance<T>(items: &mut [(T, f64)]) {
    items.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn find_ads_near(
        &self,
        query: &AdQuery,
        center: GeoPoint,
        max_distance_km: f64,
        exclude: &HashSet<Uuid>,
        limit: usize,
    ) -> Result<Vec<(Ad, f64)>, StoreError> {
        self.check_ads()?;
        self.near_radii
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(max_distance_km);

        let data = self.read();
        let mut hits: Vec<(Ad, f64)> = data
            .ads
            .iter()
            .filter(|ad| !exclude.contains(&ad.id) && query.matches(ad))
            .filter_map(|ad| {
                let d = haversine_km(&center, &ad.location?);
                (d <= max_distance_km).then(|| (ad.clone(), d))
            })
            .collect();
        by_distance(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn find_ads(
        &self,
        query: &AdQuery,
        sort: AdSort,
        exclude: &HashSet<Uuid>,
        limit: usize,
    ) -> Result<Vec<Ad>, StoreError> {
        self.check_ads()?;
        self.global_queries.fetch_add(1, Ordering::SeqCst);

        let data = self.read();
        let mut hits: Vec<Ad> = data
            .ads
            .iter()
            .filter(|ad| !exclude.contains(&ad.id) && query.matches(ad))
            .cloned()
            .collect();
        hits.sort_by(|a, b| sort.compare(a, b));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count_ads_near(
        &self,
        query: &AdQuery,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<u64, StoreError> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let data = self.read();
        let count = data
            .ads
            .iter()
            .filter(|ad| query.matches(ad))
            .filter(|ad| within(distance_from(Some(center), ad.location), Some(radius_km)))
            .count();
        Ok(count as u64)
    }

    async fn find_profiles(
        &self,
        role: SellerRole,
        center: Option<GeoPoint>,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<(SellerProfile, Option<f64>)>, StoreError> {
        let data = self.read();
        let mut hits: Vec<(SellerProfile, Option<f64>)> = data
            .profiles
            .iter()
            .filter(|p| p.role == role && p.active_ads_count > 0)
            .map(|p| (p.clone(), distance_from(center, p.location)))
            .filter(|(_, d)| center.is_none() || within(*d, Some(radius_km)))
            .collect();
        hits.sort_by(|a, b| match (a.1, b.1) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            _ => b.0.active_ads_count.cmp(&a.0.active_ads_count),
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn top_demand_terms(
        &self,
        center: Option<GeoPoint>,
        radius_km: f64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DemandTerm>, StoreError> {
        let data = self.read();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for entry in data.search_log.iter().filter(|e| e.created_at >= since) {
            if center.is_some() && !within(distance_from(center, entry.location), Some(radius_km))
            {
                continue;
            }
            let term = entry.query.trim().to_lowercase();
            if term.is_empty() {
                continue;
            }
            *counts.entry(term).or_insert(0) += 1;
        }
        let mut terms: Vec<DemandTerm> = counts
            .into_iter()
            .map(|(query, count)| DemandTerm { query, count })
            .collect();
        terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        terms.truncate(limit);
        Ok(terms)
    }

    async fn active_fairs(
        &self,
        at: DateTime<Utc>,
        center: Option<GeoPoint>,
        limit: usize,
    ) -> Result<Vec<Fair>, StoreError> {
        let data = self.read();
        let mut fairs: Vec<(Fair, f64)> = data
            .fairs
            .iter()
            .filter(|f| f.is_active_at(at))
            .map(|f| {
                let d = distance_from(center, f.location).unwrap_or(f64::MAX);
                (f.clone(), d)
            })
            .collect();
        by_distance(&mut fairs);
        Ok(fairs.into_iter().take(limit).map(|(f, _)| f).collect())
    }

    async fn get_worker(&self, id: Uuid) -> Result<Option<Worker>, StoreError> {
        Ok(self.read().workers.iter().find(|w| w.id == id).cloned())
    }

    async fn get_worker_order(&self, id: Uuid) -> Result<Option<WorkerOrder>, StoreError> {
        Ok(self.read().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_workers(
        &self,
        query: &WorkerQuery,
    ) -> Result<Vec<(Worker, Option<f64>)>, StoreError> {
        let data = self.read();
        Ok(data
            .workers
            .iter()
            .filter(|w| w.is_active && !query.exclude_ids.contains(&w.id))
            .filter(|w| {
                query
                    .category
                    .as_ref()
                    .map_or(true, |c| w.categories.iter().any(|wc| wc == c))
            })
            .filter(|w| query.min_rating.map_or(true, |r| w.rating >= r))
            .map(|w| (w.clone(), distance_from(query.center, w.location)))
            .filter(|(_, d)| query.center.is_none() || within(*d, query.radius_km))
            .take(MAX_SCAN)
            .collect())
    }

    async fn find_worker_orders(
        &self,
        query: &WorkerOrderQuery,
    ) -> Result<Vec<(WorkerOrder, Option<f64>)>, StoreError> {
        let data = self.read();
        Ok(data
            .orders
            .iter()
            .filter(|o| query.statuses.is_empty() || query.statuses.contains(&o.status))
            .filter(|o| query.categories.is_empty() || query.categories.contains(&o.category))
            .filter(|o| query.urgency.map_or(true, |u| o.urgency == u))
            .map(|o| (o.clone(), distance_from(query.center, o.location)))
            .filter(|(_, d)| query.center.is_none() || within(*d, query.radius_km))
            .take(MAX_SCAN)
            .collect())
    }

    async fn responded_worker_ids(&self, order_id: Uuid) -> Result<HashSet<Uuid>, StoreError> {
        Ok(self
            .read()
            .invitations
            .iter()
            .filter(|i| i.order_id == order_id && i.response_minutes.is_some())
            .map(|i| i.worker_id)
            .collect())
    }

    async fn responded_order_ids(&self, worker_id: Uuid) -> Result<HashSet<Uuid>, StoreError> {
        Ok(self
            .read()
            .invitations
            .iter()
            .filter(|i| i.worker_id == worker_id && i.response_minutes.is_some())
            .map(|i| i.order_id)
            .collect())
    }

    async fn worker_review_ratings(&self, worker_id: Uuid) -> Result<Vec<f64>, StoreError> {
        Ok(self
            .read()
            .reviews
            .iter()
            .filter(|(w, _)| *w == worker_id)
            .map(|(_, r)| *r)
            .collect())
    }

    async fn worker_activity(&self, worker_id: Uuid) -> Result<WorkerActivity, StoreError> {
        let data = self.read();
        let mut activity = WorkerActivity::default();

        for order in &data.orders {
            if data.assignments.get(&order.id) != Some(&worker_id) {
                continue;
            }
            match order.status {
                OrderStatus::Completed => activity.completed_orders += 1,
                OrderStatus::InProgress => activity.active_orders += 1,
                _ => {}
            }
        }

        let mut minutes = Vec::new();
        for inv in data.invitations.iter().filter(|i| i.worker_id == worker_id) {
            activity.invitations += 1;
            if let Some(m) = inv.response_minutes {
                activity.responded_invitations += 1;
                minutes.push(m);
            }
        }
        if !minutes.is_empty() {
            activity.avg_response_minutes =
                Some(minutes.iter().sum::<f64>() / minutes.len() as f64);
        }

        Ok(activity)
    }

    async fn save_worker_stats(
        &self,
        worker_id: Uuid,
        stats: &WorkerStats,
    ) -> Result<(), StoreError> {
        let mut data = self.write();
        let worker = data
            .workers
            .iter_mut()
            .find(|w| w.id == worker_id)
            .ok_or_else(|| StoreError::Corrupt(format!("worker {worker_id} vanished")))?;
        worker.rating = stats.rating;
        worker.reviews_count = stats.reviews_count;
        worker.response_rate = stats.response_rate;
        worker.avg_response_minutes = stats.avg_response_minutes;
        worker.completed_orders_count = stats.completed_orders_count;
        worker.active_orders_count = stats.active_orders_count;
        Ok(())
    }
}
