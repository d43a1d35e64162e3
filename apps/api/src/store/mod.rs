//! Document-store collaborator.
//!
//! Every query the feed, classifier and worker services issue goes through
//! [`MarketStore`]. `PgMarketStore` is the production backend; `InMemoryStore`
//! backs tests and local demos.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::ad::{Ad, AdQuery, AdSort};
use crate::models::profile::{DemandTerm, Fair, SellerProfile, SellerRole};
use crate::models::worker::{
    OrderStatus, Urgency, Worker, WorkerActivity, WorkerOrder, WorkerStats,
};

#[cfg(test)]
pub use memory::InMemoryStore;
pub use postgres::PgMarketStore;

/// Upper bound on rows any unpaginated scan returns.
pub const MAX_SCAN: usize = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Filters for worker lookups. A `center` without `radius_km` only annotates distance.
#[derive(Debug, Clone, Default)]
pub struct WorkerQuery {
    pub center: Option<GeoPoint>,
    pub radius_km: Option<f64>,
    pub category: Option<String>,
    pub min_rating: Option<f64>,
    pub exclude_ids: HashSet<Uuid>,
}

/// Filters for worker-order lookups.
#[derive(Debug, Clone, Default)]
pub struct WorkerOrderQuery {
    pub center: Option<GeoPoint>,
    pub radius_km: Option<f64>,
    pub categories: Vec<String>,
    pub urgency: Option<Urgency>,
    /// Empty means any status.
    pub statuses: Vec<OrderStatus>,
}

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Active ads matching `query` within `max_distance_km`, nearest first,
    /// skipping `exclude`. Each ad comes with its distance in km.
    async fn find_ads_near(
        &self,
        query: &AdQuery,
        center: GeoPoint,
        max_distance_km: f64,
        exclude: &HashSet<Uuid>,
        limit: usize,
    ) -> Result<Vec<(Ad, f64)>, StoreError>;

    /// Active ads matching `query` with no geo bound, in `sort` order.
    async fn find_ads(
        &self,
        query: &AdQuery,
        sort: AdSort,
        exclude: &HashSet<Uuid>,
        limit: usize,
    ) -> Result<Vec<Ad>, StoreError>;

    async fn count_ads_near(
        &self,
        query: &AdQuery,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<u64, StoreError>;

    /// Seller profiles with `role`, nearest first when a center is given,
    /// otherwise by active ad count.
    async fn find_profiles(
        &self,
        role: SellerRole,
        center: Option<GeoPoint>,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<(SellerProfile, Option<f64>)>, StoreError>;

    /// Most searched terms since `since`, optionally around a center.
    async fn top_demand_terms(
        &self,
        center: Option<GeoPoint>,
        radius_km: f64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DemandTerm>, StoreError>;

    /// Fairs running at `at`, nearest first when a center is given.
    async fn active_fairs(
        &self,
        at: DateTime<Utc>,
        center: Option<GeoPoint>,
        limit: usize,
    ) -> Result<Vec<Fair>, StoreError>;

    async fn get_worker(&self, id: Uuid) -> Result<Option<Worker>, StoreError>;

    async fn get_worker_order(&self, id: Uuid) -> Result<Option<WorkerOrder>, StoreError>;

    /// Active workers matching `query`, unordered, capped at [`MAX_SCAN`].
    async fn find_workers(
        &self,
        query: &WorkerQuery,
    ) -> Result<Vec<(Worker, Option<f64>)>, StoreError>;

    /// Orders matching `query`, unordered, capped at [`MAX_SCAN`].
    async fn find_worker_orders(
        &self,
        query: &WorkerOrderQuery,
    ) -> Result<Vec<(WorkerOrder, Option<f64>)>, StoreError>;

    async fn responded_worker_ids(&self, order_id: Uuid) -> Result<HashSet<Uuid>, StoreError>;

    async fn responded_order_ids(&self, worker_id: Uuid) -> Result<HashSet<Uuid>, StoreError>;

    async fn worker_review_ratings(&self, worker_id: Uuid) -> Result<Vec<f64>, StoreError>;

    async fn worker_activity(&self, worker_id: Uuid) -> Result<WorkerActivity, StoreError>;

    async fn save_worker_stats(&self, worker_id: Uuid, stats: &WorkerStats)
        -> Result<(), StoreError>;
}
