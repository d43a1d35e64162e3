//! Worker reputation upkeep and leaderboard scoring.
//!
//! Stats are always recomputed from reviews, orders and invitations; nothing
//! is incremented in place, so running an update twice is a no-op.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::worker::{Worker, WorkerActivity, WorkerStats};
use crate::store::{MarketStore, StoreError, WorkerQuery};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 20;

const W_RATING: f64 = 0.30;
const W_COMPLETED: f64 = 0.20;
const W_RESPONSE_RATE: f64 = 0.15;
const W_RESPONSE_TIME: f64 = 0.10;
const W_EXPERIENCE: f64 = 0.10;
const W_VERIFIED: f64 = 0.10;
const W_PRO: f64 = 0.05;

/// Completed orders at which the track-record component saturates.
const COMPLETED_ORDERS_CAP: f64 = 100.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedWorker {
    pub worker: Worker,
    pub overall_score: f64,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn unit(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Tiered score for the average time to answer an invitation.
/// Workers with no answered invitations get a neutral 0.5.
pub fn response_time_score(avg_response_minutes: Option<f64>) -> f64 {
    match avg_response_minutes {
        None => 0.5,
        Some(m) if m <= 15.0 => 1.0,
        Some(m) if m <= 60.0 => 0.8,
        Some(m) if m <= 180.0 => 0.5,
        Some(m) if m <= 1440.0 => 0.3,
        Some(_) => 0.1,
    }
}

/// Long-term track-record composite in [0, 1], used for leaderboards only.
pub fn calculate_overall_score(worker: &Worker) -> f64 {
    let score = W_RATING * unit(worker.rating / 5.0)
        + W_COMPLETED * unit(worker.completed_orders_count as f64 / COMPLETED_ORDERS_CAP)
        + W_RESPONSE_RATE * unit(worker.response_rate / 100.0)
        + W_RESPONSE_TIME * response_time_score(worker.avg_response_minutes)
        + W_EXPERIENCE * unit(worker.experience_years / 10.0)
        + if worker.is_verified { W_VERIFIED } else { 0.0 }
        + if worker.is_pro { W_PRO } else { 0.0 };
    unit(score)
}

/// Derives the persisted reputation fields from source records.
pub fn compute_stats(ratings: &[f64], activity: &WorkerActivity) -> WorkerStats {
    let rating = if ratings.is_empty() {
        0.0
    } else {
        round1(ratings.iter().sum::<f64>() / ratings.len() as f64)
    };
    // Nobody asked yet: not the worker's fault.
    let response_rate = if activity.invitations == 0 {
        100.0
    } else {
        round1(activity.responded_invitations as f64 * 100.0 / activity.invitations as f64)
    };

    WorkerStats {
        rating,
        reviews_count: ratings.len() as i64,
        response_rate,
        avg_response_minutes: activity.avg_response_minutes.map(round1),
        completed_orders_count: activity.completed_orders,
        active_orders_count: activity.active_orders,
    }
}

pub struct WorkerRankingService {
    store: Arc<dyn MarketStore>,
}

impl WorkerRankingService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Recomputes and persists a worker's reputation fields.
    /// Returns `None` when the worker does not exist.
    pub async fn update_worker_ranking(
        &self,
        worker_id: Uuid,
    ) -> Result<Option<WorkerStats>, StoreError> {
        if self.store.get_worker(worker_id).await?.is_none() {
            return Ok(None);
        }

        let (ratings, activity) = tokio::try_join!(
            self.store.worker_review_ratings(worker_id),
            self.store.worker_activity(worker_id),
        )?;
        let stats = compute_stats(&ratings, &activity);
        self.store.save_worker_stats(worker_id, &stats).await?;

        info!(
            "Updated ranking for worker {worker_id}: rating={} reviews={} responseRate={}",
            stats.rating, stats.reviews_count, stats.response_rate
        );
        Ok(Some(stats))
    }

    /// Active workers ordered by overall score, optionally within one category.
    pub async fn leaderboard(
        &self,
        category: Option<String>,
        limit: usize,
    ) -> Result<Vec<RankedWorker>, StoreError> {
        let workers = self
            .store
            .find_workers(&WorkerQuery {
                category,
                ..WorkerQuery::default()
            })
            .await?;

        let mut ranked: Vec<RankedWorker> = workers
            .into_iter()
            .map(|(worker, _)| RankedWorker {
                overall_score: calculate_overall_score(&worker),
                worker,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.overall_score
                .total_cmp(&a.overall_score)
                .then_with(|| b.worker.reviews_count.cmp(&a.worker.reviews_count))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}
