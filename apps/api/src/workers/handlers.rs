use std::cmp::Ordering;
use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::geo::{round_km, GeoPoint};
use crate::models::worker::{OrderStatus, Urgency, Worker, WorkerOrder, WorkerStats};
use crate::state::AppState;
use crate::store::{WorkerOrderQuery, WorkerQuery};
use crate::workers::matching::{
    MatchOptions, OrderMatch, WorkerMatch, DEFAULT_MATCH_LIMIT, DEFAULT_MAX_DISTANCE_KM,
};
use crate::workers::ranking::{RankedWorker, DEFAULT_LEADERBOARD_LIMIT};

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_LIST_RADIUS_KM: f64 = 50.0;

// ────────────────────────────────────────────────────────────────────────────
// Shared
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub success: bool,
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl<T> Paginated<T> {
    fn slice(all: Vec<T>, page: Option<usize>, limit: Option<usize>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let total = all.len();
        let items: Vec<T> = all
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();
        Paginated {
            success: true,
            has_more: page.saturating_mul(limit) < total,
            items,
            total,
            page,
            limit,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithDistance<T> {
    #[serde(flatten)]
    pub item: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

fn parse_param<T: FromStr<Err = String>>(raw: Option<&str>) -> Result<Option<T>, AppError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(AppError::Validation))
        .transpose()
}

fn search_radius(location: Option<GeoPoint>, radius_km: Option<f64>) -> Option<f64> {
    location.map(|_| {
        radius_km
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(DEFAULT_LIST_RADIUS_KM)
    })
}

fn nearest_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Worker orders
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderSort {
    #[default]
    Newest,
    Distance,
    Budget,
}

impl FromStr for OrderSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(OrderSort::Newest),
            "distance" => Ok(OrderSort::Distance),
            "budget" => Ok(OrderSort::Budget),
            other => Err(format!(
                "unknown sortBy '{other}' (expected newest, distance or budget)"
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOrdersQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub category: Option<String>,
    pub urgency: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// GET /api/worker-orders
pub async fn handle_list_orders(
    State(state): State<AppState>,
    Query(params): Query<WorkerOrdersQuery>,
) -> Result<Json<Paginated<WithDistance<WorkerOrder>>>, AppError> {
    let urgency: Option<Urgency> = parse_param(params.urgency.as_deref())?;
    let sort: OrderSort = parse_param(params.sort_by.as_deref())?.unwrap_or_default();
    let location = GeoPoint::from_optional(params.lat, params.lng);

    let mut orders = state
        .store
        .find_worker_orders(&WorkerOrderQuery {
            center: location,
            radius_km: search_radius(location, params.radius_km),
            categories: params.category.into_iter().filter(|c| !c.is_empty()).collect(),
            urgency,
            statuses: vec![OrderStatus::Open],
        })
        .await?;

    match sort {
        OrderSort::Newest => orders.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at)),
        OrderSort::Distance => orders.sort_by(|a, b| {
            nearest_first(a.1, b.1).then_with(|| b.0.created_at.cmp(&a.0.created_at))
        }),
        OrderSort::Budget => orders.sort_by(|a, b| {
            let budget = |o: &WorkerOrder| o.budget_to.or(o.budget_from).unwrap_or(0.0);
            budget(&b.0).total_cmp(&budget(&a.0))
        }),
    }

    let items = orders
        .into_iter()
        .map(|(item, d)| WithDistance {
            item,
            distance_km: d.map(round_km),
        })
        .collect();
    Ok(Json(Paginated::slice(items, params.page, params.limit)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedQuery {
    pub worker_id: Uuid,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct RecommendedResponse {
    pub success: bool,
    pub items: Vec<OrderMatch>,
}

/// GET /api/worker-orders/recommended
pub async fn handle_recommended_orders(
    State(state): State<AppState>,
    Query(params): Query<RecommendedQuery>,
) -> Result<Json<RecommendedResponse>, AppError> {
    let options = MatchOptions {
        limit: params
            .limit
            .unwrap_or(DEFAULT_MATCH_LIMIT)
            .clamp(1, MAX_PAGE_SIZE),
        ..MatchOptions::default()
    };
    let items = state
        .matching
        .recommend_orders_for_worker_id(params.worker_id, options)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Worker {} not found", params.worker_id)))?;
    Ok(Json(RecommendedResponse {
        success: true,
        items,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingWorkersQuery {
    pub limit: Option<usize>,
    pub max_distance_km: Option<f64>,
    pub min_rating: Option<f64>,
}

#[derive(Serialize)]
pub struct MatchingWorkersResponse {
    pub success: bool,
    pub items: Vec<WorkerMatch>,
}

/// GET /api/worker-orders/:id/matching-workers
pub async fn handle_matching_workers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<MatchingWorkersQuery>,
) -> Result<Json<MatchingWorkersResponse>, AppError> {
    let order = state
        .store
        .get_worker_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;

    let options = MatchOptions {
        limit: params
            .limit
            .unwrap_or(DEFAULT_MATCH_LIMIT)
            .clamp(1, MAX_PAGE_SIZE),
        max_distance_km: params
            .max_distance_km
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(DEFAULT_MAX_DISTANCE_KM),
        min_rating: params.min_rating.filter(|r| r.is_finite()),
    };
    let items = state.matching.find_matching_workers(&order, options).await?;
    Ok(Json(MatchingWorkersResponse {
        success: true,
        items,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Workers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerSort {
    #[default]
    Rating,
    Distance,
    Reviews,
    Orders,
}

impl FromStr for WorkerSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rating" => Ok(WorkerSort::Rating),
            "distance" => Ok(WorkerSort::Distance),
            "reviews" => Ok(WorkerSort::Reviews),
            "orders" => Ok(WorkerSort::Orders),
            other => Err(format!(
                "unknown sortBy '{other}' (expected rating, distance, reviews or orders)"
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkersQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub category: Option<String>,
    pub min_rating: Option<f64>,
    pub sort_by: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// GET /api/workers
pub async fn handle_list_workers(
    State(state): State<AppState>,
    Query(params): Query<WorkersQuery>,
) -> Result<Json<Paginated<WithDistance<Worker>>>, AppError> {
    let sort: WorkerSort = parse_param(params.sort_by.as_deref())?.unwrap_or_default();
    let location = GeoPoint::from_optional(params.lat, params.lng);

    let mut workers = state
        .store
        .find_workers(&WorkerQuery {
            center: location,
            radius_km: search_radius(location, params.radius_km),
            category: params.category.filter(|c| !c.is_empty()),
            min_rating: params.min_rating.filter(|r| r.is_finite()),
            ..WorkerQuery::default()
        })
        .await?;

    match sort {
        WorkerSort::Rating => workers.sort_by(|a, b| {
            b.0.rating
                .total_cmp(&a.0.rating)
                .then_with(|| b.0.reviews_count.cmp(&a.0.reviews_count))
        }),
        WorkerSort::Distance => workers.sort_by(|a, b| nearest_first(a.1, b.1)),
        WorkerSort::Reviews => workers.sort_by(|a, b| b.0.reviews_count.cmp(&a.0.reviews_count)),
        WorkerSort::Orders => workers.sort_by(|a, b| {
            b.0.completed_orders_count
                .cmp(&a.0.completed_orders_count)
        }),
    }

    let items = workers
        .into_iter()
        .map(|(item, d)| WithDistance {
            item,
            distance_km: d.map(round_km),
        })
        .collect();
    Ok(Json(Paginated::slice(items, params.page, params.limit)))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub success: bool,
    pub items: Vec<RankedWorker>,
}

/// GET /api/workers/top
pub async fn handle_top_workers(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_PAGE_SIZE);
    let items = state
        .ranking
        .leaderboard(params.category.filter(|c| !c.is_empty()), limit)
        .await?;
    Ok(Json(LeaderboardResponse {
        success: true,
        items,
    }))
}

#[derive(Serialize)]
pub struct RankingResponse {
    pub success: bool,
    pub stats: WorkerStats,
}

/// POST /api/workers/:id/ranking
pub async fn handle_update_ranking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RankingResponse>, AppError> {
    let stats = state
        .ranking
        .update_worker_ranking(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Worker {id} not found")))?;
    Ok(Json(RankingResponse {
        success: true,
        stats,
    }))
}
