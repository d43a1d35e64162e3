use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::geo::GeoPoint;
use crate::models::ad::{AdFilter, AdQuery, AdSort, NearbyAd};
use crate::search::progressive::{fetch_ads_progressive_radius, RadiusSearchOptions};
use crate::state::AppState;

/// Shared between users: results depend on the query string only.
pub const SEARCH_CACHE_CONTROL: &str = "public, max-age=60";

const DEFAULT_LIMIT: usize = 30;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub category: Option<String>,
    pub sort: Option<AdSort>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    pub items: Vec<NearbyAd>,
}

/// GET /api/search
pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let query = AdQuery {
        filter: AdFilter {
            category_ids: params.category.into_iter().filter(|c| !c.is_empty()).collect(),
            ..AdFilter::default()
        },
        keywords: params
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .into_iter()
            .collect(),
    };
    let options = RadiusSearchOptions {
        min_items: limit,
        max_items: limit,
        sort: params.sort.unwrap_or_default(),
        ..RadiusSearchOptions::default()
    };

    let items = fetch_ads_progressive_radius(
        state.store.as_ref(),
        GeoPoint::from_optional(params.lat, params.lng),
        &query,
        &options,
    )
    .await?;

    Ok((
        [(header::CACHE_CONTROL, SEARCH_CACHE_CONTROL)],
        Json(SearchResponse {
            success: true,
            count: items.len(),
            items,
        }),
    ))
}
