use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::geo::GeoPoint;
use crate::home::engine::{HomeFeedResult, HomeRequest};
use crate::state::AppState;
use crate::zones::Zone;

/// The feed is per-location, so only the client may cache it.
pub const HOME_CACHE_CONTROL: &str = "private, max-age=120, stale-while-revalidate=300";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeConfigQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub user_id: Option<String>,
    /// Debug override; skips classification and the feed cache.
    pub zone: Option<String>,
}

#[derive(Serialize)]
pub struct HomeConfigResponse {
    pub success: bool,
    pub location: Option<GeoPoint>,
    #[serde(flatten)]
    pub feed: HomeFeedResult,
}

/// GET /api/home-config
pub async fn handle_home_config(
    State(state): State<AppState>,
    Query(params): Query<HomeConfigQuery>,
) -> Result<impl IntoResponse, AppError> {
    let force_zone = params
        .zone
        .as_deref()
        .filter(|z| !z.is_empty())
        .map(str::parse::<Zone>)
        .transpose()?;
    let location = GeoPoint::from_optional(params.lat, params.lng);

    let feed = state
        .home
        .get_home_config(HomeRequest {
            location,
            radius_km: params.radius_km,
            user_id: params.user_id,
            force_zone,
        })
        .await?;

    Ok((
        [(header::CACHE_CONTROL, HOME_CACHE_CONTROL)],
        Json(HomeConfigResponse {
            success: true,
            location,
            feed,
        }),
    ))
}
