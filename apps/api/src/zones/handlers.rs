use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::geo::GeoPoint;
use crate::state::AppState;
use crate::zones::{Zone, ZoneClassification, ZoneDescriptor};

#[derive(Serialize)]
pub struct ZonesResponse {
    pub success: bool,
    pub zones: Vec<ZoneDescriptor>,
}

/// GET /api/home-config/zones
pub async fn handle_list_zones() -> Json<ZonesResponse> {
    Json(ZonesResponse {
        success: true,
        zones: Zone::ALL.iter().map(Zone::descriptor).collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct DebugRequest {
    pub lat: f64,
    pub lng: f64,
}

/// POST /api/home-config/debug
/// Returns the raw classification for a point, diagnostics included.
pub async fn handle_debug_classify(
    State(state): State<AppState>,
    Json(req): Json<DebugRequest>,
) -> Result<Json<ZoneClassification>, AppError> {
    let point = GeoPoint::new(req.lat, req.lng).ok_or_else(|| {
        AppError::Validation(format!(
            "lat/lng out of range: {}, {}",
            req.lat, req.lng
        ))
    })?;
    Ok(Json(state.classifier.classify(point).await))
}
