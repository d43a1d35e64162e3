//! Assembles the personalised home feed.
//!
//! Pipeline: resolve zone → feed cache (geohash-5 + zone, 5 min) → zone layout
//! → seasonal filter → fetch every block concurrently → cap items → drop empty
//! blocks (banners excepted) → cache. A failing block yields no items and never
//! fails its siblings. Forced-zone (debug) requests bypass the cache both ways.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::GeoCache;
use crate::clock::Clock;
use crate::errors::AppError;
use crate::geo::{round_km, GeoPoint};
use crate::home::blocks::{
    select_blocks, zone_layout, BlockConfig, BlockKind, FetchStrategy, FilterChip,
};
use crate::models::ad::NearbyAd;
use crate::models::profile::{DemandTerm, Fair, SellerProfile};
use crate::search::progressive::{fetch_ads_progressive_radius, RadiusSearchOptions};
use crate::store::{MarketStore, StoreError};
use crate::zones::classifier::GeoZoneClassifier;
use crate::zones::{Zone, ZoneClassification, ZoneDescriptor, ZoneDiagnostics, ZoneSource};

pub const CACHE_TTL_MINUTES: i64 = 5;
pub const CACHE_MAX_ENTRIES: usize = 500;
const GEOHASH_PRECISION: usize = 5;
const DEMAND_WINDOW_DAYS: i64 = 7;
/// Ads blocks stop widening their radius once this many items are found.
const BLOCK_MIN_ITEMS: usize = 6;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HomeEngineConfig {
    pub default_radius_km: f64,
    pub block_max_items: usize,
    /// Fixed UTC offset of the business timezone, used for seasonal months.
    pub business_utc_offset_hours: i64,
}

impl Default for HomeEngineConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 10.0,
            block_max_items: 30,
            // Europe/Minsk, UTC+3 all year
            business_utc_offset_hours: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HomeRequest {
    pub location: Option<GeoPoint>,
    pub radius_km: Option<f64>,
    pub user_id: Option<String>,
    pub force_zone: Option<Zone>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub link: String,
    pub accent_color: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCard {
    #[serde(flatten)]
    pub profile: SellerProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "itemType", rename_all = "snake_case")]
pub enum BlockItem {
    Banner(Banner),
    Ad(NearbyAd),
    Profile(ProfileCard),
    Demand(DemandTerm),
    Fair(Fair),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub items: Vec<BlockItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterChip>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    #[serde(flatten)]
    pub zone: ZoneDescriptor,
    pub show_zone_badge: bool,
    pub compact_cards: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedDiagnostics {
    pub zone_source: ZoneSource,
    pub classification: ZoneDiagnostics,
    pub failed_blocks: Vec<String>,
    pub out_of_season: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedMeta {
    pub generated_at: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub radius_km: f64,
    pub diagnostics: FeedDiagnostics,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HomeFeedResult {
    pub zone: Zone,
    pub confidence: f64,
    pub blocks: Vec<Block>,
    pub ui_config: UiConfig,
    pub meta: FeedMeta,
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

pub struct HomeDynamicEngine {
    store: Arc<dyn MarketStore>,
    classifier: Arc<GeoZoneClassifier>,
    clock: Arc<dyn Clock>,
    config: HomeEngineConfig,
    cache: GeoCache<HomeFeedResult>,
}

/// Per-request values every block fetch needs.
struct FetchContext {
    zone: Zone,
    location: Option<GeoPoint>,
    radius_km: f64,
    now: DateTime<Utc>,
}

impl HomeDynamicEngine {
    pub fn new(
        store: Arc<dyn MarketStore>,
        classifier: Arc<GeoZoneClassifier>,
        clock: Arc<dyn Clock>,
        config: HomeEngineConfig,
    ) -> Self {
        let cache = GeoCache::new(
            Duration::minutes(CACHE_TTL_MINUTES),
            CACHE_MAX_ENTRIES,
            clock.clone(),
        );
        Self {
            store,
            classifier,
            clock,
            config,
            cache,
        }
    }

    /// Builds (or serves from cache) the home feed for a request.
    ///
    /// Fails only when there is neither a location nor a forced zone: without
    /// either the zone cannot be inferred.
    pub async fn get_home_config(&self, request: HomeRequest) -> Result<HomeFeedResult, AppError> {
        let classification = match (request.force_zone, request.location) {
            (Some(zone), _) => self.classifier.force_zone(zone),
            (None, Some(point)) => self.classifier.classify(point).await,
            (None, None) => {
                return Err(AppError::Validation(
                    "lat and lng are required unless a zone is forced".to_string(),
                ))
            }
        };

        // Fallback classifications are transient and never seed the feed cache.
        let cacheable = classification.source == ZoneSource::Classifier;
        let cache_key = match (request.force_zone, request.location) {
            (None, Some(point)) if cacheable => Some(format!(
                "{}:{}",
                point.geohash(GEOHASH_PRECISION),
                classification.zone
            )),
            _ => None,
        };

        if let Some(key) = &cache_key {
            if let Some(mut hit) = self.cache.get(key) {
                debug!("Home feed cache hit for {key}");
                hit.meta.location = request.location;
                hit.meta.radius_km = self.resolve_radius(request.radius_km);
                return Ok(hit);
            }
        }

        let now = self.clock.now();
        let result = self.assemble(&request, classification, now).await;

        if let Some(key) = cache_key {
            self.cache.insert(key, result.clone());
        }

        Ok(result)
    }

    /// The calendar month (1–12) in the business timezone.
    pub fn business_month(&self, now: DateTime<Utc>) -> u32 {
        (now + Duration::hours(self.config.business_utc_offset_hours)).month()
    }

    fn resolve_radius(&self, requested: Option<f64>) -> f64 {
        requested
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(self.config.default_radius_km)
    }

    async fn assemble(
        &self,
        request: &HomeRequest,
        classification: ZoneClassification,
        now: DateTime<Utc>,
    ) -> HomeFeedResult {
        let zone = classification.zone;
        let radius_km = self.resolve_radius(request.radius_km);
        let month = self.business_month(now);

        let configs = select_blocks(zone, month);
        let out_of_season: Vec<String> = zone_layout(zone)
            .iter()
            .filter(|t| !configs.iter().any(|c| c.block_type == **t))
            .map(|t| t.as_str().to_string())
            .collect();

        let ctx = FetchContext {
            zone,
            location: request.location,
            radius_km,
            now,
        };

        let fetched = join_all(configs.iter().map(|config| self.fetch_block(config, &ctx))).await;

        let mut blocks = Vec::with_capacity(configs.len());
        let mut failed_blocks = Vec::new();
        for (config, outcome) in configs.iter().zip(fetched) {
            let block_id = config.block_type.as_str();
            let mut items = match outcome {
                Ok(items) => items,
                Err(e) => {
                    warn!(
                        "Block '{block_id}' failed for zone {zone} at {:?}: {e}",
                        request.location
                    );
                    failed_blocks.push(block_id.to_string());
                    Vec::new()
                }
            };
            items.truncate(config.max_items.unwrap_or(self.config.block_max_items));

            if items.is_empty() && !config.always_shown() {
                continue;
            }
            blocks.push(build_block(config, items));
        }

        info!(
            "Assembled home feed: zone={zone} blocks={} failed={} user={:?}",
            blocks.len(),
            failed_blocks.len(),
            request.user_id
        );

        HomeFeedResult {
            zone,
            confidence: classification.confidence,
            blocks,
            ui_config: ui_config(&classification),
            meta: FeedMeta {
                generated_at: now,
                location: request.location,
                radius_km,
                diagnostics: FeedDiagnostics {
                    zone_source: classification.source,
                    classification: classification.diagnostics,
                    failed_blocks,
                    out_of_season,
                },
            },
        }
    }

    async fn fetch_block(
        &self,
        config: &BlockConfig,
        ctx: &FetchContext,
    ) -> Result<Vec<BlockItem>, StoreError> {
        let cap = config.max_items.unwrap_or(self.config.block_max_items);
        let store = self.store.as_ref();

        match &config.fetch {
            FetchStrategy::Static => Ok(banners(ctx.zone)
                .into_iter()
                .map(BlockItem::Banner)
                .collect()),
            strategy @ (FetchStrategy::CategoryFilter { .. } | FetchStrategy::Keyword { .. }) => {
                let Some((query, sort)) = strategy.ad_query() else {
                    return Ok(Vec::new());
                };
                let options = RadiusSearchOptions {
                    min_items: BLOCK_MIN_ITEMS.min(cap),
                    max_items: cap,
                    sort,
                    ..RadiusSearchOptions::default()
                };
                let ads =
                    fetch_ads_progressive_radius(store, ctx.location, &query, &options).await?;
                Ok(ads.into_iter().map(BlockItem::Ad).collect())
            }
            FetchStrategy::ProfileRole(role) => {
                let profiles = store
                    .find_profiles(*role, ctx.location, ctx.radius_km, cap)
                    .await?;
                Ok(profiles
                    .into_iter()
                    .map(|(profile, distance)| {
                        BlockItem::Profile(ProfileCard {
                            profile,
                            distance_km: distance.map(round_km),
                        })
                    })
                    .collect())
            }
            FetchStrategy::Demand => {
                let since = ctx.now - Duration::days(DEMAND_WINDOW_DAYS);
                let terms = store
                    .top_demand_terms(ctx.location, ctx.radius_km, since, cap)
                    .await?;
                Ok(terms.into_iter().map(BlockItem::Demand).collect())
            }
            FetchStrategy::Fairs => {
                let fairs = store.active_fairs(ctx.now, ctx.location, cap).await?;
                Ok(fairs.into_iter().map(BlockItem::Fair).collect())
            }
        }
    }
}

fn build_block(config: &BlockConfig, items: Vec<BlockItem>) -> Block {
    Block {
        kind: config.kind,
        id: config.block_type.as_str().to_string(),
        title: config.title.to_string(),
        subtitle: config.subtitle.map(str::to_string),
        icon: config.icon.map(str::to_string),
        accent_color: config.accent_color.map(str::to_string),
        link: config.link.map(str::to_string),
        items,
        filters: config.filters.to_vec(),
    }
}

fn ui_config(classification: &ZoneClassification) -> UiConfig {
    UiConfig {
        zone: classification.zone.descriptor(),
        show_zone_badge: classification.confidence >= 0.6,
        compact_cards: classification.zone == Zone::CityCenter,
    }
}

/// Static promo banners per zone.
pub fn banners(zone: Zone) -> Vec<Banner> {
    let mut list = vec![Banner {
        id: "post_ad".to_string(),
        title: "Sell in 30 seconds".to_string(),
        subtitle: Some("Snap a photo and post an ad".to_string()),
        link: "/ads/new".to_string(),
        accent_color: "#3F51B5".to_string(),
    }];
    let zone_banner = match zone {
        Zone::Village => Banner {
            id: "sell_harvest".to_string(),
            title: "Sell your harvest".to_string(),
            subtitle: Some("Neighbours are looking for farm produce".to_string()),
            link: "/ads/new?farmer=1".to_string(),
            accent_color: "#4CAF50".to_string(),
        },
        Zone::Suburb => Banner {
            id: "hire_worker".to_string(),
            title: "Need a hand at home?".to_string(),
            subtitle: Some("Find a verified worker nearby".to_string()),
            link: "/workers".to_string(),
            accent_color: "#FF9800".to_string(),
        },
        Zone::CityCenter => Banner {
            id: "local_shops".to_string(),
            title: "Shops around the corner".to_string(),
            subtitle: None,
            link: "/shops".to_string(),
            accent_color: "#E91E63".to_string(),
        },
    };
    list.push(zone_banner);
    list
}
